use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use reviewbot_api::ReviewApi;
use reviewbot_core::feeds::{channel_feed_settings_or_default, has_channel_feed_settings};
use reviewbot_core::{
    ApplicationError, BusinessUnitId, ChannelId, FeedRemoval, FeedSetting, FeedSettingsPatch,
    StarFilter, Team, TeamId,
};
use reviewbot_db::FeedSettingsStore;

use crate::blocks::{settings_intro_message, Dialog, Message, SelectOption};
use crate::commands::SlashCommandPayload;
use crate::correlation::{CorrelationToken, SourceMessage};
use crate::events::{ActionClick, DialogSubmission};
use crate::registry::{SlackBot, WorkspaceRegistry};
use crate::router::DeliveryObserver;

pub const DIRECT_MESSAGE_REFUSAL: &str = "Sorry, I can only post your reviews in a proper channel";
pub const ADMIN_ONLY: &str = "Sorry, only administrators can do that";
pub const REPLIES_ALLOWED: &str = "All set! Users on this channel can reply to reviews.";
pub const REPLIES_DISALLOWED: &str =
    "Settings saved! The reply button is not available to users in this channel.";
pub const PRIVATE_CHANNEL_HINT: &str = "\nJust one last thing: this looks like a private channel, \
     so *please /invite me* so I can post reviews here!";

pub const BUSINESS_UNIT_FIELD: &str = "businessUnitId";
pub const STAR_FILTER_FIELD: &str = "starFilter";
pub const REPLY_FEATURE_FIELD: &str = "replyFeature";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsCommandOutcome {
    IntroShown,
    RefusedDirectMessage,
    RefusedNotAdmin,
}

/// Settings dialog for a channel. The business unit select only appears when the team
/// follows more than one business unit.
pub fn feed_settings_dialog(
    callback_id: String,
    current: &FeedSetting,
    business_units: &[(BusinessUnitId, String)],
) -> Dialog {
    let mut dialog = Dialog::new("Review settings", callback_id, "Save");
    if business_units.len() > 1 {
        let selected = current
            .business_unit_id
            .clone()
            .or_else(|| business_units.first().map(|(id, _)| id.clone()));
        dialog = dialog.select(
            "Business unit",
            BUSINESS_UNIT_FIELD,
            selected.map(|id| id.0),
            business_units
                .iter()
                .map(|(id, label)| SelectOption::new(label.as_str(), id.0.as_str()))
                .collect(),
        );
    }
    dialog
        .select(
            "Reviews to post",
            STAR_FILTER_FIELD,
            Some(current.star_filter.as_str().to_owned()),
            vec![
                SelectOption::new("All reviews", StarFilter::All.as_str()),
                SelectOption::new("Positive reviews (4-5 stars)", StarFilter::Positive.as_str()),
                SelectOption::new("Negative reviews (1-3 stars)", StarFilter::Negative.as_str()),
            ],
        )
        .select(
            "In-channel reply",
            REPLY_FEATURE_FIELD,
            Some(if current.can_reply { "on" } else { "off" }.to_owned()),
            vec![
                SelectOption::new("Allow users to reply to reviews", "on"),
                SelectOption::new("Do not allow users to reply to reviews", "off"),
            ],
        )
}

pub fn settings_saved_text(channel_id: &ChannelId, can_reply: bool) -> String {
    let base = if can_reply { REPLIES_ALLOWED } else { REPLIES_DISALLOWED };
    if channel_id.is_private_group() {
        format!("{base}{PRIVATE_CHANNEL_HINT}")
    } else {
        base.to_owned()
    }
}

pub struct FeedSettingsService {
    store: FeedSettingsStore,
    registry: Arc<WorkspaceRegistry>,
    api: Arc<dyn ReviewApi>,
    observer: Arc<dyn DeliveryObserver>,
    default_business_unit: Option<BusinessUnitId>,
}

impl FeedSettingsService {
    pub fn new(
        store: FeedSettingsStore,
        registry: Arc<WorkspaceRegistry>,
        api: Arc<dyn ReviewApi>,
        observer: Arc<dyn DeliveryObserver>,
        default_business_unit: Option<BusinessUnitId>,
    ) -> Self {
        Self { store, registry, api, observer, default_business_unit }
    }

    async fn team_and_bot(&self, team_id: &TeamId) -> Result<(Team, Arc<SlackBot>), ApplicationError> {
        let team = self.store.find_team(team_id).await?;
        let bot = self.registry.bot_for(&team).await?;
        Ok((team, bot))
    }

    /// `settings`/`feed`: refused in direct messages and for non-admins.
    pub async fn handle_settings_command(
        &self,
        payload: &SlashCommandPayload,
        correlation_id: &str,
    ) -> Result<SettingsCommandOutcome, ApplicationError> {
        let team_id = TeamId(payload.team_id.clone());
        let channel_id = ChannelId(payload.channel_id.clone());
        let (team, bot) = self.team_and_bot(&team_id).await?;

        let outcome = if channel_id.is_direct_message() {
            SettingsCommandOutcome::RefusedDirectMessage
        } else {
            match bot.user_info(&payload.user_id).await {
                Ok(user) if user.is_admin || user.is_owner => SettingsCommandOutcome::IntroShown,
                Ok(_) => SettingsCommandOutcome::RefusedNotAdmin,
                Err(error) => {
                    warn!(
                        event_name = "settings.user_lookup.failed",
                        correlation_id,
                        team_id = %team_id,
                        error = %error,
                        "could not verify admin rights"
                    );
                    SettingsCommandOutcome::RefusedNotAdmin
                }
            }
        };

        let reply = match outcome {
            SettingsCommandOutcome::IntroShown => {
                settings_intro_message(has_channel_feed_settings(&team, &channel_id))
            }
            SettingsCommandOutcome::RefusedDirectMessage => Message::text(DIRECT_MESSAGE_REFUSAL),
            SettingsCommandOutcome::RefusedNotAdmin => Message::text(ADMIN_ONLY),
        };
        bot.respond(&payload.response_url, &reply.ephemeral()).await?;

        info!(
            event_name = "settings.command.handled",
            correlation_id,
            team_id = %team_id,
            channel_id = %channel_id,
            outcome = ?outcome,
            "settings command handled"
        );
        Ok(outcome)
    }

    /// Opens the settings dialog, remembering the intro message so it can be refreshed.
    pub async fn open_settings_dialog(
        &self,
        click: &ActionClick,
        correlation_id: &str,
    ) -> Result<(), ApplicationError> {
        let (team, bot) = self.team_and_bot(&click.team_id).await?;
        let current = channel_feed_settings_or_default(&team, &click.channel_id);
        let business_units = self.labelled_business_units(&team, correlation_id).await;

        let token = CorrelationToken::FeedSettings {
            source_message: SourceMessage {
                ts: click.message_ts.clone(),
                response_url: click.response_url.clone(),
                channel: click.channel_id.0.clone(),
            },
        };
        let dialog = feed_settings_dialog(token.encode()?, &current, &business_units);
        bot.open_dialog(&click.trigger_id, &dialog).await?;

        info!(
            event_name = "settings.dialog.opened",
            correlation_id,
            team_id = %click.team_id,
            channel_id = %click.channel_id,
            "settings dialog opened"
        );
        Ok(())
    }

    async fn labelled_business_units(
        &self,
        team: &Team,
        correlation_id: &str,
    ) -> Vec<(BusinessUnitId, String)> {
        let lookups = team.business_units.iter().map(|id| async move {
            match self.api.business_unit_display_name(id).await {
                Ok(name) if !name.trim().is_empty() => (id.clone(), name),
                Ok(_) => (id.clone(), id.0.clone()),
                Err(error) => {
                    warn!(
                        event_name = "settings.business_unit.unlabelled",
                        correlation_id,
                        business_unit_id = %id,
                        error = %error,
                        "falling back to business unit id"
                    );
                    (id.clone(), id.0.clone())
                }
            }
        });
        join_all(lookups).await
    }

    /// Saves a settings dialog submission, confirms privately and refreshes the intro.
    pub async fn submit_settings(
        &self,
        submission: &DialogSubmission,
        source: &SourceMessage,
        correlation_id: &str,
    ) -> Result<FeedSetting, ApplicationError> {
        let (team, bot) = self.team_and_bot(&submission.team_id).await?;
        let channel_id = &submission.channel_id;
        let current = channel_feed_settings_or_default(&team, channel_id);

        let business_unit_id = submission
            .field(BUSINESS_UNIT_FIELD)
            .map(|id| BusinessUnitId(id.to_owned()))
            .or(current.business_unit_id)
            .or_else(|| team.primary_business_unit().cloned())
            .or_else(|| self.default_business_unit.clone());
        let star_filter = submission.field(STAR_FILTER_FIELD).map(str::parse::<StarFilter>).transpose()?;
        let can_reply = submission.field(REPLY_FEATURE_FIELD).map(|value| value == "on");

        let patch = FeedSettingsPatch { business_unit_id, star_filter, can_reply };
        let team = self.store.upsert(&submission.team_id, channel_id, &patch).await?;
        let saved = channel_feed_settings_or_default(&team, channel_id);

        let confirmation = Message::text(settings_saved_text(channel_id, saved.can_reply)).ephemeral();
        if let Err(error) = bot.respond(&submission.response_url, &confirmation).await {
            warn!(
                event_name = "settings.confirmation.failed",
                correlation_id,
                channel_id = %channel_id,
                error = %error,
                "could not confirm saved settings"
            );
        }
        if let Some(response_url) = &source.response_url {
            let intro = settings_intro_message(true).replacing_original();
            if let Err(error) = bot.respond(response_url, &intro).await {
                warn!(
                    event_name = "settings.intro.refresh_failed",
                    correlation_id,
                    channel_id = %channel_id,
                    error = %error,
                    "could not refresh settings message"
                );
            }
        }
        Ok(saved)
    }

    /// "Stop posting reviews": removes the channel's feed and refreshes the intro.
    pub async fn stop_posting(
        &self,
        click: &ActionClick,
        correlation_id: &str,
    ) -> Result<Option<FeedRemoval>, ApplicationError> {
        let (_, bot) = self.team_and_bot(&click.team_id).await?;
        let (team, removal) = self.store.delete(&click.team_id, &click.channel_id).await?;
        if let Some(removal) = &removal {
            self.observer.feed_removed(&click.team_id, removal);
        }

        if let Some(response_url) = &click.response_url {
            let intro = settings_intro_message(has_channel_feed_settings(&team, &click.channel_id))
                .replacing_original();
            bot.respond(response_url, &intro).await?;
        }

        info!(
            event_name = "settings.feed.stopped",
            correlation_id,
            team_id = %click.team_id,
            channel_id = %click.channel_id,
            removed = removal.is_some(),
            "stopped posting reviews"
        );
        Ok(removal)
    }
}
