//! Replying to a review from Slack.
//!
//! `Idle -> AwaitingDialogInput -> Submitting -> {Confirmed | Failed}`. The click opens a
//! dialog whose correlation token carries the original message timestamp and review id;
//! the submission is the only place that token is read back.

use std::sync::Arc;

use tracing::{info, warn};

use reviewbot_api::ReviewApi;
use reviewbot_core::feeds::channel_feed_settings_or_default;
use reviewbot_core::{ApplicationError, ReviewId};
use reviewbot_db::FeedSettingsStore;

use crate::blocks::{reply_confirmation_message, Dialog, Message};
use crate::correlation::CorrelationToken;
use crate::events::{ActionClick, DialogSubmission};
use crate::registry::WorkspaceRegistry;

/// Reaction left on a review whose reply could not be sent.
pub const ERROR_REACTION: &str = "boom";
pub const REPLY_FIELD: &str = "reply";
pub const REPLIES_DISABLED: &str =
    "Sorry, it’s no longer possible to reply to reviews from this channel.";
pub const REPLY_FAILED: &str =
    "Something went wrong while sending your reply! Please try again shortly.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyState {
    Idle,
    AwaitingDialogInput,
    Submitting,
    Confirmed,
    Failed,
}

impl ReplyState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingDialogInput => "awaiting_dialog_input",
            Self::Submitting => "submitting",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

pub fn reply_dialog(callback_id: String) -> Dialog {
    Dialog::new("Reply to a review", callback_id, "Send").textarea("Your reply", REPLY_FIELD)
}

/// Seconds part of a Slack `action_ts` such as `"1700000000.123456"`.
fn epoch_seconds(action_ts: Option<&str>) -> Option<i64> {
    action_ts.and_then(|ts| ts.split('.').next()).and_then(|secs| secs.parse().ok())
}

pub struct ReplyWorkflow {
    store: FeedSettingsStore,
    registry: Arc<WorkspaceRegistry>,
    api: Arc<dyn ReviewApi>,
}

impl ReplyWorkflow {
    pub fn new(
        store: FeedSettingsStore,
        registry: Arc<WorkspaceRegistry>,
        api: Arc<dyn ReviewApi>,
    ) -> Self {
        Self { store, registry, api }
    }

    /// Reply button click. Stays `Idle` when the channel does not allow replies.
    pub async fn start(
        &self,
        click: &ActionClick,
        correlation_id: &str,
    ) -> Result<ReplyState, ApplicationError> {
        let team = self.store.find_team(&click.team_id).await?;
        let bot = self.registry.bot_for(&team).await?;
        let settings = channel_feed_settings_or_default(&team, &click.channel_id);

        if !settings.can_reply {
            if let Some(response_url) = &click.response_url {
                bot.respond(response_url, &Message::text(REPLIES_DISABLED).in_channel()).await?;
            }
            info!(
                event_name = "reply.start.refused",
                correlation_id,
                team_id = %click.team_id,
                channel_id = %click.channel_id,
                "replies disabled in channel"
            );
            return Ok(ReplyState::Idle);
        }

        let Some(original_ts) =
            click.message_ts.as_deref().map(str::trim).filter(|ts| !ts.is_empty())
        else {
            warn!(
                event_name = "reply.start.rejected",
                correlation_id,
                team_id = %click.team_id,
                channel_id = %click.channel_id,
                review_id = %click.callback_id,
                "reply click carries no message timestamp"
            );
            return Ok(ReplyState::Idle);
        };

        let token = CorrelationToken::ReviewReply {
            original_ts: original_ts.to_owned(),
            review_id: ReviewId(click.callback_id.clone()),
        };
        bot.open_dialog(&click.trigger_id, &reply_dialog(token.encode()?)).await?;

        info!(
            event_name = "reply.dialog.opened",
            correlation_id,
            team_id = %click.team_id,
            channel_id = %click.channel_id,
            review_id = %click.callback_id,
            "reply dialog opened"
        );
        Ok(ReplyState::AwaitingDialogInput)
    }

    /// Dialog submission. Sends the reply once; the outcome only drives Slack side effects,
    /// whose own failures are logged and never change the returned state.
    pub async fn submit(
        &self,
        submission: &DialogSubmission,
        original_ts: &str,
        review_id: &ReviewId,
        correlation_id: &str,
    ) -> Result<ReplyState, ApplicationError> {
        let team = self.store.find_team(&submission.team_id).await?;
        let bot = self.registry.bot_for(&team).await?;
        let channel = submission.channel_id.0.as_str();
        let reply = submission.field(REPLY_FIELD).unwrap_or_default();

        info!(
            event_name = "reply.submitting",
            correlation_id,
            team_id = %submission.team_id,
            channel_id = channel,
            review_id = %review_id,
            state = ReplyState::Submitting.as_str(),
            "sending review reply"
        );

        match self.api.reply_to_review(review_id, reply).await {
            Ok(()) => {
                let confirmation = reply_confirmation_message(
                    channel,
                    original_ts,
                    &submission.user_name,
                    reply,
                    epoch_seconds(submission.action_ts.as_deref()),
                );
                if let Err(error) = bot.send(&confirmation).await {
                    warn!(
                        event_name = "reply.confirmation.failed",
                        correlation_id,
                        channel_id = channel,
                        review_id = %review_id,
                        error = %error,
                        "could not post reply confirmation"
                    );
                }
                if let Err(error) = bot.remove_reaction(channel, original_ts, ERROR_REACTION).await
                {
                    warn!(
                        event_name = "reply.error_marker.clear_failed",
                        correlation_id,
                        channel_id = channel,
                        error = %error,
                        "could not clear error reaction"
                    );
                }
                info!(
                    event_name = "reply.confirmed",
                    correlation_id,
                    review_id = %review_id,
                    state = ReplyState::Confirmed.as_str(),
                    "review reply sent"
                );
                Ok(ReplyState::Confirmed)
            }
            Err(api_error) => {
                warn!(
                    event_name = "reply.failed",
                    correlation_id,
                    team_id = %submission.team_id,
                    channel_id = channel,
                    review_id = %review_id,
                    error = %api_error,
                    state = ReplyState::Failed.as_str(),
                    "review reply failed"
                );
                let notice = Message::text(REPLY_FAILED).ephemeral();
                if let Err(error) = bot.respond(&submission.response_url, &notice).await {
                    warn!(
                        event_name = "reply.failure_notice.failed",
                        correlation_id,
                        error = %error,
                        "could not notify user"
                    );
                }
                if let Err(error) = bot.add_reaction(channel, original_ts, ERROR_REACTION).await {
                    warn!(
                        event_name = "reply.error_marker.failed",
                        correlation_id,
                        channel_id = channel,
                        error = %error,
                        "could not mark review as unresolved"
                    );
                }
                Ok(ReplyState::Failed)
            }
        }
    }
}
