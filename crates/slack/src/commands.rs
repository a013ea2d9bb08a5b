use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use reviewbot_api::ReviewApi;
use reviewbot_core::feeds::channel_feed_settings;
use reviewbot_core::{ApplicationError, BusinessUnitId, ChannelId, StarRating, TeamId};
use reviewbot_db::FeedSettingsStore;

use crate::blocks::{compose_review_message, ComposeOptions, Message};
use crate::registry::WorkspaceRegistry;

pub const NO_MATCHING_REVIEW: &str = "Sorry, I could not find a matching review.";

/// Form fields Slack posts for a slash command invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub team_id: String,
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub response_url: String,
    #[serde(default)]
    pub trigger_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlashCommand {
    /// `"<1-5> star(s)"` asks for that rating; `"latest"`/`"last"` for any rating.
    ReviewQuery { stars: Option<StarRating> },
    FeedSettings,
    TestFeeds,
}

impl SlashCommand {
    pub fn name(self) -> &'static str {
        match self {
            Self::ReviewQuery { .. } => "review_query",
            Self::FeedSettings => "feed_settings",
            Self::TestFeeds => "test_feeds",
        }
    }
}

/// Classifies slash command text. Anything unrecognised is `None` and ignored.
pub fn classify(text: &str) -> Option<SlashCommand> {
    let text = text.trim();
    let lowered = text.to_ascii_lowercase();

    if let Some(stars) = parse_star_query(&lowered) {
        return Some(SlashCommand::ReviewQuery { stars: Some(stars) });
    }
    if lowered == "latest" || lowered == "last" {
        return Some(SlashCommand::ReviewQuery { stars: None });
    }
    match text {
        "settings" | "feed" => Some(SlashCommand::FeedSettings),
        "test" => Some(SlashCommand::TestFeeds),
        _ => None,
    }
}

fn parse_star_query(lowered: &str) -> Option<StarRating> {
    let (count, unit) = lowered.split_once(' ')?;
    if unit != "star" && unit != "stars" {
        return None;
    }
    if count.len() != 1 {
        return None;
    }
    let value = count.parse::<u8>().ok()?;
    StarRating::new(value).ok()
}

/// Answers review queries with the newest unanswered review, privately.
pub struct ReviewQueryService {
    store: FeedSettingsStore,
    registry: Arc<WorkspaceRegistry>,
    api: Arc<dyn ReviewApi>,
    default_business_unit: Option<BusinessUnitId>,
}

impl ReviewQueryService {
    pub fn new(
        store: FeedSettingsStore,
        registry: Arc<WorkspaceRegistry>,
        api: Arc<dyn ReviewApi>,
        default_business_unit: Option<BusinessUnitId>,
    ) -> Self {
        Self { store, registry, api, default_business_unit }
    }

    /// Returns whether a review was found. Platform failures are answered with a short
    /// notice and reported as an error.
    pub async fn handle(
        &self,
        payload: &SlashCommandPayload,
        stars: Option<StarRating>,
        correlation_id: &str,
    ) -> Result<bool, ApplicationError> {
        let team_id = TeamId(payload.team_id.clone());
        let channel_id = ChannelId(payload.channel_id.clone());
        let team = self.store.find_team(&team_id).await?;
        let bot = self.registry.bot_for(&team).await?;

        // The channel's own business unit first, then the team's, then the configured one.
        let settings = channel_feed_settings(&team, &channel_id);
        let can_reply = settings.as_ref().is_some_and(|feed| feed.can_reply);
        let business_unit_id = settings
            .and_then(|feed| feed.business_unit_id)
            .or_else(|| team.primary_business_unit().cloned())
            .or_else(|| self.default_business_unit.clone());

        let Some(business_unit_id) = business_unit_id else {
            bot.respond(&payload.response_url, &Message::text(NO_MATCHING_REVIEW).ephemeral())
                .await?;
            return Ok(false);
        };

        let review = match self.api.last_unanswered_review(&business_unit_id, stars).await {
            Ok(review) => review,
            Err(api_error) => {
                let error = ApplicationError::from(api_error);
                warn!(
                    event_name = "query.review.failed",
                    correlation_id,
                    team_id = %team_id,
                    business_unit_id = %business_unit_id,
                    error = %error,
                    "review query failed"
                );
                let notice = Message::text(error.user_message()).ephemeral();
                bot.respond(&payload.response_url, &notice).await?;
                return Err(error);
            }
        };

        let found = review.is_some();
        let reply = match review {
            Some(review) => compose_review_message(&review, ComposeOptions { can_reply }),
            None => Message::text(NO_MATCHING_REVIEW),
        };
        bot.respond(&payload.response_url, &reply.ephemeral()).await?;

        info!(
            event_name = "query.review.answered",
            correlation_id,
            team_id = %team_id,
            channel_id = %channel_id,
            stars = stars.map(StarRating::value),
            found,
            "review query answered"
        );
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use reviewbot_core::StarRating;

    use super::{classify, SlashCommand};

    fn stars(value: u8) -> Option<SlashCommand> {
        Some(SlashCommand::ReviewQuery { stars: Some(StarRating::new(value).expect("valid")) })
    }

    #[test]
    fn star_queries_are_case_insensitive() {
        assert_eq!(classify("1 star"), stars(1));
        assert_eq!(classify("3 Stars"), stars(3));
        assert_eq!(classify("5 STARS"), stars(5));
        assert_eq!(classify("4 star"), stars(4));
    }

    #[test]
    fn latest_accepts_short_form() {
        let latest = Some(SlashCommand::ReviewQuery { stars: None });
        assert_eq!(classify("latest"), latest);
        assert_eq!(classify("LAST"), latest);
        assert_eq!(classify("Latest"), latest);
    }

    #[test]
    fn settings_and_test_are_exact() {
        assert_eq!(classify("settings"), Some(SlashCommand::FeedSettings));
        assert_eq!(classify("feed"), Some(SlashCommand::FeedSettings));
        assert_eq!(classify("test"), Some(SlashCommand::TestFeeds));
        assert_eq!(classify("test").map(SlashCommand::name), Some("test_feeds"));
    }

    #[test]
    fn everything_else_is_ignored() {
        for text in ["", "0 stars", "6 stars", "10 stars", "3 starz", "lates", "help", "settings now"] {
            assert_eq!(classify(text), None, "{text:?}");
        }
    }
}
