//! Review fan-out: one incoming review, one message per matching channel.
//!
//! Sends run concurrently and are awaited independently; a failed channel never affects
//! its siblings. A send failing because the app was removed from the workspace clears
//! every feed of the team once all sends have settled.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use reviewbot_core::feeds::{business_unit_feeds_for_star_rating, team_feeds};
use reviewbot_core::{
    ApplicationError, BusinessUnitId, ChannelId, FeedRemoval, FeedSetting, Review, ReviewId,
    Team, TeamId,
};
use reviewbot_db::FeedSettingsStore;

use crate::blocks::{compose_review_message, ComposeOptions};
use crate::client::SlackApiError;
use crate::registry::WorkspaceRegistry;

/// An inbound review for one workspace and business unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewDelivery {
    pub review: Review,
    pub team_id: TeamId,
    pub business_unit_id: BusinessUnitId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostedReview {
    pub team_id: TeamId,
    pub channel: String,
    pub ts: String,
    pub review_id: ReviewId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedDelivery {
    pub channel_id: ChannelId,
    pub error: SlackApiError,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub posted: Vec<PostedReview>,
    pub failed: Vec<FailedDelivery>,
    pub feeds_cleared: bool,
}

/// Telemetry hooks for routing outcomes.
pub trait DeliveryObserver: Send + Sync {
    fn review_posted(&self, posted: &PostedReview);
    fn feed_removed(&self, team_id: &TeamId, removal: &FeedRemoval);
}

#[derive(Default)]
pub struct TracingDeliveryObserver;

impl DeliveryObserver for TracingDeliveryObserver {
    fn review_posted(&self, posted: &PostedReview) {
        info!(
            event_name = "router.review.posted",
            team_id = %posted.team_id,
            channel_id = %posted.channel,
            review_id = %posted.review_id,
            ts = %posted.ts,
            "review posted"
        );
    }

    fn feed_removed(&self, team_id: &TeamId, removal: &FeedRemoval) {
        info!(
            event_name = "feeds.feed.removed",
            team_id = %team_id,
            channel_id = %removal.channel_id,
            business_unit_id = removal.business_unit_id.as_ref().map(|id| id.0.as_str()),
            "business unit lost a feed"
        );
    }
}

pub struct ReviewRouter {
    store: FeedSettingsStore,
    registry: Arc<WorkspaceRegistry>,
    observer: Arc<dyn DeliveryObserver>,
}

impl ReviewRouter {
    pub fn new(
        store: FeedSettingsStore,
        registry: Arc<WorkspaceRegistry>,
        observer: Arc<dyn DeliveryObserver>,
    ) -> Self {
        Self { store, registry, observer }
    }

    /// Posts the review to every feed following its business unit and star rating.
    pub async fn route(
        &self,
        delivery: &ReviewDelivery,
        correlation_id: &str,
    ) -> Result<DeliveryReport, ApplicationError> {
        let team = self.store.find_team(&delivery.team_id).await.map_err(|error| {
            warn!(
                event_name = "router.team.unresolved",
                correlation_id,
                team_id = %delivery.team_id,
                error = %error,
                "dropping review for unknown team"
            );
            error
        })?;
        let feeds = business_unit_feeds_for_star_rating(
            &team,
            &delivery.business_unit_id,
            delivery.review.stars,
        );

        info!(
            event_name = "router.fanout.started",
            correlation_id,
            team_id = %delivery.team_id,
            business_unit_id = %delivery.business_unit_id,
            review_id = %delivery.review.id,
            channels = feeds.len(),
            "routing review"
        );
        self.fan_out(&team, &delivery.review, feeds, correlation_id).await
    }

    /// Posts a fixed test review to every effective feed, ignoring business unit and
    /// star filters.
    pub async fn self_test(
        &self,
        team_id: &TeamId,
        correlation_id: &str,
    ) -> Result<DeliveryReport, ApplicationError> {
        let team = self.store.find_team(team_id).await?;
        let review = Review::self_test(Utc::now());

        info!(event_name = "router.self_test.started", correlation_id, team_id = %team_id, "self test");
        let feeds = team_feeds(&team);
        self.fan_out(&team, &review, feeds, correlation_id).await
    }

    /// The bot is only resolved when at least one feed matches.
    async fn fan_out(
        &self,
        team: &Team,
        review: &Review,
        feeds: Vec<FeedSetting>,
        correlation_id: &str,
    ) -> Result<DeliveryReport, ApplicationError> {
        let team_id = &team.id;
        if feeds.is_empty() {
            debug!(
                event_name = "router.fanout.skipped",
                correlation_id,
                team_id = %team_id,
                review_id = %review.id,
                "no feed matches the review"
            );
            return Ok(DeliveryReport::default());
        }
        let bot = self.registry.bot_for(team).await?;
        let bot = bot.as_ref();

        let sends = feeds.into_iter().map(|feed| async move {
            let mut message =
                compose_review_message(review, ComposeOptions { can_reply: feed.can_reply });
            message.username = Some(bot.name().to_owned());
            message.channel = Some(feed.channel_id.0.clone());
            (feed.channel_id, bot.send(&message).await)
        });

        let mut report = DeliveryReport::default();
        for (channel_id, result) in join_all(sends).await {
            match result {
                Ok(posted) => {
                    let posted = PostedReview {
                        team_id: team_id.clone(),
                        channel: posted.channel,
                        ts: posted.ts,
                        review_id: review.id.clone(),
                    };
                    self.observer.review_posted(&posted);
                    report.posted.push(posted);
                }
                Err(send_error) => {
                    error!(
                        event_name = "router.delivery.failed",
                        correlation_id,
                        team_id = %team_id,
                        channel_id = %channel_id,
                        review_id = %review.id,
                        error = %send_error,
                        "review delivery failed"
                    );
                    report.failed.push(FailedDelivery { channel_id, error: send_error });
                }
            }
        }

        if report.failed.iter().any(|failure| failure.error.is_integration_revoked()) {
            self.store.clear_all(team_id).await?;
            self.registry.teardown(team_id).await;
            report.feeds_cleared = true;
            warn!(
                event_name = "router.integration.revoked",
                correlation_id,
                team_id = %team_id,
                "app removed from workspace, feeds cleared"
            );
        }
        Ok(report)
    }
}
