use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Mutex;

use reviewbot_api::{ApiError, ReviewApi};
use reviewbot_core::{
    BotCredentials, BusinessUnitId, ChannelId, FeedSetting, Review, ReviewId, StarFilter,
    StarRating, Team, TeamId,
};
use reviewbot_db::{FeedSettingsStore, InMemoryTeamRepository};
use reviewbot_slack::blocks::{Dialog, Message};
use reviewbot_slack::client::{PostedMessage, SlackUser};
use reviewbot_slack::{
    SlackApiError, SlackServices, SlackTransport, TracingDeliveryObserver, WorkspaceRegistry,
};

use crate::routes::AppState;

pub const SECRET: &str = "test-signing-secret";

#[derive(Default)]
pub struct FakeTransport {
    pub posted: Mutex<Vec<Message>>,
}

#[async_trait]
impl SlackTransport for FakeTransport {
    async fn post_message(&self, _: &str, message: &Message) -> Result<PostedMessage, SlackApiError> {
        let mut posted = self.posted.lock().await;
        posted.push(message.clone());
        Ok(PostedMessage {
            channel: message.channel.clone().unwrap_or_default(),
            ts: format!("1700.{}", posted.len()),
        })
    }

    async fn respond(&self, _: &str, _: &Message) -> Result<(), SlackApiError> {
        Ok(())
    }

    async fn open_dialog(&self, _: &str, _: &str, _: &Dialog) -> Result<(), SlackApiError> {
        Ok(())
    }

    async fn add_reaction(&self, _: &str, _: &str, _: &str, _: &str) -> Result<(), SlackApiError> {
        Ok(())
    }

    async fn remove_reaction(&self, _: &str, _: &str, _: &str, _: &str) -> Result<(), SlackApiError> {
        Ok(())
    }

    async fn user_info(&self, _: &str, user_id: &str) -> Result<SlackUser, SlackApiError> {
        Ok(SlackUser { id: user_id.to_owned(), ..SlackUser::default() })
    }
}

struct QuietReviewApi;

#[async_trait]
impl ReviewApi for QuietReviewApi {
    async fn last_unanswered_review(
        &self,
        _: &BusinessUnitId,
        _: Option<StarRating>,
    ) -> Result<Option<Review>, ApiError> {
        Ok(None)
    }

    async fn reply_to_review(&self, _: &ReviewId, _: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn business_unit_display_name(&self, id: &BusinessUnitId) -> Result<String, ApiError> {
        Ok(id.0.clone())
    }
}

pub struct Harness {
    pub state: AppState,
    pub transport: Arc<FakeTransport>,
}

/// Team `T1` with a bot and one feed on `C1` following `bu-1`.
pub fn harness(default_business_unit: Option<&str>) -> Harness {
    let mut team = Team::new(TeamId("T1".to_owned()));
    team.bot = Some(BotCredentials {
        user_id: "UBOT".to_owned(),
        name: "reviewbot".to_owned(),
        access_token: "xoxb-1".to_owned(),
    });
    team.register_business_unit(BusinessUnitId("bu-1".to_owned()));
    team.feeds.push(FeedSetting {
        channel_id: ChannelId("C1".to_owned()),
        business_unit_id: Some(BusinessUnitId("bu-1".to_owned())),
        star_filter: StarFilter::All,
        can_reply: false,
    });

    let transport = Arc::new(FakeTransport::default());
    let default_business_unit = default_business_unit.map(|id| BusinessUnitId(id.to_owned()));
    let services = SlackServices::new(
        FeedSettingsStore::new(Arc::new(InMemoryTeamRepository::with_teams([team]))),
        Arc::new(WorkspaceRegistry::new(transport.clone(), "reviewbot")),
        Arc::new(QuietReviewApi),
        Arc::new(TracingDeliveryObserver),
        default_business_unit.clone(),
    );
    let state =
        AppState::new(services, SecretString::from(SECRET.to_owned()), default_business_unit);
    Harness { state, transport }
}

/// Waits for background handlers to post at least `expected` messages.
pub async fn posted_messages(transport: &FakeTransport, expected: usize) -> Vec<Message> {
    for _ in 0..200 {
        let posted = transport.posted.lock().await.clone();
        if posted.len() >= expected {
            return posted;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    transport.posted.lock().await.clone()
}
