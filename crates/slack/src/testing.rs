//! Scripted fakes shared by the unit tests of this crate.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};

use reviewbot_api::{ApiError, ReviewApi};
use reviewbot_core::{
    BotCredentials, BusinessUnitId, ChannelId, Consumer, FeedSetting, Review, ReviewId,
    StarFilter, StarRating, Team, TeamId,
};
use reviewbot_db::{FeedSettingsStore, InMemoryTeamRepository};

use crate::blocks::{Dialog, Message};
use crate::client::{PostedMessage, SlackApiError, SlackTransport, SlackUser};
use crate::registry::WorkspaceRegistry;

#[derive(Default)]
pub(crate) struct RecordingTransport {
    state: Mutex<Recorded>,
}

#[derive(Default)]
pub(crate) struct Recorded {
    pub post_failures: HashMap<String, VecDeque<SlackApiError>>,
    pub admins: Vec<String>,
    pub posted: Vec<Message>,
    pub responses: Vec<(String, Message)>,
    pub dialogs: Vec<Dialog>,
    pub reactions_added: Vec<String>,
    pub reactions_removed: Vec<String>,
}

impl RecordingTransport {
    pub(crate) fn failing(channel: &str, error: SlackApiError) -> Self {
        let mut state = Recorded::default();
        state.post_failures.entry(channel.to_owned()).or_default().push_back(error);
        Self { state: Mutex::new(state) }
    }

    pub(crate) fn with_admin(user_id: &str) -> Self {
        let state = Recorded { admins: vec![user_id.to_owned()], ..Recorded::default() };
        Self { state: Mutex::new(state) }
    }

    pub(crate) async fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.state.lock().await
    }

    pub(crate) async fn posted_channels(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut channels =
            state.posted.iter().filter_map(|message| message.channel.clone()).collect::<Vec<_>>();
        channels.sort();
        channels
    }
}

#[async_trait]
impl SlackTransport for RecordingTransport {
    async fn post_message(
        &self,
        _token: &str,
        message: &Message,
    ) -> Result<PostedMessage, SlackApiError> {
        let mut state = self.state.lock().await;
        let channel = message.channel.clone().unwrap_or_default();
        if let Some(error) = state.post_failures.get_mut(&channel).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        state.posted.push(message.clone());
        Ok(PostedMessage { channel, ts: format!("1700.{}", state.posted.len()) })
    }

    async fn respond(&self, response_url: &str, message: &Message) -> Result<(), SlackApiError> {
        self.state.lock().await.responses.push((response_url.to_owned(), message.clone()));
        Ok(())
    }

    async fn open_dialog(
        &self,
        _token: &str,
        _trigger_id: &str,
        dialog: &Dialog,
    ) -> Result<(), SlackApiError> {
        self.state.lock().await.dialogs.push(dialog.clone());
        Ok(())
    }

    async fn add_reaction(
        &self,
        _token: &str,
        _channel: &str,
        _ts: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        self.state.lock().await.reactions_added.push(name.to_owned());
        Ok(())
    }

    async fn remove_reaction(
        &self,
        _token: &str,
        _channel: &str,
        _ts: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        self.state.lock().await.reactions_removed.push(name.to_owned());
        Err(SlackApiError::api("no_reaction"))
    }

    async fn user_info(&self, _token: &str, user_id: &str) -> Result<SlackUser, SlackApiError> {
        let state = self.state.lock().await;
        Ok(SlackUser {
            id: user_id.to_owned(),
            name: user_id.to_lowercase(),
            is_admin: state.admins.iter().any(|admin| admin == user_id),
            is_owner: false,
        })
    }
}

pub(crate) struct ScriptedReviewApi {
    reply_result: Result<(), ApiError>,
    review: Option<Review>,
    pub replies: Mutex<Vec<(ReviewId, String)>>,
    pub queries: Mutex<Vec<(BusinessUnitId, Option<StarRating>)>>,
}

impl ScriptedReviewApi {
    pub(crate) fn answering(reply_result: Result<(), ApiError>) -> Self {
        Self {
            reply_result,
            review: None,
            replies: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_review(review: Review) -> Self {
        Self { review: Some(review), ..Self::answering(Ok(())) }
    }
}

#[async_trait]
impl ReviewApi for ScriptedReviewApi {
    async fn last_unanswered_review(
        &self,
        business_unit_id: &BusinessUnitId,
        stars: Option<StarRating>,
    ) -> Result<Option<Review>, ApiError> {
        self.queries.lock().await.push((business_unit_id.clone(), stars));
        Ok(self.review.clone())
    }

    async fn reply_to_review(&self, review_id: &ReviewId, message: &str) -> Result<(), ApiError> {
        self.replies.lock().await.push((review_id.clone(), message.to_owned()));
        self.reply_result.clone()
    }

    async fn business_unit_display_name(
        &self,
        business_unit_id: &BusinessUnitId,
    ) -> Result<String, ApiError> {
        Ok(format!("Shop {business_unit_id}"))
    }
}

pub(crate) fn feed(channel: &str, star_filter: StarFilter, can_reply: bool) -> FeedSetting {
    FeedSetting {
        channel_id: ChannelId(channel.to_owned()),
        business_unit_id: Some(BusinessUnitId("bu-1".to_owned())),
        star_filter,
        can_reply,
    }
}

pub(crate) fn installed_team(feeds: Vec<FeedSetting>) -> Team {
    let mut team = Team::new(TeamId("T1".to_owned()));
    team.bot = Some(BotCredentials {
        user_id: "UBOT".to_owned(),
        name: "reviewbot".to_owned(),
        access_token: "xoxb-1".to_owned(),
    });
    team.register_business_unit(BusinessUnitId("bu-1".to_owned()));
    team.feeds = feeds;
    team
}

pub(crate) fn review(stars: u8) -> Review {
    Review {
        id: ReviewId("r-1".to_owned()),
        stars: StarRating::new(stars).expect("valid rating"),
        title: "Title".to_owned(),
        text: "Body".to_owned(),
        created_at: Utc::now(),
        consumer: Consumer { display_name: "Jane".to_owned() },
        is_verified: true,
        reference_id: None,
    }
}

/// Store over an in-memory repository holding `team`, plus the repository itself.
pub(crate) fn store_with(team: Team) -> (FeedSettingsStore, Arc<InMemoryTeamRepository>) {
    let repository = Arc::new(InMemoryTeamRepository::with_teams([team]));
    (FeedSettingsStore::new(repository.clone()), repository)
}

pub(crate) fn registry_over(transport: Arc<RecordingTransport>) -> Arc<WorkspaceRegistry> {
    Arc::new(WorkspaceRegistry::new(transport, "reviewbot"))
}
