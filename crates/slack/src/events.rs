use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use reviewbot_api::ReviewApi;
use reviewbot_core::{ApplicationError, BusinessUnitId, ChannelId, TeamId};
use reviewbot_db::FeedSettingsStore;

use crate::{
    blocks::{DELETE_FEED_SETTINGS_ACTION, OPEN_FEED_SETTINGS_ACTION, REPLY_ACTION},
    commands::{classify, ReviewQueryService, SlashCommand, SlashCommandPayload},
    correlation::{token_version, CorrelationToken},
    registry::WorkspaceRegistry,
    reply::ReplyWorkflow,
    router::{DeliveryObserver, ReviewRouter},
    settings::FeedSettingsService,
};

/// A button click on a message posted by the bot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionClick {
    pub team_id: TeamId,
    pub channel_id: ChannelId,
    pub user_id: String,
    pub user_name: String,
    /// Value of the clicked button.
    pub action: String,
    /// Callback id of the attachment holding the button; the review id for review messages.
    pub callback_id: String,
    pub message_ts: Option<String>,
    pub trigger_id: String,
    pub response_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogSubmission {
    pub team_id: TeamId,
    pub channel_id: ChannelId,
    pub user_id: String,
    pub user_name: String,
    pub callback_id: String,
    pub submission: HashMap<String, String>,
    pub action_ts: Option<String>,
    pub response_url: String,
}

impl DialogSubmission {
    /// A submitted value; blank inputs count as missing.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.submission.get(name).map(String::as_str).filter(|value| !value.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    ActionClicked(ActionClick),
    DialogSubmitted(DialogSubmission),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::ActionClicked(_) => SlackEventType::ActionClicked,
            Self::DialogSubmitted(_) => SlackEventType::DialogSubmitted,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    pub fn team_id(&self) -> Option<&str> {
        match self {
            Self::SlashCommand(payload) => Some(payload.team_id.as_str()),
            Self::ActionClicked(click) => Some(click.team_id.0.as_str()),
            Self::DialogSubmitted(submission) => Some(submission.team_id.0.as_str()),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    ActionClicked,
    DialogSubmitted,
    Unsupported,
}

impl SlackEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SlashCommand => "slash_command",
            Self::ActionClicked => "action_clicked",
            Self::DialogSubmitted => "dialog_submitted",
            Self::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InteractionParseError {
    #[error("interaction payload is not valid JSON: {0}")]
    Json(String),
    #[error("interaction payload is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Deserialize)]
struct RawInteraction {
    #[serde(rename = "type", default)]
    kind: String,
    team: Option<RawId>,
    channel: Option<RawId>,
    user: Option<RawUser>,
    #[serde(default)]
    actions: Vec<RawAction>,
    #[serde(default)]
    callback_id: String,
    message_ts: Option<String>,
    action_ts: Option<String>,
    #[serde(default)]
    trigger_id: String,
    response_url: Option<String>,
    #[serde(default)]
    submission: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct RawId {
    id: String,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct RawAction {
    value: Option<String>,
}

/// Parses the JSON carried in the `payload` form field of an interaction request.
pub fn parse_interaction(raw: &str) -> Result<SlackEvent, InteractionParseError> {
    let interaction: RawInteraction =
        serde_json::from_str(raw).map_err(|error| InteractionParseError::Json(error.to_string()))?;

    match interaction.kind.as_str() {
        "interactive_message" | "dialog_submission" => {}
        other => return Ok(SlackEvent::Unsupported { event_type: other.to_owned() }),
    }

    let team_id = TeamId(interaction.team.ok_or(InteractionParseError::MissingField("team"))?.id);
    let channel_id =
        ChannelId(interaction.channel.ok_or(InteractionParseError::MissingField("channel"))?.id);
    let user = interaction.user.ok_or(InteractionParseError::MissingField("user"))?;

    if interaction.kind == "dialog_submission" {
        let submission = interaction
            .submission
            .into_iter()
            .filter_map(|(name, value)| match value {
                Value::Null => None,
                Value::String(text) => Some((name, text)),
                other => Some((name, other.to_string())),
            })
            .collect();
        return Ok(SlackEvent::DialogSubmitted(DialogSubmission {
            team_id,
            channel_id,
            user_id: user.id,
            user_name: user.name,
            callback_id: interaction.callback_id,
            submission,
            action_ts: interaction.action_ts,
            response_url: interaction
                .response_url
                .ok_or(InteractionParseError::MissingField("response_url"))?,
        }));
    }

    let action = interaction
        .actions
        .into_iter()
        .next()
        .and_then(|action| action.value)
        .ok_or(InteractionParseError::MissingField("actions"))?;
    Ok(SlackEvent::ActionClicked(ActionClick {
        team_id,
        channel_id,
        user_id: user.id,
        user_name: user.name,
        action,
        callback_id: interaction.callback_id,
        message_ts: interaction.message_ts,
        trigger_id: interaction.trigger_id,
        response_url: interaction.response_url,
    }))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed { outcome: &'static str },
    Ignored,
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, ApplicationError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, ApplicationError> {
        let event_type = event.event_type();
        let Some(handler) = self.handlers.get(&event_type) else {
            debug!(
                event_name = "slack.event.ignored",
                correlation_id = %ctx.correlation_id,
                event_type = event_type.as_str(),
                "no handler registered"
            );
            return Ok(HandlerResult::Ignored);
        };

        let result = handler.handle(event, ctx).await?;
        info!(
            event_name = "slack.event.dispatched",
            correlation_id = %ctx.correlation_id,
            event_type = event_type.as_str(),
            team_id = event.team_id().unwrap_or_default(),
            result = ?result,
            "slack event handled"
        );
        Ok(result)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Everything the Slack surface needs, built once at startup.
#[derive(Clone)]
pub struct SlackServices {
    pub router: Arc<ReviewRouter>,
    pub queries: Arc<ReviewQueryService>,
    pub settings: Arc<FeedSettingsService>,
    pub replies: Arc<ReplyWorkflow>,
}

impl SlackServices {
    pub fn new(
        store: FeedSettingsStore,
        registry: Arc<WorkspaceRegistry>,
        api: Arc<dyn ReviewApi>,
        observer: Arc<dyn DeliveryObserver>,
        default_business_unit: Option<BusinessUnitId>,
    ) -> Self {
        Self {
            router: Arc::new(ReviewRouter::new(
                store.clone(),
                Arc::clone(&registry),
                Arc::clone(&observer),
            )),
            queries: Arc::new(ReviewQueryService::new(
                store.clone(),
                Arc::clone(&registry),
                Arc::clone(&api),
                default_business_unit.clone(),
            )),
            settings: Arc::new(FeedSettingsService::new(
                store.clone(),
                Arc::clone(&registry),
                Arc::clone(&api),
                observer,
                default_business_unit,
            )),
            replies: Arc::new(ReplyWorkflow::new(store, registry, api)),
        }
    }
}

pub fn build_dispatcher(services: &SlackServices) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler { services: services.clone() });
    dispatcher.register(ActionClickHandler { services: services.clone() });
    dispatcher.register(DialogSubmissionHandler { services: services.clone() });
    dispatcher
}

pub struct SlashCommandHandler {
    services: SlackServices,
}

#[async_trait]
impl EventHandler for SlashCommandHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, ApplicationError> {
        let SlackEvent::SlashCommand(payload) = event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(command) = classify(&payload.text) else {
            return Ok(HandlerResult::Ignored);
        };

        let correlation_id = ctx.correlation_id.as_str();
        let outcome = match command {
            SlashCommand::ReviewQuery { stars } => {
                let found = self.services.queries.handle(payload, stars, correlation_id).await?;
                if found {
                    "review_shown"
                } else {
                    "no_review"
                }
            }
            SlashCommand::FeedSettings => {
                self.services.settings.handle_settings_command(payload, correlation_id).await?;
                command.name()
            }
            SlashCommand::TestFeeds => {
                let team_id = TeamId(payload.team_id.clone());
                self.services.router.self_test(&team_id, correlation_id).await?;
                command.name()
            }
        };
        Ok(HandlerResult::Processed { outcome })
    }
}

pub struct ActionClickHandler {
    services: SlackServices,
}

#[async_trait]
impl EventHandler for ActionClickHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ActionClicked
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, ApplicationError> {
        let SlackEvent::ActionClicked(click) = event else {
            return Ok(HandlerResult::Ignored);
        };

        let correlation_id = ctx.correlation_id.as_str();
        match click.action.as_str() {
            REPLY_ACTION => {
                let state = self.services.replies.start(click, correlation_id).await?;
                Ok(HandlerResult::Processed { outcome: state.as_str() })
            }
            OPEN_FEED_SETTINGS_ACTION => {
                self.services.settings.open_settings_dialog(click, correlation_id).await?;
                Ok(HandlerResult::Processed { outcome: "settings_dialog_opened" })
            }
            DELETE_FEED_SETTINGS_ACTION => {
                self.services.settings.stop_posting(click, correlation_id).await?;
                Ok(HandlerResult::Processed { outcome: "feed_stopped" })
            }
            _ => Ok(HandlerResult::Ignored),
        }
    }
}

pub struct DialogSubmissionHandler {
    services: SlackServices,
}

#[async_trait]
impl EventHandler for DialogSubmissionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::DialogSubmitted
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, ApplicationError> {
        let SlackEvent::DialogSubmitted(submission) = event else {
            return Ok(HandlerResult::Ignored);
        };

        let correlation_id = ctx.correlation_id.as_str();
        let token = CorrelationToken::decode(&submission.callback_id)?;
        debug!(
            event_name = "slack.dialog.decoded",
            correlation_id,
            team_id = %submission.team_id,
            dialog_type = token.dialog_type(),
            token_version = token_version(&submission.callback_id),
            "dialog token decoded"
        );
        match token {
            CorrelationToken::ReviewReply { original_ts, review_id } => {
                let state = self
                    .services
                    .replies
                    .submit(submission, &original_ts, &review_id, correlation_id)
                    .await?;
                Ok(HandlerResult::Processed { outcome: state.as_str() })
            }
            CorrelationToken::FeedSettings { source_message } => {
                self.services.settings.submit_settings(submission, &source_message, correlation_id).await?;
                Ok(HandlerResult::Processed { outcome: "settings_saved" })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use reviewbot_core::{
        feeds::channel_feed_settings, ApplicationError, BusinessUnitId, ChannelId, DomainError,
        StarFilter, StarRating, TeamId,
    };
    use reviewbot_db::{InMemoryTeamRepository, TeamRepository};

    use super::{
        build_dispatcher, parse_interaction, EventContext, EventDispatcher, HandlerResult,
        InteractionParseError, SlackEvent, SlackServices,
    };
    use crate::commands::SlashCommandPayload;
    use crate::correlation::{CorrelationToken, SourceMessage};
    use crate::router::TracingDeliveryObserver;
    use crate::settings::{ADMIN_ONLY, DIRECT_MESSAGE_REFUSAL, REPLIES_ALLOWED};
    use crate::testing::{
        feed, installed_team, registry_over, review, store_with, RecordingTransport,
        ScriptedReviewApi,
    };

    struct Harness {
        dispatcher: EventDispatcher,
        transport: Arc<RecordingTransport>,
        api: Arc<ScriptedReviewApi>,
        repository: Arc<InMemoryTeamRepository>,
    }

    fn harness(transport: RecordingTransport, api: ScriptedReviewApi) -> Harness {
        let (store, repository) =
            store_with(installed_team(vec![feed("C1", StarFilter::All, true)]));
        let transport = Arc::new(transport);
        let api = Arc::new(api);
        let services = SlackServices::new(
            store,
            registry_over(transport.clone()),
            api.clone(),
            Arc::new(TracingDeliveryObserver),
            None,
        );
        Harness { dispatcher: build_dispatcher(&services), transport, api, repository }
    }

    fn slash(channel: &str, text: &str) -> SlackEvent {
        SlackEvent::SlashCommand(SlashCommandPayload {
            team_id: "T1".to_owned(),
            channel_id: channel.to_owned(),
            user_id: "UADMIN".to_owned(),
            user_name: "ann".to_owned(),
            command: "/reviews".to_owned(),
            text: text.to_owned(),
            response_url: "https://hooks.example.test/cmd".to_owned(),
            trigger_id: "trigger-1".to_owned(),
        })
    }

    fn ctx() -> EventContext {
        EventContext { correlation_id: "corr-test".to_owned() }
    }

    #[test]
    fn button_click_payload_is_parsed() {
        let raw = json!({
            "type": "interactive_message",
            "callback_id": "r-42",
            "team": { "id": "T1", "domain": "acme" },
            "channel": { "id": "C1", "name": "reviews" },
            "user": { "id": "U1", "name": "ann" },
            "actions": [{ "name": "step_1_write_reply", "type": "button", "value": "step_1_write_reply" }],
            "message_ts": "1700.1",
            "trigger_id": "trigger-9",
            "response_url": "https://hooks.example.test/r"
        })
        .to_string();

        let SlackEvent::ActionClicked(click) = parse_interaction(&raw).expect("parse") else {
            panic!("expected an action click");
        };
        assert_eq!(click.team_id, TeamId("T1".to_owned()));
        assert_eq!(click.action, "step_1_write_reply");
        assert_eq!(click.callback_id, "r-42");
        assert_eq!(click.message_ts.as_deref(), Some("1700.1"));
        assert_eq!(click.trigger_id, "trigger-9");
    }

    #[test]
    fn dialog_submission_values_become_strings() {
        let raw = json!({
            "type": "dialog_submission",
            "callback_id": "{\"dialogType\":\"review_reply\"}",
            "team": { "id": "T1" },
            "channel": { "id": "C1" },
            "user": { "id": "U1", "name": "ann" },
            "submission": { "reply": "Thanks", "starFilter": "", "count": 3, "missing": null },
            "action_ts": "1700000100.5",
            "response_url": "https://hooks.example.test/d"
        })
        .to_string();

        let SlackEvent::DialogSubmitted(submission) = parse_interaction(&raw).expect("parse") else {
            panic!("expected a dialog submission");
        };
        assert_eq!(submission.field("reply"), Some("Thanks"));
        assert_eq!(submission.field("count"), Some("3"));
        assert_eq!(submission.field("starFilter"), None);
        assert_eq!(submission.field("missing"), None);
    }

    #[test]
    fn other_interaction_types_are_unsupported() {
        let raw = json!({ "type": "block_actions" }).to_string();
        assert_eq!(
            parse_interaction(&raw).expect("parse"),
            SlackEvent::Unsupported { event_type: "block_actions".to_owned() }
        );
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(matches!(parse_interaction("not json"), Err(InteractionParseError::Json(_))));

        let no_team = json!({ "type": "interactive_message", "actions": [] }).to_string();
        assert_eq!(parse_interaction(&no_team), Err(InteractionParseError::MissingField("team")));
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();
        let result = dispatcher.dispatch(&slash("C1", "latest"), &ctx()).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);
    }

    #[test]
    fn build_dispatcher_registers_every_interaction() {
        let h = harness(RecordingTransport::default(), ScriptedReviewApi::answering(Ok(())));
        assert_eq!(h.dispatcher.handler_count(), 3);
    }

    #[tokio::test]
    async fn unrecognised_command_text_is_ignored() {
        let h = harness(RecordingTransport::default(), ScriptedReviewApi::answering(Ok(())));

        let result = h.dispatcher.dispatch(&slash("C1", "help"), &ctx()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
        assert!(h.transport.recorded().await.responses.is_empty());
    }

    #[tokio::test]
    async fn star_query_uses_the_channel_business_unit() {
        let h = harness(RecordingTransport::default(), ScriptedReviewApi::with_review(review(3)));

        let result =
            h.dispatcher.dispatch(&slash("C1", "3 stars"), &ctx()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Processed { outcome: "review_shown" });
        assert_eq!(
            h.api.queries.lock().await.clone(),
            vec![(BusinessUnitId("bu-1".to_owned()), Some(StarRating::new(3).expect("valid")))]
        );
        let recorded = h.transport.recorded().await;
        assert_eq!(recorded.responses.len(), 1);
        assert_eq!(recorded.responses[0].1.attachments.len(), 1);
    }

    #[tokio::test]
    async fn settings_are_refused_in_direct_messages() {
        let h = harness(RecordingTransport::with_admin("UADMIN"), ScriptedReviewApi::answering(Ok(())));

        h.dispatcher.dispatch(&slash("D123", "settings"), &ctx()).await.expect("dispatch");

        let recorded = h.transport.recorded().await;
        assert_eq!(recorded.responses[0].1.text.as_deref(), Some(DIRECT_MESSAGE_REFUSAL));
    }

    #[tokio::test]
    async fn settings_need_an_administrator() {
        let h = harness(RecordingTransport::default(), ScriptedReviewApi::answering(Ok(())));

        h.dispatcher.dispatch(&slash("C1", "settings"), &ctx()).await.expect("dispatch");

        let recorded = h.transport.recorded().await;
        assert_eq!(recorded.responses[0].1.text.as_deref(), Some(ADMIN_ONLY));
    }

    #[tokio::test]
    async fn settings_submission_saves_the_channel_feed() {
        let h = harness(RecordingTransport::default(), ScriptedReviewApi::answering(Ok(())));
        let token = CorrelationToken::FeedSettings {
            source_message: SourceMessage {
                ts: Some("1700.5".to_owned()),
                response_url: Some("https://hooks.example.test/intro".to_owned()),
                channel: "C9".to_owned(),
            },
        };
        let raw = json!({
            "type": "dialog_submission",
            "callback_id": token.encode().expect("encode"),
            "team": { "id": "T1" },
            "channel": { "id": "C9" },
            "user": { "id": "UADMIN", "name": "ann" },
            "submission": { "starFilter": "negative", "replyFeature": "on" },
            "response_url": "https://hooks.example.test/d"
        })
        .to_string();
        let event = parse_interaction(&raw).expect("parse");

        let result = h.dispatcher.dispatch(&event, &ctx()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Processed { outcome: "settings_saved" });
        let team = h
            .repository
            .find_by_id(&TeamId("T1".to_owned()))
            .await
            .expect("find")
            .expect("team");
        let saved = channel_feed_settings(&team, &ChannelId("C9".to_owned())).expect("feed saved");
        assert_eq!(saved.star_filter, StarFilter::Negative);
        assert!(saved.can_reply);
        assert_eq!(saved.business_unit_id, Some(BusinessUnitId("bu-1".to_owned())));

        let recorded = h.transport.recorded().await;
        let urls = recorded.responses.iter().map(|(url, _)| url.as_str()).collect::<Vec<_>>();
        assert_eq!(urls, vec!["https://hooks.example.test/d", "https://hooks.example.test/intro"]);
        assert_eq!(recorded.responses[0].1.text.as_deref(), Some(REPLIES_ALLOWED));
    }

    #[tokio::test]
    async fn stop_posting_removes_the_feed() {
        let h = harness(RecordingTransport::default(), ScriptedReviewApi::answering(Ok(())));
        let raw = json!({
            "type": "interactive_message",
            "callback_id": "feed_settings",
            "team": { "id": "T1" },
            "channel": { "id": "C1" },
            "user": { "id": "UADMIN", "name": "ann" },
            "actions": [{ "value": "delete_feed_settings" }],
            "message_ts": "1700.3",
            "trigger_id": "trigger-3",
            "response_url": "https://hooks.example.test/intro"
        })
        .to_string();

        let result = h
            .dispatcher
            .dispatch(&parse_interaction(&raw).expect("parse"), &ctx())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Processed { outcome: "feed_stopped" });
        let team = h
            .repository
            .find_by_id(&TeamId("T1".to_owned()))
            .await
            .expect("find")
            .expect("team");
        assert!(team.feeds.is_empty());
        assert_eq!(h.transport.recorded().await.responses.len(), 1);
    }

    #[tokio::test]
    async fn tampered_dialog_token_is_rejected() {
        let h = harness(RecordingTransport::default(), ScriptedReviewApi::answering(Ok(())));
        let raw = json!({
            "type": "dialog_submission",
            "callback_id": "not-a-token",
            "team": { "id": "T1" },
            "channel": { "id": "C1" },
            "user": { "id": "U1" },
            "submission": { "reply": "hi" },
            "response_url": "https://hooks.example.test/d"
        })
        .to_string();

        let error = h
            .dispatcher
            .dispatch(&parse_interaction(&raw).expect("parse"), &ctx())
            .await
            .expect_err("bad token");

        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::InvalidCorrelationToken(_))
        ));
        assert!(h.api.replies.lock().await.is_empty());
    }
}
