use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tracing::{error, warn};
use uuid::Uuid;

use reviewbot_core::{BusinessUnitId, InterfaceError};
use reviewbot_slack::commands::SlashCommandPayload;
use reviewbot_slack::{
    build_dispatcher, parse_interaction, EventContext, EventDispatcher, SlackEvent, SlackServices,
};

use crate::{ingest, signature};

#[derive(Clone)]
pub struct AppState {
    pub services: SlackServices,
    pub dispatcher: Arc<EventDispatcher>,
    pub signing_secret: SecretString,
    pub default_business_unit: Option<BusinessUnitId>,
}

impl AppState {
    pub fn new(
        services: SlackServices,
        signing_secret: SecretString,
        default_business_unit: Option<BusinessUnitId>,
    ) -> Self {
        let dispatcher = Arc::new(build_dispatcher(&services));
        Self { services, dispatcher, signing_secret, default_business_unit }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/slack/commands", post(slash_command))
        .route("/slack/interactions", post(interaction))
        .route("/incoming-webhooks/{team_id}", post(ingest::incoming_webhook))
        .with_state(state)
}

pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn verify_request(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), StatusCode> {
    signature::verify(state.signing_secret.expose_secret(), headers, body, Utc::now().timestamp())
        .map_err(|rejection| {
            warn!(
                event_name = "http.slack.signature_rejected",
                error = %rejection,
                "rejecting unsigned slack request"
            );
            StatusCode::UNAUTHORIZED
        })
}

fn form_fields(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// Handles the event on its own task; Slack only waits for the acknowledgement.
fn spawn_dispatch(state: &AppState, event: SlackEvent) {
    let dispatcher = Arc::clone(&state.dispatcher);
    let ctx = EventContext { correlation_id: new_correlation_id() };
    tokio::spawn(async move {
        let Err(failure) = dispatcher.dispatch(&event, &ctx).await else {
            return;
        };
        let failure = failure.into_interface(ctx.correlation_id.as_str());
        let event_type = event.event_type().as_str();
        let team_id = event.team_id().unwrap_or_default();
        match failure {
            InterfaceError::BadRequest { .. } | InterfaceError::NotFound { .. } => warn!(
                event_name = "slack.event.rejected",
                correlation_id = failure.correlation_id(),
                event_type,
                team_id,
                error = %failure,
                "slack event rejected"
            ),
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => error!(
                event_name = "slack.event.failed",
                correlation_id = failure.correlation_id(),
                event_type,
                team_id,
                error = %failure,
                "slack event handling failed"
            ),
        }
    });
}

async fn slash_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Err(status) = verify_request(&state, &headers, &body) {
        return status;
    }

    let fields = form_fields(&body);
    let parsed =
        serde_json::to_value(&fields).and_then(serde_json::from_value::<SlashCommandPayload>);
    let payload = match parsed {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(event_name = "http.slack.bad_command", error = %rejection, "unreadable slash command");
            return StatusCode::BAD_REQUEST;
        }
    };

    spawn_dispatch(&state, SlackEvent::SlashCommand(payload));
    StatusCode::OK
}

async fn interaction(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if let Err(status) = verify_request(&state, &headers, &body) {
        return status;
    }

    let fields = form_fields(&body);
    let Some(raw) = fields.get("payload") else {
        return StatusCode::BAD_REQUEST;
    };
    match parse_interaction(raw) {
        Ok(event) => {
            spawn_dispatch(&state, event);
            StatusCode::OK
        }
        Err(rejection) => {
            warn!(
                event_name = "http.slack.bad_interaction",
                error = %rejection,
                "unreadable interaction payload"
            );
            StatusCode::BAD_REQUEST
        }
    }
}
