use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use reviewbot_core::config::SlackConfig;
use reviewbot_core::ApplicationError;

use crate::blocks::{Dialog, Message};

/// Slack error codes meaning the app is no longer installed in the workspace.
const REVOKED_CODES: &[&str] = &["account_inactive", "token_revoked", "invalid_auth"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack api returned `{code}`")]
    Api { code: String },
    #[error("slack transport failure: {0}")]
    Transport(String),
    #[error("could not decode slack response: {0}")]
    Decode(String),
}

impl SlackApiError {
    pub fn api(code: impl Into<String>) -> Self {
        Self::Api { code: code.into() }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code } => Some(code),
            _ => None,
        }
    }

    pub fn is_integration_revoked(&self) -> bool {
        self.code().is_some_and(|code| REVOKED_CODES.contains(&code))
    }
}

impl From<SlackApiError> for ApplicationError {
    fn from(error: SlackApiError) -> Self {
        if error.is_integration_revoked() {
            ApplicationError::IntegrationRevoked(error.to_string())
        } else {
            ApplicationError::Transport(error.to_string())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_owner: bool,
}

/// Slack Web API calls the bot performs. `token` is the workspace bot token.
#[async_trait]
pub trait SlackTransport: Send + Sync {
    async fn post_message(&self, token: &str, message: &Message)
        -> Result<PostedMessage, SlackApiError>;
    /// Delayed reply through an interaction's `response_url`.
    async fn respond(&self, response_url: &str, message: &Message) -> Result<(), SlackApiError>;
    async fn open_dialog(
        &self,
        token: &str,
        trigger_id: &str,
        dialog: &Dialog,
    ) -> Result<(), SlackApiError>;
    async fn add_reaction(
        &self,
        token: &str,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SlackApiError>;
    async fn remove_reaction(
        &self,
        token: &str,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SlackApiError>;
    async fn user_info(&self, token: &str, user_id: &str) -> Result<SlackUser, SlackApiError>;
}

#[derive(Default)]
pub struct NoopSlackTransport;

#[async_trait]
impl SlackTransport for NoopSlackTransport {
    async fn post_message(
        &self,
        _token: &str,
        message: &Message,
    ) -> Result<PostedMessage, SlackApiError> {
        Ok(PostedMessage { channel: message.channel.clone().unwrap_or_default(), ts: "0".to_owned() })
    }

    async fn respond(&self, _response_url: &str, _message: &Message) -> Result<(), SlackApiError> {
        Ok(())
    }

    async fn open_dialog(
        &self,
        _token: &str,
        _trigger_id: &str,
        _dialog: &Dialog,
    ) -> Result<(), SlackApiError> {
        Ok(())
    }

    async fn add_reaction(
        &self,
        _token: &str,
        _channel: &str,
        _ts: &str,
        _name: &str,
    ) -> Result<(), SlackApiError> {
        Ok(())
    }

    async fn remove_reaction(
        &self,
        _token: &str,
        _channel: &str,
        _ts: &str,
        _name: &str,
    ) -> Result<(), SlackApiError> {
        Ok(())
    }

    async fn user_info(&self, _token: &str, user_id: &str) -> Result<SlackUser, SlackApiError> {
        Ok(SlackUser { id: user_id.to_owned(), ..SlackUser::default() })
    }
}

pub struct SlackWebClient {
    client: Client,
    base_url: String,
}

impl SlackWebClient {
    pub fn new(config: &SlackConfig) -> Result<Self, SlackApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;
        Ok(Self { client, base_url: config.api_base_url.trim_end_matches('/').to_owned() })
    }

    async fn call(&self, method: &str, token: &str, body: Value) -> Result<Value, SlackApiError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;
        let payload: Value =
            response.json().await.map_err(|error| SlackApiError::Decode(error.to_string()))?;

        debug!(event_name = "slack.api.called", method, ok = payload["ok"].as_bool(), "slack api call");
        check_ok(payload)
    }
}

/// Web API responses are HTTP 200 with `ok: false` and an error code on failure.
pub(crate) fn check_ok(payload: Value) -> Result<Value, SlackApiError> {
    if payload.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(payload);
    }
    let code = payload.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
    Err(SlackApiError::api(code))
}

pub(crate) fn parse_posted(payload: &Value) -> Result<PostedMessage, SlackApiError> {
    let channel = payload.get("channel").and_then(Value::as_str);
    let ts = payload.get("ts").and_then(Value::as_str);
    match (channel, ts) {
        (Some(channel), Some(ts)) => {
            Ok(PostedMessage { channel: channel.to_owned(), ts: ts.to_owned() })
        }
        _ => Err(SlackApiError::Decode("chat.postMessage response lacks channel or ts".to_owned())),
    }
}

#[async_trait]
impl SlackTransport for SlackWebClient {
    async fn post_message(
        &self,
        token: &str,
        message: &Message,
    ) -> Result<PostedMessage, SlackApiError> {
        let body =
            serde_json::to_value(message).map_err(|error| SlackApiError::Decode(error.to_string()))?;
        let payload = self.call("chat.postMessage", token, body).await?;
        parse_posted(&payload)
    }

    async fn respond(&self, response_url: &str, message: &Message) -> Result<(), SlackApiError> {
        let response = self
            .client
            .post(response_url)
            .json(message)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;
        if !response.status().is_success() {
            return Err(SlackApiError::Transport(format!(
                "response_url returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn open_dialog(
        &self,
        token: &str,
        trigger_id: &str,
        dialog: &Dialog,
    ) -> Result<(), SlackApiError> {
        self.call("dialog.open", token, json!({ "trigger_id": trigger_id, "dialog": dialog }))
            .await
            .map(|_| ())
    }

    async fn add_reaction(
        &self,
        token: &str,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        self.call("reactions.add", token, json!({ "channel": channel, "timestamp": ts, "name": name }))
            .await
            .map(|_| ())
    }

    async fn remove_reaction(
        &self,
        token: &str,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        self.call(
            "reactions.remove",
            token,
            json!({ "channel": channel, "timestamp": ts, "name": name }),
        )
        .await
        .map(|_| ())
    }

    async fn user_info(&self, token: &str, user_id: &str) -> Result<SlackUser, SlackApiError> {
        // users.info only accepts form or query arguments.
        let response = self
            .client
            .get(format!("{}/users.info", self.base_url))
            .bearer_auth(token)
            .query(&[("user", user_id)])
            .send()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;
        let payload: Value =
            response.json().await.map_err(|error| SlackApiError::Decode(error.to_string()))?;
        let payload = check_ok(payload)?;
        serde_json::from_value(payload["user"].clone())
            .map_err(|error| SlackApiError::Decode(error.to_string()))
    }
}
