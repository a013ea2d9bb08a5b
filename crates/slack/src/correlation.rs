//! Context carried through a dialog's `callback_id`.
//!
//! Nothing is stored server-side between opening a dialog and its submission, so the
//! token is the only way back to the originating message. Tokens are JSON objects tagged
//! by `dialogType`, stamped with a version field `v`. Tokens without `v` come from older
//! deployments and decode the same way; unknown extra fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use reviewbot_core::{DomainError, ReviewId};

pub const TOKEN_VERSION: u64 = 1;

/// Message the settings dialog was opened from, refreshed after submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_url: Option<String>,
    pub channel: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dialogType", rename_all = "snake_case")]
pub enum CorrelationToken {
    #[serde(rename_all = "camelCase")]
    ReviewReply { original_ts: String, review_id: ReviewId },
    #[serde(rename_all = "camelCase")]
    FeedSettings { source_message: SourceMessage },
}

impl CorrelationToken {
    pub fn dialog_type(&self) -> &'static str {
        match self {
            Self::ReviewReply { .. } => "review_reply",
            Self::FeedSettings { .. } => "feed_settings",
        }
    }

    pub fn encode(&self) -> Result<String, DomainError> {
        let mut value = serde_json::to_value(self)
            .map_err(|error| DomainError::InvalidCorrelationToken(error.to_string()))?;
        if let Value::Object(map) = &mut value {
            map.insert("v".to_owned(), Value::from(TOKEN_VERSION));
        }
        Ok(value.to_string())
    }

    pub fn decode(raw: &str) -> Result<Self, DomainError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|error| DomainError::InvalidCorrelationToken(error.to_string()))?;
        if !value.is_object() {
            return Err(DomainError::InvalidCorrelationToken("token is not an object".to_owned()));
        }
        serde_json::from_value(value)
            .map_err(|error| DomainError::InvalidCorrelationToken(error.to_string()))
    }
}

/// Version stamped on a raw token; `0` for tokens written before versioning.
pub fn token_version(raw: &str) -> u64 {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|value| value.get("v").and_then(Value::as_u64))
        .unwrap_or(0)
}
