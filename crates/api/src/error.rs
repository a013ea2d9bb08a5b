use thiserror::Error;

use reviewbot_core::ApplicationError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("authentication against the review platform failed: {0}")]
    Auth(String),
    #[error("review platform returned HTTP {status}: {message}")]
    Request { status: u16, message: String },
    #[error("review platform transport failure: {0}")]
    Transport(String),
    #[error("could not decode review platform response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Request { status: 401, .. })
    }
}

impl From<ApiError> for ApplicationError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Auth(message) => ApplicationError::UpstreamAuth(message),
            other => ApplicationError::UpstreamRequest(other.to_string()),
        }
    }
}
