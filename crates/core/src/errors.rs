use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("star rating must be between 1 and 5, got {0}")]
    InvalidStarRating(u8),
    #[error("unsupported star filter `{0}` (expected all|positive|negative)")]
    InvalidStarFilter(String),
    #[error("invalid correlation token: {0}")]
    InvalidCorrelationToken(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("review platform authentication failed: {0}")]
    UpstreamAuth(String),
    #[error("review platform request failed: {0}")]
    UpstreamRequest(String),
    #[error("slack integration was removed from the workspace: {0}")]
    IntegrationRevoked(String),
    #[error("messaging transport failure: {0}")]
    Transport(String),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("team `{0}` not found")]
    TeamNotFound(String),
}

impl ApplicationError {
    pub fn is_integration_revoked(&self) -> bool {
        matches!(self, Self::IntegrationRevoked(_))
    }

    /// Short text that is safe to show to a Slack user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(_) => "Sorry, I could not understand that request.",
            Self::UpstreamAuth(_) | Self::UpstreamRequest(_) => {
                "Sorry, the review platform is not responding right now. Please try again shortly."
            }
            Self::Storage(_) | Self::Transport(_) => {
                "Something went wrong on our side. Please try again shortly."
            }
            Self::TeamNotFound(_) | Self::IntegrationRevoked(_) => {
                "This workspace is not connected anymore. Please reinstall the app."
            }
            Self::Configuration(_) => {
                "This workspace is not fully set up yet. Please reinstall the app."
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::TeamNotFound(team_id) => {
                Self::NotFound { message: format!("team `{team_id}` not found"), correlation_id }
            }
            ApplicationError::UpstreamAuth(message)
            | ApplicationError::UpstreamRequest(message)
            | ApplicationError::IntegrationRevoked(message)
            | ApplicationError::Transport(message)
            | ApplicationError::Storage(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
