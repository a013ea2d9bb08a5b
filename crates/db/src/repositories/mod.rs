use async_trait::async_trait;
use thiserror::Error;

use reviewbot_core::{ApplicationError, Team, TeamId};

pub mod memory;
pub mod team;

pub use memory::InMemoryTeamRepository;
pub use team::SqlTeamRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Storage(error.to_string())
    }
}

/// Persistence for installed workspaces. `save` replaces the whole record, so concurrent
/// writers to the same team follow last-write-wins.
#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, RepositoryError>;
    async fn save(&self, team: Team) -> Result<Team, RepositoryError>;
}
