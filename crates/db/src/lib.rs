pub mod connection;
pub mod feed_store;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use feed_store::FeedSettingsStore;
pub use repositories::{InMemoryTeamRepository, RepositoryError, SqlTeamRepository, TeamRepository};
