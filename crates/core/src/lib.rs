//! Domain model and feed-settings rules for the review bridge.
//!
//! - **Domain** (`domain`) - reviews, teams, feed settings
//! - **Feeds** (`feeds`) - effective feed resolution and field-level merges
//! - **Config** (`config`) - layered configuration (defaults, file, env, overrides)
//! - **Errors** (`errors`) - error taxonomy shared by every crate

pub mod config;
pub mod domain;
pub mod errors;
pub mod feeds;

pub use domain::review::{Consumer, Review, ReviewId, StarRating};
pub use domain::team::{
    BotCredentials, BusinessUnitId, ChannelId, FeedSetting, FeedSettingsPatch, IncomingWebhook,
    StarFilter, Team, TeamId,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use feeds::FeedRemoval;
