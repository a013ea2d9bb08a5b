//! Slack surface of the review bridge.
//!
//! - **Blocks** (`blocks`) - attachment messages and dialogs
//! - **Client** (`client`) - Web API transport and error classification
//! - **Registry** (`registry`) - one bot handle per connected workspace
//! - **Router** (`router`) - fan-out of incoming reviews to channel feeds
//! - **Commands** (`commands`) - slash command classification and review queries
//! - **Settings** (`settings`) - per-channel feed settings dialogs
//! - **Reply** (`reply`) - replying to a review from its Slack message
//! - **Events** (`events`) - interaction parsing and dispatch
//!
//! ```text
//! HTTP request -> parse_interaction / SlashCommandPayload -> EventDispatcher -> services
//!                                                                    |
//!                                                  WorkspaceRegistry -> SlackTransport
//! ```

pub mod blocks;
pub mod client;
pub mod commands;
pub mod correlation;
pub mod events;
pub mod registry;
pub mod reply;
pub mod router;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{NoopSlackTransport, SlackApiError, SlackTransport, SlackWebClient};
pub use events::{
    build_dispatcher, parse_interaction, EventContext, EventDispatcher, HandlerResult, SlackEvent,
    SlackServices,
};
pub use registry::WorkspaceRegistry;
pub use router::{DeliveryObserver, ReviewDelivery, ReviewRouter, TracingDeliveryObserver};
