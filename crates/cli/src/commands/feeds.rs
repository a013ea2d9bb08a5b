use std::sync::Arc;

use reviewbot_core::feeds::team_feeds;
use reviewbot_core::{ApplicationError, TeamId};
use reviewbot_db::{FeedSettingsStore, SqlTeamRepository};
use serde_json::json;

use crate::commands::{with_pool, CommandResult};

/// Lists the effective feeds of a team, legacy webhook default included.
pub fn run(team_id: &str) -> CommandResult {
    let team_id = TeamId(team_id.trim().to_owned());
    let outcome = with_pool("feeds", |pool| async move {
        let store = FeedSettingsStore::new(Arc::new(SqlTeamRepository::new(pool)));
        store.find_team(&team_id).await.map_err(|error| match error {
            ApplicationError::TeamNotFound(_) => ("team_not_found", error.to_string(), 6u8),
            other => ("storage", other.to_string(), 7u8),
        })
    });

    match outcome {
        Ok(team) => {
            let feeds = team_feeds(&team);
            CommandResult::success_with(
                "feeds",
                format!("team `{}` has {} effective feed(s)", team.id, feeds.len()),
                Some(json!({ "team_id": team.id, "feeds": feeds })),
            )
        }
        Err(failure) => failure,
    }
}
