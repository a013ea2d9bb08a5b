//! Feed settings persistence on top of a [`TeamRepository`].
//!
//! Each operation loads the latest team record, applies the pure rule from
//! `reviewbot_core::feeds` and saves the whole record back.

use std::sync::Arc;

use tracing::info;

use reviewbot_core::feeds::{apply_feed_settings, clear_feeds, remove_feed_settings};
use reviewbot_core::{ApplicationError, ChannelId, FeedRemoval, FeedSettingsPatch, Team, TeamId};

use crate::repositories::TeamRepository;

#[derive(Clone)]
pub struct FeedSettingsStore {
    repository: Arc<dyn TeamRepository>,
}

impl FeedSettingsStore {
    pub fn new(repository: Arc<dyn TeamRepository>) -> Self {
        Self { repository }
    }

    pub async fn find_team(&self, team_id: &TeamId) -> Result<Team, ApplicationError> {
        self.repository
            .find_by_id(team_id)
            .await?
            .ok_or_else(|| ApplicationError::TeamNotFound(team_id.to_string()))
    }

    pub async fn save_team(&self, team: Team) -> Result<Team, ApplicationError> {
        Ok(self.repository.save(team).await?)
    }

    /// Merges `patch` into the channel's feed and returns the persisted team.
    pub async fn upsert(
        &self,
        team_id: &TeamId,
        channel_id: &ChannelId,
        patch: &FeedSettingsPatch,
    ) -> Result<Team, ApplicationError> {
        let mut team = self.find_team(team_id).await?;
        let merged = apply_feed_settings(&mut team, channel_id, patch);
        let team = self.repository.save(team).await?;

        info!(
            event_name = "feeds.settings.saved",
            team_id = %team_id,
            channel_id = %channel_id,
            business_unit_id = merged.business_unit_id.as_ref().map(|id| id.0.as_str()),
            star_filter = merged.star_filter.as_str(),
            can_reply = merged.can_reply,
            "feed settings saved"
        );
        Ok(team)
    }

    /// Removes the channel's feed. The team is saved only when something was removed.
    pub async fn delete(
        &self,
        team_id: &TeamId,
        channel_id: &ChannelId,
    ) -> Result<(Team, Option<FeedRemoval>), ApplicationError> {
        let mut team = self.find_team(team_id).await?;
        let removal = remove_feed_settings(&mut team, channel_id);
        if removal.is_none() {
            return Ok((team, None));
        }

        let team = self.repository.save(team).await?;
        info!(
            event_name = "feeds.settings.deleted",
            team_id = %team_id,
            channel_id = %channel_id,
            "feed settings deleted"
        );
        Ok((team, removal))
    }

    /// Drops every feed of the team. Used when Slack reports the integration as revoked.
    pub async fn clear_all(&self, team_id: &TeamId) -> Result<Team, ApplicationError> {
        let mut team = self.find_team(team_id).await?;
        clear_feeds(&mut team);
        let team = self.repository.save(team).await?;

        info!(event_name = "feeds.settings.cleared", team_id = %team_id, "all feeds cleared");
        Ok(team)
    }
}
