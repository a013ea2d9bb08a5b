use std::collections::HashMap;

use tokio::sync::RwLock;

use reviewbot_core::{Team, TeamId};

use super::{RepositoryError, TeamRepository};

#[derive(Default)]
pub struct InMemoryTeamRepository {
    teams: RwLock<HashMap<String, Team>>,
}

impl InMemoryTeamRepository {
    pub fn with_teams(teams: impl IntoIterator<Item = Team>) -> Self {
        let teams = teams.into_iter().map(|team| (team.id.0.clone(), team)).collect();
        Self { teams: RwLock::new(teams) }
    }
}

#[async_trait::async_trait]
impl TeamRepository for InMemoryTeamRepository {
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, RepositoryError> {
        let teams = self.teams.read().await;
        Ok(teams.get(&id.0).cloned())
    }

    async fn save(&self, team: Team) -> Result<Team, RepositoryError> {
        let mut teams = self.teams.write().await;
        teams.insert(team.id.0.clone(), team.clone());
        Ok(team)
    }
}
