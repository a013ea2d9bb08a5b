use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::Row;

use reviewbot_core::{Team, TeamId};

use super::{RepositoryError, TeamRepository};
use crate::DbPool;

pub struct SqlTeamRepository {
    pool: DbPool,
}

impl SqlTeamRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn from_json<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|e| RepositoryError::Decode(format!("column `{column}`: {e}")))
}

fn row_to_team(row: &sqlx::sqlite::SqliteRow) -> Result<Team, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: Option<String> =
        row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let bot_json: Option<String> =
        row.try_get("bot_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let business_units_json: String =
        row.try_get("business_units_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let feeds_json: String =
        row.try_get("feeds_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let incoming_webhook_json: Option<String> = row
        .try_get("incoming_webhook_json")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Team {
        id: TeamId(id),
        name,
        bot: bot_json.as_deref().map(|raw| from_json("bot_json", raw)).transpose()?,
        business_units: from_json("business_units_json", &business_units_json)?,
        feeds: from_json("feeds_json", &feeds_json)?,
        incoming_webhook: incoming_webhook_json
            .as_deref()
            .map(|raw| from_json("incoming_webhook_json", raw))
            .transpose()?,
    })
}

#[async_trait::async_trait]
impl TeamRepository for SqlTeamRepository {
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, bot_json, business_units_json, feeds_json, incoming_webhook_json
             FROM team WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_team(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, team: Team) -> Result<Team, RepositoryError> {
        let bot_json = team.bot.as_ref().map(to_json).transpose()?;
        let business_units_json = to_json(&team.business_units)?;
        let feeds_json = to_json(&team.feeds)?;
        let incoming_webhook_json = team.incoming_webhook.as_ref().map(to_json).transpose()?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO team (id, name, bot_json, business_units_json, feeds_json,
                               incoming_webhook_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 bot_json = excluded.bot_json,
                 business_units_json = excluded.business_units_json,
                 feeds_json = excluded.feeds_json,
                 incoming_webhook_json = excluded.incoming_webhook_json,
                 updated_at = excluded.updated_at",
        )
        .bind(&team.id.0)
        .bind(&team.name)
        .bind(&bot_json)
        .bind(&business_units_json)
        .bind(&feeds_json)
        .bind(&incoming_webhook_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(team)
    }
}
