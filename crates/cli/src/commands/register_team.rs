use std::sync::Arc;

use reviewbot_core::{BotCredentials, BusinessUnitId, Team, TeamId};
use reviewbot_db::{FeedSettingsStore, SqlTeamRepository, TeamRepository};
use serde_json::json;

use crate::commands::{with_pool, CommandResult};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterTeamArgs {
    pub team_id: String,
    pub business_unit_id: String,
    pub bot_user_id: Option<String>,
    pub bot_name: Option<String>,
    pub bot_token: Option<String>,
}

/// Install-time registration: the only place a business unit is added to a team.
pub fn run(args: &RegisterTeamArgs) -> CommandResult {
    if args.team_id.trim().is_empty() || args.business_unit_id.trim().is_empty() {
        return CommandResult::failure(
            "register-team",
            "invalid_arguments",
            "team id and business unit id must not be empty",
            2,
        );
    }

    let outcome = with_pool("register-team", |pool| async move {
        let repository = Arc::new(SqlTeamRepository::new(pool));
        let team_id = TeamId(args.team_id.trim().to_owned());
        let mut team = repository
            .find_by_id(&team_id)
            .await
            .map_err(|error| ("storage", error.to_string(), 7u8))?
            .unwrap_or_else(|| Team::new(team_id));

        let newly_registered =
            team.register_business_unit(BusinessUnitId(args.business_unit_id.trim().to_owned()));
        if let Some(token) = args.bot_token.as_ref().filter(|token| !token.trim().is_empty()) {
            team.bot = Some(BotCredentials {
                user_id: args.bot_user_id.clone().unwrap_or_default(),
                name: args.bot_name.clone().unwrap_or_default(),
                access_token: token.trim().to_owned(),
            });
        }

        let store = FeedSettingsStore::new(repository);
        store.save_team(team).await.map_err(|error| ("storage", error.to_string(), 7u8))?;
        let team = store
            .find_team(&TeamId(args.team_id.trim().to_owned()))
            .await
            .map_err(|error| ("storage", error.to_string(), 7u8))?;
        Ok((team, newly_registered))
    });

    match outcome {
        Ok((team, newly_registered)) => CommandResult::success_with(
            "register-team",
            format!("team `{}` follows {} business unit(s)", team.id, team.business_units.len()),
            Some(json!({
                "team_id": team.id,
                "business_units": team.business_units,
                "newly_registered": newly_registered,
                "bot_installed": team.bot.is_some(),
            })),
        ),
        Err(failure) => failure,
    }
}
