//! Per-workspace bot handles.
//!
//! The hosting service owns one [`WorkspaceRegistry`]; handles are created on first use
//! from the team's stored bot credentials and dropped with [`WorkspaceRegistry::teardown`]
//! when the workspace disconnects.

use std::collections::HashMap;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::{debug, info};

use reviewbot_core::{ApplicationError, Team, TeamId};

use crate::blocks::{Dialog, Message};
use crate::client::{PostedMessage, SlackApiError, SlackTransport, SlackUser};

/// A workspace's bot: credentials plus the shared transport.
pub struct SlackBot {
    team_id: TeamId,
    name: String,
    token: SecretString,
    transport: Arc<dyn SlackTransport>,
}

impl SlackBot {
    pub fn new(
        team_id: TeamId,
        name: impl Into<String>,
        token: SecretString,
        transport: Arc<dyn SlackTransport>,
    ) -> Self {
        Self { team_id, name: name.into(), token, transport }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Posts as the bot; the message's `username` defaults to the bot name.
    pub async fn send(&self, message: &Message) -> Result<PostedMessage, SlackApiError> {
        if message.username.is_some() {
            return self.transport.post_message(self.token.expose_secret(), message).await;
        }
        let mut message = message.clone();
        message.username = Some(self.name.clone());
        self.transport.post_message(self.token.expose_secret(), &message).await
    }

    pub async fn respond(&self, response_url: &str, message: &Message) -> Result<(), SlackApiError> {
        self.transport.respond(response_url, message).await
    }

    pub async fn open_dialog(&self, trigger_id: &str, dialog: &Dialog) -> Result<(), SlackApiError> {
        self.transport.open_dialog(self.token.expose_secret(), trigger_id, dialog).await
    }

    /// Adding a reaction that is already present succeeds.
    pub async fn add_reaction(
        &self,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        match self.transport.add_reaction(self.token.expose_secret(), channel, ts, name).await {
            Err(error) if error.code() == Some("already_reacted") => {
                debug!(
                    event_name = "slack.reaction.already_present",
                    team_id = %self.team_id,
                    channel,
                    ts,
                    name,
                    "reaction absorbed"
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Removing a reaction that is not present succeeds.
    pub async fn remove_reaction(
        &self,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        match self.transport.remove_reaction(self.token.expose_secret(), channel, ts, name).await {
            Err(error) if error.code() == Some("no_reaction") => Ok(()),
            other => other,
        }
    }

    pub async fn user_info(&self, user_id: &str) -> Result<SlackUser, SlackApiError> {
        self.transport.user_info(self.token.expose_secret(), user_id).await
    }
}

pub struct WorkspaceRegistry {
    transport: Arc<dyn SlackTransport>,
    default_bot_name: String,
    bots: RwLock<HashMap<TeamId, Arc<SlackBot>>>,
}

impl WorkspaceRegistry {
    pub fn new(transport: Arc<dyn SlackTransport>, default_bot_name: impl Into<String>) -> Self {
        Self { transport, default_bot_name: default_bot_name.into(), bots: RwLock::new(HashMap::new()) }
    }

    /// Returns the team's bot, spawning it from stored credentials on first use.
    pub async fn bot_for(&self, team: &Team) -> Result<Arc<SlackBot>, ApplicationError> {
        if let Some(bot) = self.bots.read().await.get(&team.id) {
            return Ok(Arc::clone(bot));
        }

        let credentials = team.bot.as_ref().ok_or_else(|| {
            ApplicationError::Configuration(format!("team `{}` has no bot installed", team.id))
        })?;
        let name = team
            .bot_name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(self.default_bot_name.as_str())
            .to_owned();
        let bot = Arc::new(SlackBot::new(
            team.id.clone(),
            name,
            SecretString::from(credentials.access_token.clone()),
            Arc::clone(&self.transport),
        ));

        let mut bots = self.bots.write().await;
        let bot = bots.entry(team.id.clone()).or_insert(bot);
        info!(event_name = "registry.bot.spawned", team_id = %team.id, "workspace bot ready");
        Ok(Arc::clone(bot))
    }

    /// Drops the cached bot of a workspace. Returns whether one was registered.
    pub async fn teardown(&self, team_id: &TeamId) -> bool {
        let removed = self.bots.write().await.remove(team_id).is_some();
        if removed {
            info!(event_name = "registry.bot.torn_down", team_id = %team_id, "workspace bot dropped");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.bots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bots.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reviewbot_core::{ApplicationError, BotCredentials, Team, TeamId};

    use async_trait::async_trait;
    use secrecy::SecretString;

    use super::{SlackBot, WorkspaceRegistry};
    use crate::blocks::{Dialog, Message};
    use crate::client::{
        NoopSlackTransport, PostedMessage, SlackApiError, SlackTransport, SlackUser,
    };

    /// Every reaction call fails with the given Slack error code.
    struct ReactionErrors {
        add: &'static str,
        remove: &'static str,
    }

    #[async_trait]
    impl SlackTransport for ReactionErrors {
        async fn post_message(&self, _: &str, _: &Message) -> Result<PostedMessage, SlackApiError> {
            Err(SlackApiError::api("not_scripted"))
        }

        async fn respond(&self, _: &str, _: &Message) -> Result<(), SlackApiError> {
            Ok(())
        }

        async fn open_dialog(&self, _: &str, _: &str, _: &Dialog) -> Result<(), SlackApiError> {
            Ok(())
        }

        async fn add_reaction(&self, _: &str, _: &str, _: &str, _: &str) -> Result<(), SlackApiError> {
            Err(SlackApiError::api(self.add))
        }

        async fn remove_reaction(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<(), SlackApiError> {
            Err(SlackApiError::api(self.remove))
        }

        async fn user_info(&self, _: &str, _: &str) -> Result<SlackUser, SlackApiError> {
            Err(SlackApiError::api("not_scripted"))
        }
    }

    fn bot_with(transport: ReactionErrors) -> SlackBot {
        SlackBot::new(
            TeamId("T1".to_owned()),
            "reviewbot",
            SecretString::from("xoxb-1".to_owned()),
            Arc::new(transport),
        )
    }

    fn installed(id: &str, bot_name: &str) -> Team {
        let mut team = Team::new(TeamId(id.to_owned()));
        team.bot = Some(BotCredentials {
            user_id: "UBOT".to_owned(),
            name: bot_name.to_owned(),
            access_token: "xoxb-1".to_owned(),
        });
        team
    }

    #[tokio::test]
    async fn bots_are_spawned_once_per_workspace() {
        let registry = WorkspaceRegistry::new(Arc::new(NoopSlackTransport), "reviewbot");
        let team = installed("T1", "acme-bot");

        let first = registry.bot_for(&team).await.expect("bot");
        let second = registry.bot_for(&team).await.expect("bot");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "acme-bot");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn blank_bot_name_falls_back_to_default() {
        let registry = WorkspaceRegistry::new(Arc::new(NoopSlackTransport), "reviewbot");
        let bot = registry.bot_for(&installed("T1", " ")).await.expect("bot");
        assert_eq!(bot.name(), "reviewbot");
    }

    #[tokio::test]
    async fn teardown_forgets_the_workspace() {
        let registry = WorkspaceRegistry::new(Arc::new(NoopSlackTransport), "reviewbot");
        registry.bot_for(&installed("T1", "bot")).await.expect("bot");

        assert!(registry.teardown(&TeamId("T1".to_owned())).await);
        assert!(!registry.teardown(&TeamId("T1".to_owned())).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn team_without_bot_cannot_post() {
        let registry = WorkspaceRegistry::new(Arc::new(NoopSlackTransport), "reviewbot");
        let result = registry.bot_for(&Team::new(TeamId("T1".to_owned()))).await;
        assert!(matches!(result, Err(ApplicationError::Configuration(_))));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn duplicate_reactions_are_absorbed() {
        let bot = bot_with(ReactionErrors { add: "already_reacted", remove: "no_reaction" });

        bot.add_reaction("C1", "1700.1", "boom").await.expect("already_reacted absorbed");
        bot.remove_reaction("C1", "1700.1", "boom").await.expect("no_reaction absorbed");
    }

    #[tokio::test]
    async fn other_reaction_errors_surface() {
        let bot = bot_with(ReactionErrors { add: "ratelimited", remove: "message_not_found" });

        let error = bot.add_reaction("C1", "1700.1", "boom").await.expect_err("rate limited");
        assert_eq!(error.code(), Some("ratelimited"));
        assert!(bot.remove_reaction("C1", "1700.1", "boom").await.is_err());
    }
}
