use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use reviewbot_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

/// One reported setting: config key, overriding env key and rendered value.
struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

impl Field {
    fn new(key: &'static str, env_key: &'static str, value: impl Into<String>) -> Self {
        Self { key, env_key, value: value.into() }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field::new("database.url", "REVIEWBOT_DATABASE_URL", config.database.url.clone()),
        Field::new(
            "database.max_connections",
            "REVIEWBOT_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        Field::new(
            "database.timeout_secs",
            "REVIEWBOT_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        Field::new(
            "slack.api_base_url",
            "REVIEWBOT_SLACK_API_BASE_URL",
            config.slack.api_base_url.clone(),
        ),
        Field::new(
            "slack.signing_secret",
            "REVIEWBOT_SLACK_SIGNING_SECRET",
            redact(&config.slack.signing_secret),
        ),
        Field::new(
            "slack.client_id",
            "REVIEWBOT_SLACK_CLIENT_ID",
            config.slack.client_id.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        Field::new(
            "slack.client_secret",
            "REVIEWBOT_SLACK_CLIENT_SECRET",
            config.slack.client_secret.as_ref().map(redact).unwrap_or_else(|| "<unset>".to_string()),
        ),
        Field::new("slack.bot_name", "REVIEWBOT_SLACK_BOT_NAME", config.slack.bot_name.clone()),
        Field::new("review_api.base_url", "REVIEWBOT_API_HOST", config.review_api.base_url.clone()),
        Field::new("review_api.api_key", "REVIEWBOT_API_KEY", redact(&config.review_api.api_key)),
        Field::new(
            "review_api.api_secret",
            "REVIEWBOT_API_SECRET",
            redact(&config.review_api.api_secret),
        ),
        Field::new(
            "review_api.business_user_name",
            "REVIEWBOT_BUSINESS_USER_NAME",
            config.review_api.business_user_name.clone(),
        ),
        Field::new(
            "review_api.business_user_password",
            "REVIEWBOT_BUSINESS_USER_PASS",
            redact(&config.review_api.business_user_password),
        ),
        Field::new(
            "review_api.default_business_unit_id",
            "REVIEWBOT_BUSINESS_UNIT_ID",
            config
                .review_api
                .default_business_unit_id
                .clone()
                .unwrap_or_else(|| "<unset>".to_string()),
        ),
        Field::new(
            "server.bind_address",
            "REVIEWBOT_SERVER_BIND_ADDRESS",
            config.server.bind_address.clone(),
        ),
        Field::new("server.port", "REVIEWBOT_SERVER_PORT", config.server.port.to_string()),
        Field::new(
            "server.graceful_shutdown_secs",
            "REVIEWBOT_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        Field::new("logging.level", "REVIEWBOT_LOGGING_LEVEL", config.logging.level.clone()),
        Field::new(
            "logging.format",
            "REVIEWBOT_LOGGING_FORMAT",
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["reviewbot.toml", "config/reviewbot.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact(secret: &SecretString) -> String {
    if secret.expose_secret().trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}
