use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub review_api: ReviewApiConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub api_base_url: String,
    pub signing_secret: SecretString,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub bot_name: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ReviewApiConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub api_secret: SecretString,
    pub business_user_name: String,
    pub business_user_password: SecretString,
    pub default_business_unit_id: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub review_api_base_url: Option<String>,
    pub review_api_key: Option<String>,
    pub review_api_secret: Option<String>,
    pub business_user_name: Option<String>,
    pub business_user_password: Option<String>,
    pub default_business_unit_id: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://reviewbot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig {
                api_base_url: "https://slack.com/api".to_string(),
                signing_secret: String::new().into(),
                client_id: None,
                client_secret: None,
                bot_name: "reviewbot".to_string(),
                timeout_secs: 10,
            },
            review_api: ReviewApiConfig {
                base_url: "https://api.trustpilot.com".to_string(),
                api_key: String::new().into(),
                api_secret: String::new().into(),
                business_user_name: String::new(),
                business_user_password: String::new().into(),
                default_business_unit_id: None,
                timeout_secs: 15,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 7142,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("reviewbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
            if let Some(signing_secret) = slack.signing_secret {
                self.slack.signing_secret = secret_value(signing_secret);
            }
            if let Some(client_id) = slack.client_id {
                self.slack.client_id = Some(client_id);
            }
            if let Some(client_secret) = slack.client_secret {
                self.slack.client_secret = Some(secret_value(client_secret));
            }
            if let Some(bot_name) = slack.bot_name {
                self.slack.bot_name = bot_name;
            }
            if let Some(timeout_secs) = slack.timeout_secs {
                self.slack.timeout_secs = timeout_secs;
            }
        }

        if let Some(review_api) = patch.review_api {
            if let Some(base_url) = review_api.base_url {
                self.review_api.base_url = base_url;
            }
            if let Some(api_key) = review_api.api_key {
                self.review_api.api_key = secret_value(api_key);
            }
            if let Some(api_secret) = review_api.api_secret {
                self.review_api.api_secret = secret_value(api_secret);
            }
            if let Some(business_user_name) = review_api.business_user_name {
                self.review_api.business_user_name = business_user_name;
            }
            if let Some(business_user_password) = review_api.business_user_password {
                self.review_api.business_user_password = secret_value(business_user_password);
            }
            if let Some(default_business_unit_id) = review_api.default_business_unit_id {
                self.review_api.default_business_unit_id = Some(default_business_unit_id);
            }
            if let Some(timeout_secs) = review_api.timeout_secs {
                self.review_api.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("REVIEWBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("REVIEWBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("REVIEWBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("REVIEWBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("REVIEWBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("REVIEWBOT_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }
        if let Some(value) = read_env("REVIEWBOT_SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = secret_value(value);
        }
        if let Some(value) = read_env("REVIEWBOT_SLACK_CLIENT_ID") {
            self.slack.client_id = Some(value);
        }
        if let Some(value) = read_env("REVIEWBOT_SLACK_CLIENT_SECRET") {
            self.slack.client_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("REVIEWBOT_SLACK_BOT_NAME") {
            self.slack.bot_name = value;
        }
        if let Some(value) = read_env("REVIEWBOT_SLACK_TIMEOUT_SECS") {
            self.slack.timeout_secs = parse_u64("REVIEWBOT_SLACK_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("REVIEWBOT_API_HOST") {
            self.review_api.base_url = value;
        }
        if let Some(value) = read_env("REVIEWBOT_API_KEY") {
            self.review_api.api_key = secret_value(value);
        }
        if let Some(value) = read_env("REVIEWBOT_API_SECRET") {
            self.review_api.api_secret = secret_value(value);
        }
        if let Some(value) = read_env("REVIEWBOT_BUSINESS_USER_NAME") {
            self.review_api.business_user_name = value;
        }
        if let Some(value) = read_env("REVIEWBOT_BUSINESS_USER_PASS") {
            self.review_api.business_user_password = secret_value(value);
        }
        if let Some(value) = read_env("REVIEWBOT_BUSINESS_UNIT_ID") {
            self.review_api.default_business_unit_id = Some(value);
        }
        if let Some(value) = read_env("REVIEWBOT_API_TIMEOUT_SECS") {
            self.review_api.timeout_secs = parse_u64("REVIEWBOT_API_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("REVIEWBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("REVIEWBOT_SERVER_PORT").or_else(|| read_env("PORT"));
        if let Some(value) = port {
            self.server.port = parse_u16("REVIEWBOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("REVIEWBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("REVIEWBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("REVIEWBOT_LOGGING_LEVEL").or_else(|| read_env("REVIEWBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("REVIEWBOT_LOGGING_FORMAT").or_else(|| read_env("REVIEWBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(signing_secret) = overrides.slack_signing_secret {
            self.slack.signing_secret = secret_value(signing_secret);
        }
        if let Some(base_url) = overrides.review_api_base_url {
            self.review_api.base_url = base_url;
        }
        if let Some(api_key) = overrides.review_api_key {
            self.review_api.api_key = secret_value(api_key);
        }
        if let Some(api_secret) = overrides.review_api_secret {
            self.review_api.api_secret = secret_value(api_secret);
        }
        if let Some(business_user_name) = overrides.business_user_name {
            self.review_api.business_user_name = business_user_name;
        }
        if let Some(business_user_password) = overrides.business_user_password {
            self.review_api.business_user_password = secret_value(business_user_password);
        }
        if let Some(default_business_unit_id) = overrides.default_business_unit_id {
            self.review_api.default_business_unit_id = Some(default_business_unit_id);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_review_api(&self.review_api)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("reviewbot.toml"), PathBuf::from("config/reviewbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.signing_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.signing_secret is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App Credentials".to_string(),
        ));
    }

    validate_http_url("slack.api_base_url", &slack.api_base_url)?;

    if slack.bot_name.trim().is_empty() {
        return Err(ConfigError::Validation("slack.bot_name must not be empty".to_string()));
    }

    if slack.timeout_secs == 0 || slack.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "slack.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_review_api(review_api: &ReviewApiConfig) -> Result<(), ConfigError> {
    validate_http_url("review_api.base_url", &review_api.base_url)?;

    let required = [
        ("review_api.api_key", review_api.api_key.expose_secret().trim().is_empty()),
        ("review_api.api_secret", review_api.api_secret.expose_secret().trim().is_empty()),
        ("review_api.business_user_name", review_api.business_user_name.trim().is_empty()),
        (
            "review_api.business_user_password",
            review_api.business_user_password.expose_secret().trim().is_empty(),
        ),
    ];
    if let Some((key, _)) = required.iter().find(|(_, missing)| *missing) {
        return Err(ConfigError::Validation(format!(
            "{key} is required to reach the review platform API"
        )));
    }

    if review_api.timeout_secs == 0 || review_api.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "review_api.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    review_api: Option<ReviewApiPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    api_base_url: Option<String>,
    signing_secret: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    bot_name: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReviewApiPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    api_secret: Option<String>,
    business_user_name: Option<String>,
    business_user_password: Option<String>,
    default_business_unit_id: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
