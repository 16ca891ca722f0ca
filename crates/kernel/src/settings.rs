use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BIBLIO_ENV";
const CONFIG_DIR_ENV: &str = "BIBLIO_CONFIG_DIR";
const ENV_PREFIX: &str = "BIBLIO";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub lending: LendingSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load configuration from `config_dir` for the named environment.
    pub fn load_from(config_dir: &std::path::Path, environment: &str) -> anyhow::Result<Self> {
        let environment_kind: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let cfg = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = environment_kind;
        settings.lending.validate()?;

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_endpoint")]
    pub endpoint: String,
    /// Populate an empty catalogue with demo books at start-up.
    #[serde(default)]
    pub seed_demo_data: bool,
}

impl DatabaseSettings {
    fn default_endpoint() -> String {
        "memory://catalog".to_string()
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            seed_demo_data: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Lending policy knobs.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LendingSettings {
    #[serde(default = "LendingSettings::default_loan_period_days")]
    pub loan_period_days: i64,
    /// Capped at [`LendingSettings::COMMENT_COLUMN_LIMIT`], the width the
    /// reviews table enforces.
    #[serde(default = "LendingSettings::default_max_comment_length")]
    pub max_comment_length: usize,
    /// Upper bound on attempts for one conditional state transition.
    #[serde(default = "LendingSettings::default_transition_attempts")]
    pub transition_attempts: u32,
}

impl LendingSettings {
    /// Longest comment the `reviews.comment` column accepts.
    pub const COMMENT_COLUMN_LIMIT: usize = 256;

    fn default_loan_period_days() -> i64 {
        5
    }

    fn default_max_comment_length() -> usize {
        Self::COMMENT_COLUMN_LIMIT
    }

    fn default_transition_attempts() -> u32 {
        3
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.loan_period_days < 1 {
            return Err(anyhow!(
                "lending.loan_period_days must be at least 1, got {}",
                self.loan_period_days
            ));
        }
        if self.max_comment_length > Self::COMMENT_COLUMN_LIMIT {
            return Err(anyhow!(
                "lending.max_comment_length must be at most {}, got {}",
                Self::COMMENT_COLUMN_LIMIT,
                self.max_comment_length
            ));
        }
        if self.transition_attempts == 0 {
            return Err(anyhow!("lending.transition_attempts must be at least 1"));
        }
        Ok(())
    }
}

impl Default for LendingSettings {
    fn default() -> Self {
        Self {
            loan_period_days: Self::default_loan_period_days(),
            max_comment_length: Self::default_max_comment_length(),
            transition_attempts: Self::default_transition_attempts(),
        }
    }
}
