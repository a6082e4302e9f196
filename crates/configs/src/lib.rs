//! # configs
//!
//! Layered settings for `flagd` and `flagctl`: built-in defaults, then an
//! optional `flags.toml`, then `TILEFLAGS__*` environment variables.

use std::net::SocketAddr;
use std::path::Path;

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::debug;

pub const ENV_PREFIX: &str = "TILEFLAGS";
pub const DEFAULT_CONFIG_FILE: &str = "flags.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub rate_limit: RateLimitSettings,
    pub flags: FlagSettings,
    pub log: LogSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    /// `*` allows any origin.
    pub cors_origin: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            cors_origin: "*".into(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr.parse().map_err(|err| {
            ConfigError::Invalid(format!("server.bind_addr {:?}: {err}", self.bind_addr))
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Dynamodb,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub environment: String,
    pub region: String,
    pub flags_table: Option<String>,
    pub rate_limit_table: Option<String>,
    /// Rate-limit counters go to Redis when set.
    pub redis_url: Option<SecretString>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            environment: "prod".into(),
            region: "us-east-1".into(),
            flags_table: None,
            rate_limit_table: None,
            redis_url: None,
        }
    }
}

impl StoreSettings {
    pub fn flags_table(&self) -> String {
        self.flags_table
            .clone()
            .unwrap_or_else(|| format!("{}-tile-flags", self.environment))
    }

    pub fn rate_limit_table(&self) -> String {
        self.rate_limit_table
            .clone()
            .unwrap_or_else(|| format!("{}-tile-flag-rate-limits", self.environment))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_per_window: u32,
    pub window_secs: u64,
    pub counter_ttl_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_per_window: 10,
            window_secs: 60,
            counter_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FlagSettings {
    pub ttl_days: i64,
}

impl Default for FlagSettings {
    fn default() -> Self {
        Self { ttl_days: 30 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    /// `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: "info".into(),
        }
    }
}

impl Settings {
    /// Loads `.env`, then `flags.toml` from the working directory, then the
    /// process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_file(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Like [`Settings::load`] with an explicit config file, which may be absent.
    pub fn load_file(file: &Path) -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::load_from(file, None)
    }

    /// `env` replaces the process environment as the variable source when given.
    pub fn load_from(
        file: &Path,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from(file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Applies the operator CLI's `--environment` / `--region` flags.
    pub fn with_store_overrides(mut self, environment: Option<String>, region: Option<String>) -> Self {
        if let Some(environment) = environment {
            self.store.environment = environment;
        }
        if let Some(region) = region {
            self.store.region = region;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;
        if self.rate_limit.max_per_window == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.max_per_window must be greater than 0".into(),
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.window_secs must be greater than 0".into(),
            ));
        }
        if self.flags.ttl_days <= 0 {
            return Err(ConfigError::Invalid(
                "flags.ttl_days must be greater than 0".into(),
            ));
        }
        if self.store.environment.trim().is_empty() {
            return Err(ConfigError::Invalid("store.environment must not be empty".into()));
        }
        Ok(())
    }
}
