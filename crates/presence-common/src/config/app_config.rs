//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub redis: RedisConfig,
    /// Profile store database; absent when only the ephemeral side is run
    pub database: Option<DatabaseConfig>,
    pub presence: PresenceConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// Presence timing and buffering
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    /// How often a client refreshes its liveness key
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    /// Liveness key TTL; a client silent for this long is considered gone
    #[serde(default = "default_liveness_ttl")]
    pub liveness_ttl_secs: u64,
    /// How often the sweeper looks for gone clients
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Per-subscription channel capacity
    #[serde(default = "default_subscription_buffer")]
    pub subscription_buffer: usize,
}

impl PresenceConfig {
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    #[must_use]
    pub fn liveness_ttl(&self) -> Duration {
        Duration::from_secs(self.liveness_ttl_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            liveness_ttl_secs: default_liveness_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            subscription_buffer: default_subscription_buffer(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "presence-sync".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_redis_max_connections() -> u32 {
    16
}

fn default_heartbeat_interval() -> u64 {
    10
}

fn default_liveness_ttl() -> u64 {
    30
}

fn default_sweep_interval() -> u64 {
    5
}

fn default_subscription_buffer() -> usize {
    64
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or unparsable
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    ///
    /// # Errors
    /// Returns an error if required variables are missing or unparsable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let database = match vars.get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: vars.parse_or("DATABASE_MAX_CONNECTIONS", default_max_connections)?,
                min_connections: vars.parse_or("DATABASE_MIN_CONNECTIONS", default_min_connections)?,
            }),
            None => None,
        };

        let config = Self {
            app: AppSettings {
                name: vars.get("APP_NAME").unwrap_or_else(default_app_name),
                env: vars.parse_or("APP_ENV", default_env)?,
            },
            redis: RedisConfig {
                url: vars.require("REDIS_URL")?,
                max_connections: vars
                    .parse_or("REDIS_MAX_CONNECTIONS", default_redis_max_connections)?,
            },
            database,
            presence: PresenceConfig {
                heartbeat_interval_secs: vars
                    .parse_or("PRESENCE_HEARTBEAT_INTERVAL_SECS", default_heartbeat_interval)?,
                liveness_ttl_secs: vars
                    .parse_or("PRESENCE_LIVENESS_TTL_SECS", default_liveness_ttl)?,
                sweep_interval_secs: vars
                    .parse_or("PRESENCE_SWEEP_INTERVAL_SECS", default_sweep_interval)?,
                subscription_buffer: vars
                    .parse_or("PRESENCE_SUBSCRIPTION_BUFFER", default_subscription_buffer)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let presence = &self.presence;
        if presence.heartbeat_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "PRESENCE_HEARTBEAT_INTERVAL_SECS",
                "must be greater than zero".to_string(),
            ));
        }
        if presence.liveness_ttl_secs <= presence.heartbeat_interval_secs {
            return Err(ConfigError::InvalidValue(
                "PRESENCE_LIVENESS_TTL_SECS",
                "must exceed the heartbeat interval".to_string(),
            ));
        }
        if presence.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "PRESENCE_SWEEP_INTERVAL_SECS",
                "must be greater than zero".to_string(),
            ));
        }
        if presence.subscription_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "PRESENCE_SUBSCRIPTION_BUFFER",
                "must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn require(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::MissingVar(name))
    }

    fn parse_or<T, D>(&self, name: &'static str, default: D) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
        D: FnOnce() -> T,
    {
        match self.get(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue(name, e.to_string())),
            None => Ok(default()),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
