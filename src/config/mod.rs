//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::game::constants::BULLET_COOLDOWN_MS;
use crate::game::SimulationConfig;
use crate::util::rate_limit::INPUT_RATE_LIMIT;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma-separated; `*` allows any
    pub client_origin: String,
    /// Directory served for static assets
    pub public_dir: PathBuf,

    /// Tick loop settings
    pub simulation: SimulationConfig,
    /// Minimum interval between accepted shots per session
    pub fire_cooldown: Duration,
    /// Max inbound frames per second per connection
    pub input_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // PORT wins over SERVER_ADDR so PaaS hosts can inject it
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        };

        let defaults = SimulationConfig::default();
        let simulation = SimulationConfig {
            tick_rate: positive(parse_or(&lookup, "TICK_RATE", defaults.tick_rate)?, "TICK_RATE")?,
            bullet_broadcast_divisor: positive(
                parse_or(&lookup, "BULLET_BROADCAST_DIVISOR", defaults.bullet_broadcast_divisor)?,
                "BULLET_BROADCAST_DIVISOR",
            )?,
            health_regen_per_sec: parse_or(
                &lookup,
                "HEALTH_REGEN_PER_SEC",
                defaults.health_regen_per_sec,
            )?
            .max(0),
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(server_addr.clone()))?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
            public_dir: lookup("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public")),

            simulation,
            fire_cooldown: Duration::from_millis(parse_or(
                &lookup,
                "FIRE_COOLDOWN_MS",
                BULLET_COOLDOWN_MS,
            )?),
            input_rate_limit: positive(
                parse_or(&lookup, "INPUT_RATE_LIMIT", INPUT_RATE_LIMIT)?,
                "INPUT_RATE_LIMIT",
            )?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

fn positive(value: u32, key: &'static str) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
