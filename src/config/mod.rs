//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Directory holding `.smf` map files
    pub maps_dir: PathBuf,
    /// Built browser client, served as the fallback route
    pub static_dir: PathBuf,
    /// Allowed client origin for CORS (`*` or comma-separated list)
    pub client_origin: String,

    pub respawn_delay: Duration,
    pub power_up_tick: Duration,
    pub power_up_initial_delay: Duration,
    pub power_up_cooldown: Duration,

    /// Movement frames (`updatePosition`/`updateOrientation`) accepted per
    /// second per socket. Other commands are never limited.
    pub input_rate_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 20003)),
            log_level: "info".to_string(),
            maps_dir: PathBuf::from("maps"),
            static_dir: PathBuf::from("client/dist"),
            client_origin: "*".to_string(),
            respawn_delay: Duration::from_millis(2000),
            power_up_tick: Duration::from_millis(500),
            power_up_initial_delay: Duration::from_millis(5000),
            power_up_cooldown: Duration::from_millis(15000),
            input_rate_limit: 1000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // PORT wins over SERVER_ADDR
        let server_addr = match (lookup("PORT"), lookup("SERVER_ADDR")) {
            (Some(port), _) => format!("0.0.0.0:{}", port)
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            (None, Some(addr)) => addr.parse().map_err(|_| ConfigError::InvalidAddress)?,
            (None, None) => defaults.server_addr,
        };

        let millis = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            parse_or(&lookup, key, default.as_millis() as u64).map(Duration::from_millis)
        };

        let config = Self {
            server_addr,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            maps_dir: lookup("MAPS_DIR").map(PathBuf::from).unwrap_or(defaults.maps_dir),
            static_dir: lookup("STATIC_DIR").map(PathBuf::from).unwrap_or(defaults.static_dir),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or(defaults.client_origin),
            respawn_delay: millis("RESPAWN_DELAY_MS", defaults.respawn_delay)?,
            power_up_tick: millis("POWER_UP_TICK_MS", defaults.power_up_tick)?,
            power_up_initial_delay: millis("POWER_UP_INITIAL_DELAY_MS", defaults.power_up_initial_delay)?,
            power_up_cooldown: millis("POWER_UP_COOLDOWN_MS", defaults.power_up_cooldown)?,
            input_rate_limit: parse_or(&lookup, "INPUT_RATE_LIMIT", defaults.input_rate_limit)?,
        };

        if config.power_up_tick.is_zero() {
            return Err(ConfigError::Invalid("POWER_UP_TICK_MS"));
        }
        if config.input_rate_limit == 0 {
            return Err(ConfigError::Invalid("INPUT_RATE_LIMIT"));
        }
        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
