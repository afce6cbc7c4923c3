use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use trading_pit_core::models::settings::{
    Settings, MAX_QUOTE_CACHE_TTL_SECS, TOKEN_TTL_HOURS_RANGE,
};

const DEFAULT_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 3030);
const DEFAULT_SNAPSHOT_SECRET: &str = "trading-pit-snapshot-secret";
const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub settings: Settings,
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_secret: String,
    pub snapshot_interval: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build from an explicit variable map. Unset variables keep their defaults.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut settings = Settings::default();
        if let Some(key) = get("ALPHAVANTAGE_API_KEY") {
            settings.api_keys.insert("alphavantage".to_string(), key);
        }
        if let Some(v) = parsed(&get, "ALPHAVANTAGE_DAILY_BUDGET")? {
            settings.alphavantage_daily_budget = v;
        }
        if let Some(v) = checked(&get, "QUOTE_CACHE_TTL_SECS", |v: &u64| {
            *v <= MAX_QUOTE_CACHE_TTL_SECS
        })? {
            settings.quote_cache_ttl_secs = v;
        }
        if let Some(v) = checked(&get, "STARTING_BALANCE", |v: &f64| {
            v.is_finite() && *v >= 0.0
        })? {
            settings.starting_balance = v;
        }
        if let Some(v) = checked(&get, "TOKEN_TTL_HOURS", |v: &i64| {
            TOKEN_TTL_HOURS_RANGE.contains(v)
        })? {
            settings.token_ttl_hours = v;
        }
        if let Some(secret) = get("JWT_SECRET") {
            settings.jwt_secret = secret;
        }

        let addr = match get("TRADING_PIT_ADDR") {
            Some(raw) => SocketAddr::from_str(&raw).map_err(|_| ConfigError::Invalid {
                var: "TRADING_PIT_ADDR",
                value: raw,
            })?,
            None => SocketAddr::from(DEFAULT_ADDR),
        };
        let interval: u64 =
            parsed(&get, "SNAPSHOT_INTERVAL_SECS")?.unwrap_or(DEFAULT_SNAPSHOT_INTERVAL_SECS);

        Ok(Self {
            addr,
            settings,
            snapshot_path: get("TRADING_PIT_SNAPSHOT").map(PathBuf::from),
            snapshot_secret: get("TRADING_PIT_SNAPSHOT_SECRET")
                .unwrap_or_else(|| DEFAULT_SNAPSHOT_SECRET.to_string()),
            snapshot_interval: Duration::from_secs(interval.max(1)),
        })
    }
}

fn parsed<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match get(var) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        None => Ok(None),
    }
}

/// Like `parsed`, but a value failing `accept` is also invalid.
fn checked<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    accept: impl Fn(&T) -> bool,
) -> Result<Option<T>, ConfigError> {
    match parsed(get, var)? {
        Some(v) if !accept(&v) => Err(ConfigError::Invalid {
            var,
            value: get(var).unwrap_or_default(),
        }),
        other => Ok(other),
    }
}
