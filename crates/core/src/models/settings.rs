use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Longest quote freshness window: one day.
pub const MAX_QUOTE_CACHE_TTL_SECS: u64 = 86_400;
/// Accepted session token lifetimes, in hours (up to one year).
pub const TOKEN_TTL_HOURS_RANGE: std::ops::RangeInclusive<i64> = 1..=8_760;

/// Runtime settings for the core services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Optional API keys for providers that require them.
    /// Keys: provider name (e.g., "alphavantage"). Values: the API key string.
    pub api_keys: HashMap<String, String>,

    /// Metered Alpha Vantage calls allowed per local calendar day.
    pub alphavantage_daily_budget: u32,

    /// How long a fetched quote stays fresh.
    pub quote_cache_ttl_secs: u64,

    /// Cash balance credited to every new account.
    pub starting_balance: f64,

    /// HMAC secret for session tokens.
    pub jwt_secret: String,

    pub token_ttl_hours: i64,
}

impl Settings {
    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.api_keys
            .get(provider)
            .map(String::as_str)
            .filter(|k| !k.trim().is_empty())
    }

    /// Cache TTL, capped at `MAX_QUOTE_CACHE_TTL_SECS`.
    pub fn quote_cache_ttl(&self) -> Duration {
        let secs = self.quote_cache_ttl_secs.min(MAX_QUOTE_CACHE_TTL_SECS);
        Duration::try_seconds(secs as i64).unwrap_or_else(Duration::zero)
    }

    /// Token lifetime, or `None` when the hour count does not fit a duration.
    pub fn token_ttl(&self) -> Option<Duration> {
        Duration::try_hours(self.token_ttl_hours)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_keys: HashMap::new(),
            alphavantage_daily_budget: 25,
            quote_cache_ttl_secs: 300,
            starting_balance: 100_000.0,
            jwt_secret: "trading-pit-dev-secret".to_string(),
            token_ttl_hours: 24,
        }
    }
}
