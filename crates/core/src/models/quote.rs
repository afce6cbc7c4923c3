use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Longest ticker accepted anywhere a symbol enters the system.
pub const MAX_SYMBOL_LEN: usize = 12;

/// Trim and uppercase a ticker. `None` unless it is 1..=12 ASCII letters,
/// digits, dots or dashes.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_ascii_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= MAX_SYMBOL_LEN
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    valid.then_some(symbol)
}

/// A single daily close (date → price).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Where a quote came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QuoteSource {
    /// A live market data provider (Alpha Vantage, Yahoo Finance, ...)
    Provider { name: String },
    /// Synthesized from the static baseline table
    Mock,
}

impl QuoteSource {
    pub fn provider(name: impl Into<String>) -> Self {
        QuoteSource::Provider { name: name.into() }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, QuoteSource::Mock)
    }
}

/// A snapshot of a symbol's price, volume and daily change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Uppercase ticker (e.g. "AAPL")
    pub symbol: String,
    /// Display name when known, otherwise the symbol
    pub name: String,
    pub price: f64,
    pub volume: u64,
    /// Change versus the previous close, in percent
    pub percent_change: f64,
    /// Daily closes, oldest first
    pub historical_prices: Vec<PricePoint>,
    pub source: QuoteSource,
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    /// Closing prices only, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.historical_prices.iter().map(|p| p.price).collect()
    }
}

/// What a provider returns on success: raw market data without bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuote {
    pub price: f64,
    pub volume: u64,
    pub percent_change: f64,
    pub historical_prices: Vec<PricePoint>,
}

impl RawQuote {
    pub fn into_quote(
        self,
        symbol: &str,
        name: &str,
        source: QuoteSource,
        fetched_at: DateTime<Utc>,
    ) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            name: name.to_string(),
            price: self.price,
            volume: self.volume,
            percent_change: self.percent_change,
            historical_prices: self.historical_prices,
            source,
            fetched_at,
        }
    }
}

/// Outcome of a provider call that did not fail at the transport level.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderQuote {
    /// Usable market data
    Found(RawQuote),
    /// The provider answered but had nothing usable (unknown ticker, rate-limit note, ...)
    Empty { reason: String },
}

#[derive(Debug, Clone)]
struct CachedQuote {
    quote: Quote,
    expires_at: DateTime<Utc>,
}

/// In-memory quote cache keyed by uppercase symbol with a fixed time-to-live.
///
/// Expired entries are never returned; they are dropped lazily on lookup or
/// eagerly via `prune_expired`. Symbols nobody could quote are remembered as
/// misses for the same TTL.
#[derive(Debug, Clone)]
pub struct QuoteCache {
    entries: HashMap<String, CachedQuote>,
    misses: HashMap<String, DateTime<Utc>>,
    ttl: Duration,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            misses: HashMap::new(),
            ttl,
        }
    }

    /// Saturates at the latest representable instant.
    fn expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a live entry for `symbol` as of `now`.
    pub fn get(&mut self, symbol: &str, now: DateTime<Utc>) -> Option<Quote> {
        let key = symbol.to_uppercase();
        match self.entries.get(&key) {
            Some(cached) if now < cached.expires_at => Some(cached.quote.clone()),
            Some(_) => {
                self.entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Insert or replace the entry for the quote's symbol, expiring `ttl` after `now`.
    pub fn insert(&mut self, quote: Quote, now: DateTime<Utc>) {
        let key = quote.symbol.to_uppercase();
        let expires_at = self.expiry(now);
        self.misses.remove(&key);
        self.entries.insert(key, CachedQuote { quote, expires_at });
    }

    /// Remember that no quote exists for `symbol` until the TTL runs out.
    pub fn insert_miss(&mut self, symbol: &str, now: DateTime<Utc>) {
        let until = self.expiry(now);
        self.misses.insert(symbol.to_uppercase(), until);
    }

    /// Whether `symbol` is a remembered miss as of `now`.
    pub fn is_miss(&mut self, symbol: &str, now: DateTime<Utc>) -> bool {
        let key = symbol.to_uppercase();
        match self.misses.get(&key) {
            Some(until) if now < *until => true,
            Some(_) => {
                self.misses.remove(&key);
                false
            }
            None => false,
        }
    }

    /// Drop every expired entry and miss. Returns the number of quotes removed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, cached| now < cached.expires_at);
        self.misses.retain(|_, until| now < *until);
        before - self.entries.len()
    }

    /// Number of entries, including ones that expired but were not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.misses.clear();
    }
}
