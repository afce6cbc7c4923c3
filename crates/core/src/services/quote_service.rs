use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::{Clock, SystemClock};
use crate::errors::CoreError;
use crate::models::analytics::{ApiStatus, ProviderStatus};
use crate::models::quote::{normalize_symbol, ProviderQuote, Quote, QuoteCache, QuoteSource};
use crate::providers::mock::{baseline, MockQuoteProvider, BASELINES};
use crate::providers::registry::{ProviderRegistry, ProviderTier};
use crate::services::rate_limit::DailyBudget;

/// Best-effort quote acquisition: cache, budgeted provider selection, mock fallback.
///
/// Lookup order for `fetch_quote`:
/// 1. Live cache entry (younger than the TTL) → return it.
/// 2. First registered provider whose daily budget admits another call.
///    If it errors or answers without data → perturbed mock quote.
/// 3. No provider admits a call → deterministic mock quote.
///
/// Whatever is produced, including "nothing", is cached for the TTL. The cache
/// and budget counters live here, one instance per process, shared by reference.
pub struct QuoteService {
    registry: ProviderRegistry,
    /// Parallel to `registry.tiers()`; `None` for unmetered tiers.
    budgets: Vec<Option<Mutex<DailyBudget>>>,
    cache: Mutex<QuoteCache>,
    mock: MockQuoteProvider,
    clock: Arc<dyn Clock>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl QuoteService {
    pub fn new(registry: ProviderRegistry, cache_ttl: Duration) -> Self {
        Self::with_parts(
            registry,
            MockQuoteProvider::new(),
            cache_ttl,
            Arc::new(SystemClock),
        )
    }

    /// Full constructor: inject the mock generator and clock.
    pub fn with_parts(
        registry: ProviderRegistry,
        mock: MockQuoteProvider,
        cache_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let today = clock.local_date();
        let budgets = registry
            .tiers()
            .iter()
            .map(|t| t.daily_budget.map(|limit| Mutex::new(DailyBudget::new(limit, today))))
            .collect();
        Self {
            registry,
            budgets,
            cache: Mutex::new(QuoteCache::new(cache_ttl)),
            mock,
            clock,
        }
    }

    /// Return a quote for `symbol`, or `None` if nothing at all is known about it.
    ///
    /// Never fails: provider errors are logged and replaced by mock data.
    /// Malformed tickers are refused before any provider budget is spent, and
    /// symbols that resolved to nothing stay unanswered for the TTL.
    pub async fn fetch_quote(&self, symbol: &str) -> Option<Quote> {
        let symbol = normalize_symbol(symbol)?;

        let now = self.clock.now();
        {
            let mut cache = lock(&self.cache);
            if let Some(quote) = cache.get(&symbol, now) {
                debug!("Quote cache hit for {symbol}");
                return Some(quote);
            }
            if cache.is_miss(&symbol, now) {
                debug!("Known miss for {symbol}");
                return None;
            }
        }

        let today = self.clock.local_date();
        match self.resolve(&symbol, today, now).await {
            Some(quote) => {
                lock(&self.cache).insert(quote.clone(), now);
                Some(quote)
            }
            None => {
                lock(&self.cache).insert_miss(&symbol, now);
                None
            }
        }
    }

    /// Quotes for several symbols, skipping unknown ones. Input order is kept.
    pub async fn fetch_quotes<S: AsRef<str>>(&self, symbols: &[S]) -> Vec<Quote> {
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if let Some(q) = self.fetch_quote(symbol.as_ref()).await {
                quotes.push(q);
            }
        }
        quotes
    }

    /// Current price usable for order execution: finite and strictly positive.
    pub async fn current_price(&self, symbol: &str) -> Result<f64, CoreError> {
        match self.fetch_quote(symbol).await {
            Some(q) if q.price.is_finite() && q.price > 0.0 => Ok(q.price),
            _ => Err(CoreError::QuoteUnavailable(symbol.trim().to_uppercase())),
        }
    }

    async fn resolve(&self, symbol: &str, today: NaiveDate, now: DateTime<Utc>) -> Option<Quote> {
        let name = baseline(symbol).map(|b| b.name).unwrap_or(symbol);

        let Some(tier) = self.select_tier(today) else {
            debug!("No provider budget left, serving deterministic mock for {symbol}");
            return self
                .mock
                .deterministic(symbol, today)
                .map(|raw| raw.into_quote(symbol, name, QuoteSource::Mock, now));
        };

        let provider = tier.provider.as_ref();
        match provider.fetch_quote(symbol).await {
            Ok(ProviderQuote::Found(raw)) if raw.price.is_finite() && raw.price > 0.0 => {
                return Some(raw.into_quote(
                    symbol,
                    name,
                    QuoteSource::provider(provider.name()),
                    now,
                ));
            }
            Ok(ProviderQuote::Found(raw)) => {
                warn!(
                    "{} returned invalid price {} for {symbol}, falling back to mock",
                    provider.name(),
                    raw.price
                );
            }
            Ok(ProviderQuote::Empty { reason }) => {
                warn!(
                    "{} had no data for {symbol} ({reason}), falling back to mock",
                    provider.name()
                );
            }
            Err(e) => {
                warn!("{} failed for {symbol}: {e}, falling back to mock", provider.name());
            }
        }

        self.mock
            .perturbed(symbol, today)
            .map(|raw| raw.into_quote(symbol, name, QuoteSource::Mock, now))
    }

    /// First tier that is unmetered or still has budget for one fetch.
    fn select_tier(&self, today: NaiveDate) -> Option<&ProviderTier> {
        for (tier, budget) in self.registry.tiers().iter().zip(&self.budgets) {
            match budget {
                None => return Some(tier),
                Some(budget) => {
                    if lock(budget).try_consume(tier.provider.cost(), today) {
                        return Some(tier);
                    }
                    debug!("Daily budget exhausted for {}", tier.provider.name());
                }
            }
        }
        None
    }

    /// Provider budgets and cache occupancy.
    pub fn status(&self) -> ApiStatus {
        let today = self.clock.local_date();
        let now = self.clock.now();

        let providers = self
            .registry
            .tiers()
            .iter()
            .zip(&self.budgets)
            .map(|(tier, budget)| match budget {
                Some(budget) => {
                    let mut budget = lock(budget);
                    ProviderStatus {
                        name: tier.provider.name().to_string(),
                        daily_budget: Some(budget.limit()),
                        calls_used_today: budget.used(today),
                        calls_remaining_today: Some(budget.remaining(today)),
                    }
                }
                None => ProviderStatus {
                    name: tier.provider.name().to_string(),
                    daily_budget: None,
                    calls_used_today: 0,
                    calls_remaining_today: None,
                },
            })
            .collect();

        let mut cache = lock(&self.cache);
        cache.prune_expired(now);

        ApiStatus {
            providers,
            cached_symbols: cache.len(),
            cache_ttl_secs: cache.ttl().num_seconds(),
            known_symbols: self.known_symbols(),
            checked_at: now,
        }
    }

    /// Symbols from the baseline table, in table order.
    pub fn known_symbols(&self) -> Vec<String> {
        BASELINES.iter().map(|b| b.symbol.to_string()).collect()
    }

    pub fn clear_cache(&self) {
        lock(&self.cache).clear();
    }
}
