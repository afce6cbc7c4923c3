use log::{info, warn};

use crate::models::settings::Settings;

use super::alphavantage::AlphaVantageProvider;
use super::traits::QuoteProvider;
use super::yahoo_finance::YahooFinanceProvider;

/// One provider slot. `daily_budget: None` means unmetered.
pub struct ProviderTier {
    pub provider: Box<dyn QuoteProvider>,
    pub daily_budget: Option<u32>,
}

/// Ordered list of quote providers.
///
/// The quote service walks the tiers in registration order and picks the first
/// one whose daily budget still admits a call. The mock generator is not a
/// tier; it is the service's own last resort.
pub struct ProviderRegistry {
    tiers: Vec<ProviderTier>,
}

impl ProviderRegistry {
    /// Create an empty registry (every fetch goes to the mock generator).
    pub fn new() -> Self {
        Self { tiers: Vec::new() }
    }

    /// Create a registry with the default providers.
    ///
    /// Alpha Vantage first (metered, only with an API key), then Yahoo Finance.
    pub fn new_with_defaults(settings: &Settings) -> Self {
        let mut registry = Self::new();

        match settings.api_key("alphavantage") {
            Some(key) => registry.register_metered(
                Box::new(AlphaVantageProvider::new(key.to_string())),
                settings.alphavantage_daily_budget,
            ),
            None => info!("No Alpha Vantage API key configured, skipping provider"),
        }

        match YahooFinanceProvider::new() {
            Ok(yahoo) => registry.register(Box::new(yahoo)),
            Err(e) => warn!("Yahoo Finance provider unavailable: {e}"),
        }

        registry
    }

    /// Register an unmetered provider.
    pub fn register(&mut self, provider: Box<dyn QuoteProvider>) {
        self.tiers.push(ProviderTier {
            provider,
            daily_budget: None,
        });
    }

    /// Register a provider limited to `daily_budget` calls per local day.
    pub fn register_metered(&mut self, provider: Box<dyn QuoteProvider>, daily_budget: u32) {
        self.tiers.push(ProviderTier {
            provider,
            daily_budget: Some(daily_budget),
        });
    }

    pub fn tiers(&self) -> &[ProviderTier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.tiers
            .iter()
            .map(|t| t.provider.name().to_string())
            .collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
