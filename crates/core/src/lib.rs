pub mod clock;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use std::sync::Arc;

use argon2::Params;

use clock::{Clock, SystemClock};
use models::settings::Settings;
use providers::{mock::MockQuoteProvider, registry::ProviderRegistry};
use services::{
    analytics_service::AnalyticsService, auth_service::AuthService, order_service::OrderService,
    portfolio_service::PortfolioService, quote_service::QuoteService,
};
use storage::store::TradingStore;

/// Main entry point for the trading core.
///
/// Owns the shared store and one instance of every service. The quote cache
/// and budget counters inside [`QuoteService`] are process-wide, so clone the
/// `Arc`s handed out here rather than building a second desk.
#[must_use]
pub struct TradingDesk {
    settings: Settings,
    store: Arc<TradingStore>,
    quotes: Arc<QuoteService>,
    orders: Arc<OrderService>,
    portfolio: Arc<PortfolioService>,
    analytics: Arc<AnalyticsService>,
    auth: Arc<AuthService>,
}

impl std::fmt::Debug for TradingDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingDesk")
            .field("providers", &self.quotes.status().providers.len())
            .field("cache_ttl_secs", &self.settings.quote_cache_ttl_secs)
            .field("dirty", &self.store.is_dirty())
            .finish()
    }
}

impl TradingDesk {
    /// Empty store, default provider chain from `settings`, wall clock.
    pub fn new(settings: Settings) -> Self {
        let registry = ProviderRegistry::new_with_defaults(&settings);
        Self::with_parts(
            Arc::new(TradingStore::new()),
            registry,
            MockQuoteProvider::new(),
            Arc::new(SystemClock),
            settings,
        )
    }

    /// Wire a desk from explicit parts. Used for restored snapshots and tests.
    pub fn with_parts(
        store: Arc<TradingStore>,
        registry: ProviderRegistry,
        mock: MockQuoteProvider,
        clock: Arc<dyn Clock>,
        settings: Settings,
    ) -> Self {
        let ttl = settings.quote_cache_ttl();
        let quotes = Arc::new(QuoteService::with_parts(registry, mock, ttl, clock.clone()));
        let orders = Arc::new(OrderService::new(store.clone(), quotes.clone()));
        let portfolio = Arc::new(PortfolioService::new(
            store.clone(),
            quotes.clone(),
            clock.clone(),
        ));
        let analytics = Arc::new(AnalyticsService::new(
            store.clone(),
            quotes.clone(),
            portfolio.clone(),
            clock,
        ));
        let auth = Arc::new(AuthService::new(store.clone(), &settings));

        Self {
            settings,
            store,
            quotes,
            orders,
            portfolio,
            analytics,
            auth,
        }
    }

    /// Use a different Argon2 cost for new password hashes.
    pub fn with_password_params(mut self, params: Params) -> Self {
        self.auth = Arc::new(
            AuthService::new(self.store.clone(), &self.settings).with_password_params(params),
        );
        self
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> &Arc<TradingStore> {
        &self.store
    }

    #[must_use]
    pub fn quotes(&self) -> &Arc<QuoteService> {
        &self.quotes
    }

    #[must_use]
    pub fn orders(&self) -> &Arc<OrderService> {
        &self.orders
    }

    #[must_use]
    pub fn portfolio(&self) -> &Arc<PortfolioService> {
        &self.portfolio
    }

    #[must_use]
    pub fn analytics(&self) -> &Arc<AnalyticsService> {
        &self.analytics
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }
}
