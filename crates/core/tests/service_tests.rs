// ═══════════════════════════════════════════════════════════════════
// Service Tests: QuoteService, OrderService, PortfolioService
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use trading_pit_core::clock::{Clock, ManualClock, SystemClock};
use trading_pit_core::errors::CoreError;
use trading_pit_core::models::order::{OrderMode, PlaceOrder};
use trading_pit_core::models::quote::{ProviderQuote, QuoteSource, RawQuote};
use trading_pit_core::models::user::User;
use trading_pit_core::providers::mock::{baseline, MockQuoteProvider, PRICE_JITTER};
use trading_pit_core::providers::registry::ProviderRegistry;
use trading_pit_core::providers::traits::QuoteProvider;
use trading_pit_core::services::order_service::OrderService;
use trading_pit_core::services::portfolio_service::PortfolioService;
use trading_pit_core::services::quote_service::QuoteService;
use trading_pit_core::storage::store::TradingStore;

// ═══════════════════════════════════════════════════════════════════
// Test providers
// ═══════════════════════════════════════════════════════════════════

/// Answers every symbol with a settable price and counts its calls.
#[derive(Clone)]
struct TestProvider {
    name: &'static str,
    price: Arc<Mutex<f64>>,
    calls: Arc<AtomicUsize>,
    cost: u32,
}

impl TestProvider {
    fn new(name: &'static str, price: f64) -> Self {
        Self {
            name,
            price: Arc::new(Mutex::new(price)),
            calls: Arc::new(AtomicUsize::new(0)),
            cost: 1,
        }
    }

    fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    fn set_price(&self, price: f64) {
        *self.price.lock().unwrap() = price;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteProvider for TestProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn cost(&self) -> u32 {
        self.cost
    }

    async fn fetch_quote(&self, _symbol: &str) -> Result<ProviderQuote, CoreError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let price = *self.price.lock().unwrap();
        Ok(ProviderQuote::Found(RawQuote {
            price,
            volume: 10_000 + n as u64,
            percent_change: 1.0,
            historical_prices: vec![],
        }))
    }
}

/// Always fails at the transport level.
#[derive(Clone, Default)]
struct FailingProvider {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl QuoteProvider for FailingProvider {
    fn name(&self) -> &str {
        "Failing"
    }

    async fn fetch_quote(&self, _symbol: &str) -> Result<ProviderQuote, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CoreError::Network("connection refused".into()))
    }
}

/// Answers, but never with data.
#[derive(Clone, Default)]
struct EmptyProvider {
    calls: Arc<AtomicUsize>,
    cost: u32,
}

impl EmptyProvider {
    fn metered(cost: u32) -> Self {
        Self {
            cost,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteProvider for EmptyProvider {
    fn name(&self) -> &str {
        "Empty"
    }

    fn cost(&self) -> u32 {
        self.cost.max(1)
    }

    async fn fetch_quote(&self, _symbol: &str) -> Result<ProviderQuote, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderQuote::Empty {
            reason: "Thank you for using Alpha Vantage! Our standard API rate limit is 25 requests per day.".into(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

const TTL_SECS: i64 = 300;

fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap(),
    ))
}

fn quote_service(registry: ProviderRegistry, clock: Arc<ManualClock>) -> QuoteService {
    QuoteService::with_parts(
        registry,
        MockQuoteProvider::with_seed(42),
        Duration::seconds(TTL_SECS),
        clock,
    )
}

fn registry_with(provider: impl QuoteProvider + 'static) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(provider));
    registry
}

fn within_jitter(symbol: &str, price: f64) -> bool {
    let base = baseline(symbol).unwrap().price;
    price >= base * (1.0 - PRICE_JITTER) - 0.01 && price <= base * (1.0 + PRICE_JITTER) + 0.01
}

fn trader(balance: f64) -> User {
    let id = Uuid::new_v4();
    User {
        id,
        username: format!("trader-{id}"),
        name: "Test Trader".into(),
        email: format!("{id}@example.com"),
        password_hash: String::new(),
        balance,
        created_at: Utc::now(),
    }
}

/// A desk whose every quote comes from `provider` (wall clock, no caching surprises).
struct Desk {
    store: Arc<TradingStore>,
    quotes: Arc<QuoteService>,
    orders: Arc<OrderService>,
    provider: TestProvider,
}

impl Desk {
    fn new(price: f64) -> Self {
        let provider = TestProvider::new("Test", price);
        let store = Arc::new(TradingStore::new());
        let quotes = Arc::new(QuoteService::with_parts(
            registry_with(provider.clone()),
            MockQuoteProvider::with_seed(1),
            Duration::seconds(TTL_SECS),
            Arc::new(SystemClock),
        ));
        let orders = Arc::new(OrderService::new(store.clone(), quotes.clone()));
        Self {
            store,
            quotes,
            orders,
            provider,
        }
    }

    /// Change the market price and drop cached quotes so it takes effect.
    fn reprice(&self, price: f64) {
        self.provider.set_price(price);
        self.quotes.clear_cache();
    }

    async fn trader(&self, balance: f64) -> Uuid {
        let user = trader(balance);
        let id = user.id;
        self.store.insert_user(user).await.unwrap();
        id
    }

    async fn balance(&self, user_id: Uuid) -> f64 {
        self.store.user(user_id).await.unwrap().balance
    }

    async fn held(&self, user_id: Uuid, symbol: &str) -> u64 {
        self.store
            .holding(user_id, symbol)
            .await
            .map_or(0, |h| h.quantity)
    }
}

// ═══════════════════════════════════════════════════════════════════
// QuoteService
// ═══════════════════════════════════════════════════════════════════

mod quote_fallback {
    use super::*;

    #[tokio::test]
    async fn known_symbol_survives_failing_provider() {
        let service = quote_service(registry_with(FailingProvider::default()), manual_clock());
        let quote = service.fetch_quote("AAPL").await.expect("known symbol");
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.name, "Apple Inc.");
        assert!(quote.source.is_mock());
        assert!(within_jitter("AAPL", quote.price));
        assert!(!quote.historical_prices.is_empty());
    }

    #[tokio::test]
    async fn empty_answer_falls_back_to_mock() {
        let service = quote_service(registry_with(EmptyProvider::default()), manual_clock());
        let quote = service.fetch_quote("TCS").await.unwrap();
        assert_eq!(quote.source, QuoteSource::Mock);
        assert!(within_jitter("TCS", quote.price));
    }

    #[tokio::test]
    async fn non_positive_price_falls_back_to_mock() {
        let provider = TestProvider::new("Broken", 0.0);
        let service = quote_service(registry_with(provider), manual_clock());
        let quote = service.fetch_quote("MSFT").await.unwrap();
        assert!(quote.source.is_mock());
        assert!(quote.price > 0.0);
    }

    #[tokio::test]
    async fn nan_price_falls_back_to_mock() {
        let provider = TestProvider::new("Broken", f64::NAN);
        let service = quote_service(registry_with(provider), manual_clock());
        let quote = service.fetch_quote("MSFT").await.unwrap();
        assert!(quote.source.is_mock());
        assert!(quote.price.is_finite());
    }

    #[tokio::test]
    async fn unknown_symbol_with_failing_provider_is_none() {
        let service = quote_service(registry_with(FailingProvider::default()), manual_clock());
        assert!(service.fetch_quote("ZZZZ").await.is_none());
        assert!(matches!(
            service.current_price("zzzz").await,
            Err(CoreError::QuoteUnavailable(s)) if s == "ZZZZ"
        ));
    }

    #[tokio::test]
    async fn unknown_symbol_from_live_provider_is_served() {
        let service = quote_service(registry_with(TestProvider::new("Live", 12.5)), manual_clock());
        let quote = service.fetch_quote("xyz").await.unwrap();
        assert_eq!(quote.symbol, "XYZ");
        assert_eq!(quote.name, "XYZ");
        assert_eq!(quote.price, 12.5);
        assert_eq!(quote.source, QuoteSource::provider("Live"));
    }

    #[tokio::test]
    async fn blank_symbol_is_none() {
        let service = quote_service(ProviderRegistry::new(), manual_clock());
        assert!(service.fetch_quote("   ").await.is_none());
    }

    #[tokio::test]
    async fn every_known_symbol_resolves_without_providers() {
        let service = quote_service(ProviderRegistry::new(), manual_clock());
        let symbols = service.known_symbols();
        let quotes = service.fetch_quotes(symbols.as_slice()).await;
        assert_eq!(quotes.len(), symbols.len());
        for (quote, symbol) in quotes.iter().zip(&symbols) {
            assert_eq!(&quote.symbol, symbol);
            assert!(quote.price > 0.0);
        }
    }

    #[tokio::test]
    async fn fetch_quotes_skips_unknown_and_keeps_order() {
        let service = quote_service(ProviderRegistry::new(), manual_clock());
        let quotes = service.fetch_quotes(&["TSLA", "NOPE", "aapl"]).await;
        let symbols: Vec<&str> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["TSLA", "AAPL"]);
    }
}

mod quote_cache {
    use super::*;

    #[tokio::test]
    async fn repeated_fetch_within_ttl_is_identical() {
        let provider = TestProvider::new("Live", 100.0);
        let clock = manual_clock();
        let service = quote_service(registry_with(provider.clone()), clock.clone());

        let first = service.fetch_quote("AAPL").await.unwrap();
        provider.set_price(101.0);
        clock.advance(Duration::seconds(TTL_SECS - 1));
        let second = service.fetch_quote("aapl").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let provider = TestProvider::new("Live", 100.0);
        let clock = manual_clock();
        let service = quote_service(registry_with(provider.clone()), clock.clone());

        service.fetch_quote("AAPL").await.unwrap();
        provider.set_price(105.0);
        clock.advance(Duration::seconds(TTL_SECS));
        let refreshed = service.fetch_quote("AAPL").await.unwrap();

        assert_eq!(refreshed.price, 105.0);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn fallback_quotes_are_cached_too() {
        let failing = FailingProvider::default();
        let clock = manual_clock();
        let service = quote_service(registry_with(failing.clone()), clock.clone());

        let first = service.fetch_quote("NFLX").await.unwrap();
        let second = service.fetch_quote("NFLX").await.unwrap();
        assert_eq!(first.price, second.price);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::seconds(TTL_SECS + 1));
        service.fetch_quote("NFLX").await.unwrap();
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn ttl_past_the_calendar_end_saturates() {
        let provider = TestProvider::new("Live", 70.0);
        let service = QuoteService::with_parts(
            registry_with(provider.clone()),
            MockQuoteProvider::with_seed(42),
            Duration::try_seconds(10_000_000_000_000).unwrap(),
            manual_clock(),
        );

        let first = service.fetch_quote("AAPL").await.unwrap();
        let second = service.fetch_quote("AAPL").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn clear_cache_forces_refetch() {
        let provider = TestProvider::new("Live", 50.0);
        let service = quote_service(registry_with(provider.clone()), manual_clock());
        service.fetch_quote("JPM").await;
        service.clear_cache();
        service.fetch_quote("JPM").await;
        assert_eq!(provider.calls(), 2);
    }
}

mod quote_budget {
    use super::*;

    #[tokio::test]
    async fn metered_tier_is_skipped_once_exhausted() {
        let metered = TestProvider::new("Metered", 10.0).with_cost(2);
        let backup = TestProvider::new("Backup", 20.0);
        let mut registry = ProviderRegistry::new();
        registry.register_metered(Box::new(metered.clone()), 5);
        registry.register(Box::new(backup.clone()));
        let service = quote_service(registry, manual_clock());

        let a = service.fetch_quote("AAPL").await.unwrap();
        let b = service.fetch_quote("MSFT").await.unwrap();
        let c = service.fetch_quote("TSLA").await.unwrap();

        assert_eq!(a.source, QuoteSource::provider("Metered"));
        assert_eq!(b.source, QuoteSource::provider("Metered"));
        assert_eq!(c.source, QuoteSource::provider("Backup"));
        assert_eq!(metered.calls(), 2);
        assert_eq!(backup.calls(), 1);

        let status = service.status();
        assert_eq!(status.providers[0].daily_budget, Some(5));
        assert_eq!(status.providers[0].calls_used_today, 4);
        assert_eq!(status.providers[0].calls_remaining_today, Some(1));
        assert_eq!(status.providers[1].calls_remaining_today, None);
    }

    #[tokio::test]
    async fn exhausted_budget_serves_deterministic_mock() {
        let metered = TestProvider::new("Metered", 10.0);
        let mut registry = ProviderRegistry::new();
        registry.register_metered(Box::new(metered.clone()), 1);
        let service = quote_service(registry, manual_clock());

        service.fetch_quote("AAPL").await.unwrap();
        let first = service.fetch_quote("GOOGL").await.unwrap();
        service.clear_cache();
        let second = service.fetch_quote("GOOGL").await.unwrap();

        assert_eq!(metered.calls(), 1);
        assert!(first.source.is_mock());
        assert_eq!(first.price, second.price);
        assert_eq!(first.historical_prices, second.historical_prices);
    }

    #[tokio::test]
    async fn budget_resets_on_the_next_local_day() {
        let metered = TestProvider::new("Metered", 10.0);
        let mut registry = ProviderRegistry::new();
        registry.register_metered(Box::new(metered.clone()), 1);
        let clock = manual_clock();
        let service = quote_service(registry, clock.clone());

        service.fetch_quote("AAPL").await;
        service.fetch_quote("MSFT").await;
        assert_eq!(metered.calls(), 1);
        assert_eq!(service.status().providers[0].calls_remaining_today, Some(0));

        clock.advance(Duration::days(1));
        let next_day = service.fetch_quote("MSFT").await.unwrap();
        assert_eq!(next_day.source, QuoteSource::provider("Metered"));
        assert_eq!(metered.calls(), 2);
    }

    #[tokio::test]
    async fn zero_budget_never_calls_the_provider() {
        let metered = TestProvider::new("Metered", 10.0);
        let mut registry = ProviderRegistry::new();
        registry.register_metered(Box::new(metered.clone()), 0);
        let service = quote_service(registry, manual_clock());

        let quote = service.fetch_quote("ITC").await.unwrap();
        assert!(quote.source.is_mock());
        assert_eq!(metered.calls(), 0);
    }

    #[tokio::test]
    async fn status_reports_cache_and_symbols() {
        let clock = manual_clock();
        let service = quote_service(ProviderRegistry::new(), clock.clone());
        service.fetch_quote("AAPL").await;
        service.fetch_quote("SBIN").await;

        let status = service.status();
        assert!(status.providers.is_empty());
        assert_eq!(status.cached_symbols, 2);
        assert_eq!(status.cache_ttl_secs, TTL_SECS);
        assert_eq!(status.known_symbols.len(), 18);
        assert_eq!(status.checked_at, clock.now());

        clock.advance(Duration::seconds(TTL_SECS + 1));
        assert_eq!(service.status().cached_symbols, 0);
    }

    #[tokio::test]
    async fn malformed_symbols_spend_no_budget() {
        let metered = EmptyProvider::metered(2);
        let mut registry = ProviderRegistry::new();
        registry.register_metered(Box::new(metered.clone()), 25);
        let service = quote_service(registry, manual_clock());

        for junk in ["no such thing!!", "../etc/passwd", "A".repeat(13).as_str(), "AAPL;"] {
            for _ in 0..12 {
                assert!(service.fetch_quote(junk).await.is_none(), "{junk}");
            }
        }

        assert_eq!(metered.calls(), 0);
        assert_eq!(service.status().providers[0].calls_remaining_today, Some(25));
    }

    #[tokio::test]
    async fn unknown_symbol_is_remembered_for_the_ttl() {
        let metered = EmptyProvider::metered(2);
        let mut registry = ProviderRegistry::new();
        registry.register_metered(Box::new(metered.clone()), 25);
        let clock = manual_clock();
        let service = quote_service(registry, clock.clone());

        for _ in 0..12 {
            assert!(service.fetch_quote("ZZZZ").await.is_none());
        }
        assert_eq!(metered.calls(), 1);
        assert_eq!(service.status().providers[0].calls_remaining_today, Some(23));

        clock.advance(Duration::seconds(TTL_SECS));
        assert!(service.fetch_quote("zzzz").await.is_none());
        assert_eq!(metered.calls(), 2);
    }
}

// ═══════════════════════════════════════════════════════════════════
// OrderService
// ═══════════════════════════════════════════════════════════════════

mod order_buy {
    use super::*;

    #[tokio::test]
    async fn buy_creates_holding_and_debits_cash() {
        let desk = Desk::new(100.0);
        let user = desk.trader(10_000.0).await;

        let order = desk
            .orders
            .place_order(user, &PlaceOrder::new("aapl", 10, OrderMode::Buy))
            .await
            .unwrap();

        assert_eq!(order.symbol, "AAPL");
        assert_eq!(order.qty, 10);
        assert_eq!(order.price, 100.0);
        assert_eq!(order.mode, OrderMode::Buy);
        assert_eq!(desk.balance(user).await, 9_000.0);

        let holding = desk.store.holding(user, "AAPL").await.unwrap();
        assert_eq!(holding.quantity, 10);
        assert_eq!(holding.average_price, 100.0);
        assert_eq!(desk.orders.orders_for(user).await.len(), 1);
    }

    #[tokio::test]
    async fn second_buy_uses_weighted_average() {
        let desk = Desk::new(100.0);
        let user = desk.trader(100_000.0).await;

        desk.orders
            .place_order(user, &PlaceOrder::new("MSFT", 10, OrderMode::Buy))
            .await
            .unwrap();
        desk.reprice(130.0);
        desk.orders
            .place_order(user, &PlaceOrder::new("MSFT", 20, OrderMode::Buy))
            .await
            .unwrap();

        let holding = desk.store.holding(user, "MSFT").await.unwrap();
        assert_eq!(holding.quantity, 30);
        let expected = (10.0 * 100.0 + 20.0 * 130.0) / 30.0;
        assert!((holding.average_price - expected).abs() < 1e-9);
        assert!((desk.balance(user).await - (100_000.0 - 1_000.0 - 2_600.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unaffordable_buy_changes_nothing() {
        let desk = Desk::new(100.0);
        let user = desk.trader(999.0).await;

        let err = desk
            .orders
            .place_order(user, &PlaceOrder::new("AAPL", 10, OrderMode::Buy))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::InsufficientFunds { required, available }
            if required == 1_000.0 && available == 999.0));
        assert_eq!(desk.balance(user).await, 999.0);
        assert!(desk.store.holding(user, "AAPL").await.is_none());
        assert!(desk.orders.orders_for(user).await.is_empty());
    }

    #[tokio::test]
    async fn exact_balance_is_affordable() {
        let desk = Desk::new(100.0);
        let user = desk.trader(1_000.0).await;
        desk.orders
            .place_order(user, &PlaceOrder::new("AAPL", 10, OrderMode::Buy))
            .await
            .unwrap();
        assert_eq!(desk.balance(user).await, 0.0);
    }
}

mod order_sell {
    use super::*;

    #[tokio::test]
    async fn partial_sell_keeps_average_and_credits_cash() {
        let desk = Desk::new(100.0);
        let user = desk.trader(10_000.0).await;
        desk.orders
            .place_order(user, &PlaceOrder::new("NVDA", 10, OrderMode::Buy))
            .await
            .unwrap();

        desk.reprice(120.0);
        desk.orders
            .place_order(user, &PlaceOrder::new("NVDA", 4, OrderMode::Sell))
            .await
            .unwrap();

        let holding = desk.store.holding(user, "NVDA").await.unwrap();
        assert_eq!(holding.quantity, 6);
        assert_eq!(holding.average_price, 100.0);
        assert_eq!(desk.balance(user).await, 10_000.0 - 1_000.0 + 480.0);
    }

    #[tokio::test]
    async fn selling_everything_removes_the_holding() {
        let desk = Desk::new(50.0);
        let user = desk.trader(1_000.0).await;
        desk.orders
            .place_order(user, &PlaceOrder::new("ITC", 5, OrderMode::Buy))
            .await
            .unwrap();
        desk.orders
            .place_order(user, &PlaceOrder::new("itc", 5, OrderMode::Sell))
            .await
            .unwrap();

        assert!(desk.store.holding(user, "ITC").await.is_none());
        assert!(desk.store.holdings_for(user).await.is_empty());
        assert_eq!(desk.balance(user).await, 1_000.0);
        assert_eq!(desk.orders.orders_for(user).await.len(), 2);
    }

    #[tokio::test]
    async fn oversell_is_rejected_and_changes_nothing() {
        let desk = Desk::new(100.0);
        let user = desk.trader(10_000.0).await;
        desk.orders
            .place_order(user, &PlaceOrder::new("AAPL", 3, OrderMode::Buy))
            .await
            .unwrap();

        let err = desk
            .orders
            .place_order(user, &PlaceOrder::new("AAPL", 4, OrderMode::Sell))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::InsufficientHoldings { requested: 4, held: 3, .. }));
        assert_eq!(desk.held(user, "AAPL").await, 3);
        assert_eq!(desk.balance(user).await, 9_700.0);
        assert_eq!(desk.orders.orders_for(user).await.len(), 1);
    }

    #[tokio::test]
    async fn selling_unheld_symbol_is_rejected() {
        let desk = Desk::new(100.0);
        let user = desk.trader(10_000.0).await;
        let err = desk
            .orders
            .place_order(user, &PlaceOrder::new("TSLA", 1, OrderMode::Sell))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientHoldings { held: 0, .. }));
        assert!(desk.orders.orders_for(user).await.is_empty());
    }
}

mod order_validation {
    use super::*;

    async fn rejected(desk: &Desk, user: Uuid, request: PlaceOrder) -> CoreError {
        desk.orders.place_order(user, &request).await.unwrap_err()
    }

    #[tokio::test]
    async fn malformed_requests_are_validation_errors() {
        let desk = Desk::new(100.0);
        let user = desk.trader(10_000.0).await;

        let cases = vec![
            PlaceOrder::default(),
            PlaceOrder::new("AAPL", 0, OrderMode::Buy),
            PlaceOrder::new("AAPL", -5, OrderMode::Buy),
            PlaceOrder::new("   ", 1, OrderMode::Buy),
            PlaceOrder {
                symbol: Some("AAPL".into()),
                qty: Some(1),
                mode: Some("short".into()),
            },
            PlaceOrder {
                symbol: Some("AAPL".into()),
                qty: Some(1),
                mode: None,
            },
        ];
        for case in cases {
            let err = rejected(&desk, user, case.clone()).await;
            assert!(
                matches!(err, CoreError::ValidationError(_)),
                "{case:?} gave {err:?}"
            );
        }

        assert!(desk.orders.orders_for(user).await.is_empty());
        assert_eq!(desk.balance(user).await, 10_000.0);
        assert_eq!(desk.provider.calls(), 0);
    }

    #[tokio::test]
    async fn non_finite_balance_cannot_buy() {
        let desk = Desk::new(100.0);
        for balance in [f64::NAN, f64::INFINITY] {
            let user = desk.trader(balance).await;
            let err = rejected(&desk, user, PlaceOrder::new("AAPL", 1_000_000, OrderMode::Buy)).await;
            assert!(matches!(err, CoreError::InsufficientFunds { .. }), "{err:?}");
            assert_eq!(desk.held(user, "AAPL").await, 0);
            assert!(desk.orders.orders_for(user).await.is_empty());
        }
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let desk = Desk::new(100.0);
        let err = rejected(&desk, Uuid::new_v4(), PlaceOrder::new("AAPL", 1, OrderMode::Buy)).await;
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn unpriceable_symbol_is_rejected() {
        let store = Arc::new(TradingStore::new());
        let quotes = Arc::new(quote_service(
            registry_with(FailingProvider::default()),
            manual_clock(),
        ));
        let orders = OrderService::new(store.clone(), quotes);
        let user = trader(1_000.0);
        let id = user.id;
        store.insert_user(user).await.unwrap();

        let err = orders
            .place_order(id, &PlaceOrder::new("NOPE", 1, OrderMode::Buy))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::QuoteUnavailable(_)));
        assert!(store.orders_for(id).await.is_empty());
    }
}

mod order_invariants {
    use super::*;

    #[tokio::test]
    async fn holding_equals_bought_minus_sold() {
        let desk = Desk::new(10.0);
        let user = desk.trader(1_000_000.0).await;
        let script: &[(OrderMode, i64)] = &[
            (OrderMode::Buy, 5),
            (OrderMode::Buy, 7),
            (OrderMode::Sell, 3),
            (OrderMode::Sell, 20),
            (OrderMode::Buy, 1),
            (OrderMode::Sell, 10),
            (OrderMode::Sell, 1),
        ];

        for (i, (mode, qty)) in script.iter().enumerate() {
            desk.reprice(10.0 + i as f64);
            let _ = desk
                .orders
                .place_order(user, &PlaceOrder::new("WIPRO", *qty, *mode))
                .await;

            let orders = desk.orders.orders_for(user).await;
            let bought: u64 = orders.iter().filter(|o| o.mode == OrderMode::Buy).map(|o| o.qty).sum();
            let sold: u64 = orders.iter().filter(|o| o.mode == OrderMode::Sell).map(|o| o.qty).sum();
            assert!(bought >= sold);
            assert_eq!(desk.held(user, "WIPRO").await, bought - sold);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_buys_never_overspend() {
        let desk = Desk::new(100.0);
        let user = desk.trader(1_000.0).await;

        let mut handles = Vec::new();
        for _ in 0..25 {
            let orders = desk.orders.clone();
            handles.push(tokio::spawn(async move {
                orders
                    .place_order(user, &PlaceOrder::new("V", 1, OrderMode::Buy))
                    .await
                    .is_ok()
            }));
        }
        let mut filled = 0;
        for handle in handles {
            if handle.await.unwrap() {
                filled += 1;
            }
        }

        assert_eq!(filled, 10);
        assert_eq!(desk.held(user, "V").await, 10);
        assert_eq!(desk.balance(user).await, 0.0);
        assert_eq!(desk.orders.orders_for(user).await.len(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sells_never_go_negative() {
        let desk = Desk::new(100.0);
        let user = desk.trader(1_000.0).await;
        desk.orders
            .place_order(user, &PlaceOrder::new("V", 5, OrderMode::Buy))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..12 {
            let orders = desk.orders.clone();
            handles.push(tokio::spawn(async move {
                orders
                    .place_order(user, &PlaceOrder::new("V", 1, OrderMode::Sell))
                    .await
                    .is_ok()
            }));
        }
        let mut filled = 0;
        for handle in handles {
            if handle.await.unwrap() {
                filled += 1;
            }
        }

        assert_eq!(filled, 5);
        assert!(desk.store.holding(user, "V").await.is_none());
        assert_eq!(desk.balance(user).await, 1_000.0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// PortfolioService
// ═══════════════════════════════════════════════════════════════════

mod portfolio {
    use super::*;
    use trading_pit_core::models::order::{Order, OrderStatus};
    use trading_pit_core::services::portfolio_service::aggregate_position;

    fn portfolio(desk: &Desk) -> PortfolioService {
        PortfolioService::new(desk.store.clone(), desk.quotes.clone(), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn holdings_are_valued_at_the_current_quote() {
        let desk = Desk::new(100.0);
        let user = desk.trader(10_000.0).await;
        desk.orders
            .place_order(user, &PlaceOrder::new("AAPL", 10, OrderMode::Buy))
            .await
            .unwrap();
        desk.reprice(110.0);

        let views = portfolio(&desk).holdings(user).await;
        assert_eq!(views.len(), 1);
        let view = &views[0];
        assert_eq!(view.name, "Apple Inc.");
        assert_eq!(view.invested, 1_000.0);
        assert_eq!(view.current_value, 1_100.0);
        assert!((view.pnl - 100.0).abs() < 1e-9);
        assert!((view.pnl_pct - 10.0).abs() < 1e-9);
        assert_eq!(view.day_change_pct, 1.0);
    }

    #[tokio::test]
    async fn holdings_are_sorted_by_symbol() {
        let desk = Desk::new(10.0);
        let user = desk.trader(10_000.0).await;
        for symbol in ["TSLA", "AAPL", "META"] {
            desk.orders
                .place_order(user, &PlaceOrder::new(symbol, 1, OrderMode::Buy))
                .await
                .unwrap();
        }
        let symbols: Vec<String> = portfolio(&desk)
            .holdings(user)
            .await
            .into_iter()
            .map(|h| h.symbol)
            .collect();
        assert_eq!(symbols, vec!["AAPL", "META", "TSLA"]);
    }

    #[tokio::test]
    async fn positions_net_todays_orders() {
        let desk = Desk::new(100.0);
        let user = desk.trader(10_000.0).await;
        desk.orders
            .place_order(user, &PlaceOrder::new("AMZN", 10, OrderMode::Buy))
            .await
            .unwrap();
        desk.reprice(110.0);
        desk.orders
            .place_order(user, &PlaceOrder::new("AMZN", 4, OrderMode::Sell))
            .await
            .unwrap();

        let positions = portfolio(&desk).positions(user).await;
        assert_eq!(positions.len(), 1);
        let p = &positions[0];
        assert_eq!(p.buy_qty, 10);
        assert_eq!(p.sell_qty, 4);
        assert_eq!(p.net_qty, 6);
        assert_eq!(p.avg_buy_price, 100.0);
        assert_eq!(p.avg_sell_price, 110.0);
        // 440 - 1000 + 6 * 110
        assert!((p.day_pnl - 100.0).abs() < 1e-9);
    }

    #[test]
    fn aggregate_handles_net_short_day() {
        let user = Uuid::new_v4();
        let order = |mode, qty, price| Order {
            id: Uuid::new_v4(),
            user_id: user,
            symbol: "SBIN".into(),
            qty,
            price,
            mode,
            status: OrderStatus::Executed,
            created_at: Utc::now(),
        };
        let orders = vec![order(OrderMode::Sell, 5, 20.0), order(OrderMode::Buy, 2, 18.0)];
        let p = aggregate_position("SBIN".into(), &orders, 19.0);

        assert_eq!(p.net_qty, -3);
        assert_eq!(p.avg_buy_price, 18.0);
        assert_eq!(p.avg_sell_price, 20.0);
        assert!((p.day_pnl - (100.0 - 36.0 - 57.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_book_has_no_positions() {
        let desk = Desk::new(100.0);
        let user = desk.trader(10_000.0).await;
        let service = portfolio(&desk);
        assert!(service.holdings(user).await.is_empty());
        assert!(service.positions(user).await.is_empty());
    }
}
