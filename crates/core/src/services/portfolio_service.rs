use chrono::Local;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::holding::{Holding, HoldingView, Position};
use crate::models::order::{Order, OrderMode};
use crate::services::quote_service::QuoteService;
use crate::storage::store::TradingStore;

/// Read-side views of a user's book: valued holdings and intraday positions.
pub struct PortfolioService {
    store: Arc<TradingStore>,
    quotes: Arc<QuoteService>,
    clock: Arc<dyn Clock>,
}

impl PortfolioService {
    pub fn new(store: Arc<TradingStore>, quotes: Arc<QuoteService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            quotes,
            clock,
        }
    }

    /// Stored holdings valued at current quotes, sorted by symbol.
    ///
    /// A holding whose symbol no longer resolves is valued at its average cost.
    pub async fn holdings(&self, user_id: Uuid) -> Vec<HoldingView> {
        let holdings = self.store.holdings_for(user_id).await;
        let mut views = Vec::with_capacity(holdings.len());
        for holding in holdings {
            let quote = self.quotes.fetch_quote(&holding.symbol).await;
            let (name, last_price, day_change_pct) = match &quote {
                Some(q) => (q.name.clone(), q.price, q.percent_change),
                None => (holding.symbol.clone(), holding.average_price, 0.0),
            };
            views.push(value_holding(&holding, name, last_price, day_change_pct));
        }
        views
    }

    /// Intraday positions: today's orders (local date) aggregated per symbol.
    pub async fn positions(&self, user_id: Uuid) -> Vec<Position> {
        let today = self.clock.local_date();
        let orders: Vec<Order> = self
            .store
            .orders_for(user_id)
            .await
            .into_iter()
            .filter(|o| o.created_at.with_timezone(&Local).date_naive() == today)
            .collect();

        let mut by_symbol: BTreeMap<String, Vec<Order>> = BTreeMap::new();
        for order in orders {
            by_symbol.entry(order.symbol.clone()).or_default().push(order);
        }

        let mut positions = Vec::with_capacity(by_symbol.len());
        for (symbol, orders) in by_symbol {
            let last_price = match self.quotes.fetch_quote(&symbol).await {
                Some(q) => q.price,
                None => orders.first().map_or(0.0, |o| o.price),
            };
            positions.push(aggregate_position(symbol, &orders, last_price));
        }
        positions
    }
}

fn value_holding(holding: &Holding, name: String, last_price: f64, day_change_pct: f64) -> HoldingView {
    let invested = holding.invested();
    let current_value = holding.quantity as f64 * last_price;
    let pnl = current_value - invested;
    HoldingView {
        symbol: holding.symbol.clone(),
        name,
        quantity: holding.quantity,
        average_price: holding.average_price,
        last_price,
        invested,
        current_value,
        pnl,
        pnl_pct: if invested > 0.0 { pnl / invested * 100.0 } else { 0.0 },
        day_change_pct,
    }
}

/// Net the day's fills for one symbol. Day P&L counts sells at their fill
/// price, buys at their cost, and the open remainder at `last_price`.
pub fn aggregate_position(symbol: String, orders: &[Order], last_price: f64) -> Position {
    let (mut buy_qty, mut sell_qty) = (0u64, 0u64);
    let (mut buy_value, mut sell_value) = (0.0, 0.0);
    for order in orders {
        match order.mode {
            OrderMode::Buy => {
                buy_qty += order.qty;
                buy_value += order.notional();
            }
            OrderMode::Sell => {
                sell_qty += order.qty;
                sell_value += order.notional();
            }
        }
    }

    let net_qty = buy_qty as i64 - sell_qty as i64;
    Position {
        symbol,
        buy_qty,
        sell_qty,
        net_qty,
        avg_buy_price: if buy_qty > 0 { buy_value / buy_qty as f64 } else { 0.0 },
        avg_sell_price: if sell_qty > 0 { sell_value / sell_qty as f64 } else { 0.0 },
        last_price,
        day_pnl: sell_value - buy_value + net_qty as f64 * last_price,
    }
}
