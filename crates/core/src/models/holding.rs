use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's current position in one symbol: quantity and average cost.
///
/// Unique per `(user_id, symbol)`. Removed from the store when the quantity
/// reaches zero, so a stored holding always has `quantity > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub user_id: Uuid,
    pub symbol: String,
    pub quantity: u64,
    pub average_price: f64,
    pub updated_at: DateTime<Utc>,
}

impl Holding {
    pub fn new(user_id: Uuid, symbol: impl Into<String>, quantity: u64, price: f64) -> Self {
        Self {
            user_id,
            symbol: symbol.into().to_uppercase(),
            quantity,
            average_price: price,
            updated_at: Utc::now(),
        }
    }

    /// Add `qty` units bought at `price`, recomputing the weighted average cost:
    /// `(old_qty * old_avg + qty * price) / (old_qty + qty)`.
    pub fn add(&mut self, qty: u64, price: f64) {
        let total = self.quantity + qty;
        if total > 0 {
            self.average_price = (self.quantity as f64 * self.average_price
                + qty as f64 * price)
                / total as f64;
        }
        self.quantity = total;
        self.updated_at = Utc::now();
    }

    /// Remove `qty` units. Callers check `qty <= quantity` first; the
    /// average cost of the remaining units is unchanged by a sale.
    pub fn remove(&mut self, qty: u64) {
        self.quantity = self.quantity.saturating_sub(qty);
        self.updated_at = Utc::now();
    }

    /// Cost basis of the held units.
    pub fn invested(&self) -> f64 {
        self.quantity as f64 * self.average_price
    }
}

/// A stored holding valued at the current market quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingView {
    pub symbol: String,
    pub name: String,
    pub quantity: u64,
    pub average_price: f64,
    pub last_price: f64,
    pub invested: f64,
    pub current_value: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub day_change_pct: f64,
}

/// Intraday position aggregated from the current day's orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    pub buy_qty: u64,
    pub sell_qty: u64,
    /// `buy_qty - sell_qty`; negative when the day's sells exceed its buys
    pub net_qty: i64,
    pub avg_buy_price: f64,
    pub avg_sell_price: f64,
    pub last_price: f64,
    pub day_pnl: f64,
}
