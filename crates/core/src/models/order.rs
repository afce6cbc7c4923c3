use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::quote::normalize_symbol;

/// Direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderMode {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderMode::Buy => write!(f, "buy"),
            OrderMode::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for OrderMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(OrderMode::Buy),
            "sell" => Ok(OrderMode::Sell),
            other => Err(CoreError::ValidationError(format!(
                "Order mode must be 'buy' or 'sell', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Executed,
}

/// An executed buy or sell. Append-only: never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub qty: u64,
    /// Execution price per unit
    pub price: f64,
    pub mode: OrderMode,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn executed(ticket: &OrderTicket, user_id: Uuid, price: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            symbol: ticket.symbol.clone(),
            qty: ticket.qty,
            price,
            mode: ticket.mode,
            status: OrderStatus::Executed,
            created_at: Utc::now(),
        }
    }

    /// Cash value of the order (`qty * price`).
    pub fn notional(&self) -> f64 {
        self.qty as f64 * self.price
    }
}

/// An order request as received from a client. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrder {
    #[serde(default, alias = "name")]
    pub symbol: Option<String>,
    #[serde(default, alias = "quantity")]
    pub qty: Option<i64>,
    #[serde(default)]
    pub mode: Option<String>,
}

impl PlaceOrder {
    pub fn new(symbol: impl Into<String>, qty: i64, mode: OrderMode) -> Self {
        Self {
            symbol: Some(symbol.into()),
            qty: Some(qty),
            mode: Some(mode.to_string()),
        }
    }

    /// Check every field and produce a ticket the order service can execute.
    pub fn validate(&self) -> Result<OrderTicket, CoreError> {
        let raw = self
            .symbol
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::ValidationError("Symbol is required".into()))?;
        let symbol = normalize_symbol(raw).ok_or_else(|| {
            CoreError::ValidationError(format!("Invalid symbol '{}'", raw.to_uppercase()))
        })?;

        let qty = self
            .qty
            .ok_or_else(|| CoreError::ValidationError("Quantity is required".into()))?;
        if qty <= 0 {
            return Err(CoreError::ValidationError(format!(
                "Quantity must be a positive integer, got {qty}"
            )));
        }

        let mode: OrderMode = self
            .mode
            .as_deref()
            .ok_or_else(|| CoreError::ValidationError("Mode is required".into()))?
            .parse()?;

        Ok(OrderTicket {
            symbol,
            qty: qty as u64,
            mode,
        })
    }
}

/// A validated order: uppercase symbol, positive quantity, known mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTicket {
    pub symbol: String,
    pub qty: u64,
    pub mode: OrderMode,
}
