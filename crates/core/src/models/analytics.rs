use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::quote::{PricePoint, Quote};

/// Account-level trading summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingSummary {
    pub total_orders: usize,
    pub buy_orders: usize,
    pub sell_orders: usize,
    /// Sum of `qty * price` over buy orders
    pub buy_notional: f64,
    /// Sum of `qty * price` over sell orders
    pub sell_notional: f64,
    pub holdings_count: usize,
    /// Cost basis of current holdings
    pub invested_value: f64,
    /// Market value of current holdings
    pub current_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_pct: f64,
    pub cash_balance: f64,
    /// `cash_balance + current_value`
    pub total_equity: f64,
    pub most_traded_symbol: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    /// Classify a relative change; moves within ±`threshold_pct` are flat.
    pub fn from_change_pct(change_pct: f64, threshold_pct: f64) -> Self {
        if change_pct > threshold_pct {
            TrendDirection::Up
        } else if change_pct < -threshold_pct {
            TrendDirection::Down
        } else {
            TrendDirection::Flat
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTrend {
    pub quote: Quote,
    /// Change from the first to the last historical close, in percent
    pub period_change_pct: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberPerformance {
    pub rank: usize,
    pub member: String,
    pub desk: String,
    /// Weighted daily return of the member's book, in percent
    pub return_pct: f64,
    pub top_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionQuote {
    pub strike: f64,
    pub call_premium: f64,
    pub put_premium: f64,
    pub call_delta: f64,
    pub put_delta: f64,
    pub in_the_money_call: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionChain {
    pub symbol: String,
    pub spot: f64,
    pub expiry: NaiveDate,
    pub days_to_expiry: i64,
    /// Annualized volatility used for pricing
    pub volatility: f64,
    pub risk_free_rate: f64,
    /// Sorted by ascending strike
    pub strikes: Vec<OptionQuote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRisk {
    pub symbol: String,
    pub sector: String,
    pub value: f64,
    /// Share of portfolio value, 0..1
    pub weight: f64,
    /// Annualized volatility
    pub volatility: f64,
    pub sector_risk_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRisk {
    pub total_value: f64,
    /// Weighted annualized volatility
    pub portfolio_volatility: f64,
    /// One-day 95% value at risk in cash terms
    pub value_at_risk_95: f64,
    /// Herfindahl index of weights, 0..1 (1 = single holding)
    pub concentration: f64,
    /// 0 (calm) .. 100 (very risky)
    pub risk_score: f64,
    pub holdings: Vec<HoldingRisk>,
    /// Random-walk projection of the risk score, one point per step
    pub risk_trajectory: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingPrediction {
    pub symbol: String,
    pub current_price: f64,
    /// Fitted slope in price units per day
    pub slope_per_day: f64,
    pub direction: TrendDirection,
    pub predicted: Vec<PricePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub name: String,
    /// `None` for unmetered providers
    pub daily_budget: Option<u32>,
    pub calls_used_today: u32,
    pub calls_remaining_today: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    pub providers: Vec<ProviderStatus>,
    pub cached_symbols: usize,
    pub cache_ttl_secs: i64,
    pub known_symbols: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Quiet,
    Normal,
    Busy,
    Frenzy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitSymbol {
    pub symbol: String,
    pub price: f64,
    pub percent_change: f64,
    pub volume: u64,
    pub sentiment: Sentiment,
    pub activity: ActivityLevel,
    /// Best bid first
    pub bids: Vec<BookLevel>,
    /// Best ask first
    pub asks: Vec<BookLevel>,
}

/// One frame of the trading pit view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitSnapshot {
    pub taken_at: DateTime<Utc>,
    pub symbols: Vec<PitSymbol>,
}
