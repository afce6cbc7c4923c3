use chrono::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::clock::Clock;
use crate::errors::CoreError;
use crate::models::analytics::{
    ActivityLevel, ApiStatus, BookLevel, HoldingPrediction, HoldingRisk, OptionChain,
    OptionQuote, PitSnapshot, PitSymbol, PortfolioRisk, Sentiment, StockTrend,
    TeamMemberPerformance, TradingSummary, TrendDirection,
};
use crate::models::order::OrderMode;
use crate::models::quote::{PricePoint, Quote};
use crate::providers::mock::baseline;
use crate::services::portfolio_service::PortfolioService;
use crate::services::quant;
use crate::services::quote_service::QuoteService;
use crate::storage::store::TradingStore;

/// Moves smaller than this (in percent) count as flat.
const FLAT_THRESHOLD_PCT: f64 = 0.5;

const OPTION_STRIKES_EACH_SIDE: i32 = 5;
const OPTION_STRIKE_STEP: f64 = 0.025;
const OPTION_DAYS_TO_EXPIRY: i64 = 30;
const RISK_FREE_RATE: f64 = 0.05;
const DEFAULT_VOLATILITY: f64 = 0.30;
const MIN_VOLATILITY: f64 = 0.05;

/// One-sided 95% z-score for value at risk.
const VAR_Z_95: f64 = 1.645;
const RISK_TRAJECTORY_POINTS: usize = 30;
const RISK_STEP: f64 = 3.0;

const PREDICTION_EPOCHS: usize = 500;
const PREDICTION_LEARNING_RATE: f64 = 0.5;
const PREDICTION_DAYS: i64 = 7;

const PIT_DEPTH: usize = 5;

/// A desk member and the book whose daily move is their performance.
struct TeamMember {
    member: &'static str,
    desk: &'static str,
    /// (symbol, weight); weights sum to 1
    book: &'static [(&'static str, f64)],
}

const TEAM: &[TeamMember] = &[
    TeamMember { member: "Aarav Mehta", desk: "Tech Momentum", book: &[("NVDA", 0.40), ("MSFT", 0.35), ("AAPL", 0.25)] },
    TeamMember { member: "Priya Nair", desk: "India Large Cap", book: &[("RELIANCE", 0.30), ("TCS", 0.25), ("INFY", 0.25), ("HDFCBANK", 0.20)] },
    TeamMember { member: "Daniel Okafor", desk: "Consumer & Media", book: &[("AMZN", 0.40), ("NFLX", 0.30), ("META", 0.30)] },
    TeamMember { member: "Mei Lin", desk: "Financials", book: &[("JPM", 0.40), ("V", 0.35), ("SBIN", 0.25)] },
    TeamMember { member: "Lucas Romero", desk: "High Beta", book: &[("TSLA", 0.50), ("NVDA", 0.30), ("ONGC", 0.20)] },
];

/// Risk multiplier per sector; unknown sectors weigh 1.0.
fn sector_risk_weight(sector: &str) -> f64 {
    match sector {
        "Technology" => 1.2,
        "Communication" => 1.1,
        "Automotive" => 1.4,
        "Energy" => 1.1,
        "Financials" => 0.9,
        "Consumer" => 1.0,
        _ => 1.0,
    }
}

/// Presentation data for the dashboard: summaries, trends, risk, predictions.
///
/// Random elements (risk trajectory, pit book sizes) come from an owned RNG,
/// seedable for reproducible output.
pub struct AnalyticsService {
    store: Arc<TradingStore>,
    quotes: Arc<QuoteService>,
    portfolio: Arc<PortfolioService>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl AnalyticsService {
    pub fn new(
        store: Arc<TradingStore>,
        quotes: Arc<QuoteService>,
        portfolio: Arc<PortfolioService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_rng(store, quotes, portfolio, clock, StdRng::from_entropy())
    }

    pub fn with_rng(
        store: Arc<TradingStore>,
        quotes: Arc<QuoteService>,
        portfolio: Arc<PortfolioService>,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            quotes,
            portfolio,
            clock,
            rng: Mutex::new(rng),
        }
    }

    fn rng(&self) -> std::sync::MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|p| p.into_inner())
    }

    // ── Account ─────────────────────────────────────────────────────

    pub async fn trading_summary(&self, user_id: Uuid) -> Result<TradingSummary, CoreError> {
        let user = self
            .store
            .user(user_id)
            .await
            .ok_or_else(|| CoreError::NotFound(format!("User {user_id}")))?;
        let orders = self.store.orders_for(user_id).await;
        let holdings = self.portfolio.holdings(user_id).await;

        let (mut buy_orders, mut sell_orders) = (0, 0);
        let (mut buy_notional, mut sell_notional) = (0.0, 0.0);
        let mut traded_qty: BTreeMap<&str, u64> = BTreeMap::new();
        for order in &orders {
            match order.mode {
                OrderMode::Buy => {
                    buy_orders += 1;
                    buy_notional += order.notional();
                }
                OrderMode::Sell => {
                    sell_orders += 1;
                    sell_notional += order.notional();
                }
            }
            *traded_qty.entry(order.symbol.as_str()).or_default() += order.qty;
        }

        // Alphabetically first among the most traded.
        let mut most_traded: Option<(&str, u64)> = None;
        for (symbol, qty) in traded_qty {
            if most_traded.map_or(true, |(_, best)| qty > best) {
                most_traded = Some((symbol, qty));
            }
        }

        let invested_value: f64 = holdings.iter().map(|h| h.invested).sum();
        let current_value: f64 = holdings.iter().map(|h| h.current_value).sum();
        let unrealized_pnl = current_value - invested_value;

        Ok(TradingSummary {
            total_orders: orders.len(),
            buy_orders,
            sell_orders,
            buy_notional,
            sell_notional,
            holdings_count: holdings.len(),
            invested_value,
            current_value,
            unrealized_pnl,
            unrealized_pnl_pct: if invested_value > 0.0 {
                unrealized_pnl / invested_value * 100.0
            } else {
                0.0
            },
            cash_balance: user.balance,
            total_equity: user.balance + current_value,
            most_traded_symbol: most_traded.map(|(s, _)| s.to_string()),
        })
    }

    // ── Market ──────────────────────────────────────────────────────

    /// Every known symbol, in baseline table order.
    pub async fn all_stocks(&self) -> Vec<Quote> {
        self.quotes
            .fetch_quotes(self.quotes.known_symbols().as_slice())
            .await
    }

    /// Known symbols with their period move, in baseline table order.
    pub async fn stock_trends(&self) -> Vec<StockTrend> {
        self.all_stocks()
            .await
            .into_iter()
            .map(|quote| {
                let period_change_pct = match (quote.historical_prices.first(), quote.historical_prices.last()) {
                    (Some(first), Some(last)) if first.price > 0.0 => {
                        (last.price - first.price) / first.price * 100.0
                    }
                    _ => quote.percent_change,
                };
                StockTrend {
                    direction: TrendDirection::from_change_pct(period_change_pct, FLAT_THRESHOLD_PCT),
                    period_change_pct,
                    quote,
                }
            })
            .collect()
    }

    /// Desk members ranked by the weighted daily move of their books.
    pub async fn team_performance(&self) -> Vec<TeamMemberPerformance> {
        let mut rows = Vec::with_capacity(TEAM.len());
        for member in TEAM {
            let mut return_pct = 0.0;
            let mut top: Option<(&str, f64)> = None;
            for &(symbol, weight) in member.book {
                let Some(quote) = self.quotes.fetch_quote(symbol).await else {
                    continue;
                };
                let contribution = weight * quote.percent_change;
                return_pct += contribution;
                if top.map_or(true, |(_, best)| contribution > best) {
                    top = Some((symbol, contribution));
                }
            }
            rows.push(TeamMemberPerformance {
                rank: 0,
                member: member.member.to_string(),
                desk: member.desk.to_string(),
                return_pct,
                top_symbol: top.map_or_else(String::new, |(s, _)| s.to_string()),
            });
        }

        rows.sort_by(|a, b| {
            b.return_pct
                .partial_cmp(&a.return_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = i + 1;
        }
        rows
    }

    /// Synthesized option chain around the current spot price.
    pub async fn option_chain(&self, symbol: &str) -> Result<OptionChain, CoreError> {
        let symbol = symbol.trim().to_uppercase();
        let quote = self
            .quotes
            .fetch_quote(&symbol)
            .await
            .filter(|q| q.price.is_finite() && q.price > 0.0)
            .ok_or_else(|| CoreError::QuoteUnavailable(symbol.clone()))?;

        let spot = quote.price;
        let volatility = quant::annualized_volatility(&quote.closes())
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_VOLATILITY)
            .max(MIN_VOLATILITY);
        let years = OPTION_DAYS_TO_EXPIRY as f64 / 365.0;

        let strikes = (-OPTION_STRIKES_EACH_SIDE..=OPTION_STRIKES_EACH_SIDE)
            .map(|k| {
                let strike = round_cents(spot * (1.0 + k as f64 * OPTION_STRIKE_STEP));
                let p = quant::black_scholes(spot, strike, years, RISK_FREE_RATE, volatility);
                OptionQuote {
                    strike,
                    call_premium: round_cents(p.call.max(0.0)),
                    put_premium: round_cents(p.put.max(0.0)),
                    call_delta: p.call_delta,
                    put_delta: p.put_delta,
                    in_the_money_call: strike < spot,
                }
            })
            .collect();

        Ok(OptionChain {
            symbol,
            spot,
            expiry: self.clock.local_date() + Duration::days(OPTION_DAYS_TO_EXPIRY),
            days_to_expiry: OPTION_DAYS_TO_EXPIRY,
            volatility,
            risk_free_rate: RISK_FREE_RATE,
            strikes,
        })
    }

    // ── Portfolio ───────────────────────────────────────────────────

    pub async fn portfolio_risk(&self, user_id: Uuid) -> Result<PortfolioRisk, CoreError> {
        if self.store.user(user_id).await.is_none() {
            return Err(CoreError::NotFound(format!("User {user_id}")));
        }

        let mut rows = Vec::new();
        for holding in self.store.holdings_for(user_id).await {
            let quote = self.quotes.fetch_quote(&holding.symbol).await;
            let base = baseline(&holding.symbol);
            let price = quote.as_ref().map_or(holding.average_price, |q| q.price);
            let volatility = quote
                .as_ref()
                .and_then(|q| quant::annualized_volatility(&q.closes()))
                .filter(|v| *v > 0.0)
                .or(base.map(|b| b.volatility))
                .unwrap_or(DEFAULT_VOLATILITY);
            let sector = base.map_or("Other", |b| b.sector);
            rows.push(HoldingRisk {
                symbol: holding.symbol.clone(),
                sector: sector.to_string(),
                value: holding.quantity as f64 * price,
                weight: 0.0,
                volatility,
                sector_risk_weight: sector_risk_weight(sector),
            });
        }

        let total_value: f64 = rows.iter().map(|r| r.value).sum();
        if total_value <= 0.0 {
            return Ok(PortfolioRisk {
                total_value: 0.0,
                portfolio_volatility: 0.0,
                value_at_risk_95: 0.0,
                concentration: 0.0,
                risk_score: 0.0,
                holdings: rows,
                risk_trajectory: vec![0.0; RISK_TRAJECTORY_POINTS],
            });
        }

        for row in &mut rows {
            row.weight = row.value / total_value;
        }
        // Ignores correlation, so this is an upper bound on true portfolio volatility.
        let portfolio_volatility: f64 = rows.iter().map(|r| r.weight * r.volatility).sum();
        let sector_adjusted: f64 = rows
            .iter()
            .map(|r| r.weight * r.volatility * r.sector_risk_weight)
            .sum();
        let concentration: f64 = rows.iter().map(|r| r.weight * r.weight).sum();
        let value_at_risk_95 =
            VAR_Z_95 * portfolio_volatility / quant::TRADING_DAYS.sqrt() * total_value;
        let risk_score =
            (100.0 * (0.6 * (sector_adjusted / 0.6).min(1.0) + 0.4 * concentration)).clamp(0.0, 100.0);

        Ok(PortfolioRisk {
            total_value,
            portfolio_volatility,
            value_at_risk_95,
            concentration,
            risk_score,
            holdings: rows,
            risk_trajectory: self.risk_trajectory(risk_score),
        })
    }

    /// Bounded random walk starting at `start`, clamped to 0..=100.
    fn risk_trajectory(&self, start: f64) -> Vec<f64> {
        let mut rng = self.rng();
        let mut score = start;
        let mut path = Vec::with_capacity(RISK_TRAJECTORY_POINTS);
        path.push(score);
        for _ in 1..RISK_TRAJECTORY_POINTS {
            score = (score + rng.gen_range(-RISK_STEP..=RISK_STEP)).clamp(0.0, 100.0);
            path.push(score);
        }
        path
    }

    /// Linear-trend projection for each holding.
    pub async fn predict_holdings(&self, user_id: Uuid) -> Result<Vec<HoldingPrediction>, CoreError> {
        if self.store.user(user_id).await.is_none() {
            return Err(CoreError::NotFound(format!("User {user_id}")));
        }

        let mut predictions = Vec::new();
        for holding in self.store.holdings_for(user_id).await {
            let Some(quote) = self.quotes.fetch_quote(&holding.symbol).await else {
                continue;
            };
            predictions.push(predict_quote(&quote));
        }
        Ok(predictions)
    }

    // ── Status / pit ────────────────────────────────────────────────

    pub fn api_status(&self) -> ApiStatus {
        self.quotes.status()
    }

    /// One frame of the trading pit: every known symbol with a synthetic book.
    pub async fn pit_snapshot(&self) -> PitSnapshot {
        let quotes = self.all_stocks().await;
        let mut rng = self.rng();
        let symbols = quotes
            .into_iter()
            .map(|q| {
                let sentiment = if q.percent_change > FLAT_THRESHOLD_PCT {
                    Sentiment::Bullish
                } else if q.percent_change < -FLAT_THRESHOLD_PCT {
                    Sentiment::Bearish
                } else {
                    Sentiment::Neutral
                };

                let activity = match baseline(&q.symbol) {
                    Some(b) if b.volume > 0 => {
                        let ratio = q.volume as f64 / b.volume as f64;
                        if ratio < 0.9 {
                            ActivityLevel::Quiet
                        } else if ratio < 1.05 {
                            ActivityLevel::Normal
                        } else if ratio < 1.15 {
                            ActivityLevel::Busy
                        } else {
                            ActivityLevel::Frenzy
                        }
                    }
                    _ => ActivityLevel::Normal,
                };

                let tick = (q.price * 0.0005).max(0.01);
                let lot = (q.volume / 2_000).max(1) as f64;
                let level = |i: usize, side: f64, rng: &mut StdRng| BookLevel {
                    price: round_cents(q.price + side * tick * (i + 1) as f64),
                    size: ((lot * rng.gen_range(0.5..1.5)) as u64).max(1),
                };
                let bids = (0..PIT_DEPTH).map(|i| level(i, -1.0, &mut *rng)).collect();
                let asks = (0..PIT_DEPTH).map(|i| level(i, 1.0, &mut *rng)).collect();

                PitSymbol {
                    symbol: q.symbol,
                    price: q.price,
                    percent_change: q.percent_change,
                    volume: q.volume,
                    sentiment,
                    activity,
                    bids,
                    asks,
                }
            })
            .collect();

        PitSnapshot {
            taken_at: self.clock.now(),
            symbols,
        }
    }
}

/// Fit the quote's history and project `PREDICTION_DAYS` past its last close.
pub fn predict_quote(quote: &Quote) -> HoldingPrediction {
    let closes = quote.closes();
    let fit = quant::fit_linear_trend(&closes, PREDICTION_EPOCHS, PREDICTION_LEARNING_RATE);
    let last_date = quote
        .historical_prices
        .last()
        .map(|p| p.date)
        .unwrap_or_else(|| quote.fetched_at.date_naive());
    let last_day = closes.len().saturating_sub(1) as f64;

    let (slope, predicted) = match fit {
        Some(fit) => {
            // Anchor the projection on the actual last price, keep the fitted slope.
            let offset = quote.price - fit.at(last_day);
            let points = (1..=PREDICTION_DAYS)
                .map(|d| PricePoint {
                    date: last_date + Duration::days(d),
                    price: round_cents((fit.at(last_day + d as f64) + offset).max(0.0)),
                })
                .collect();
            (fit.slope, points)
        }
        None => (
            0.0,
            (1..=PREDICTION_DAYS)
                .map(|d| PricePoint {
                    date: last_date + Duration::days(d),
                    price: quote.price,
                })
                .collect(),
        ),
    };

    let projected_change_pct = if quote.price > 0.0 {
        slope * PREDICTION_DAYS as f64 / quote.price * 100.0
    } else {
        0.0
    };

    HoldingPrediction {
        symbol: quote.symbol.clone(),
        current_price: quote.price,
        slope_per_day: slope,
        direction: TrendDirection::from_change_pct(projected_change_pct, FLAT_THRESHOLD_PCT),
        predicted,
    }
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
