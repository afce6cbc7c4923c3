use chrono::{Datelike, Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use crate::models::quote::{PricePoint, RawQuote};

/// Static reference data for one symbol the desk always knows about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub symbol: &'static str,
    pub name: &'static str,
    pub price: f64,
    pub volume: u64,
    pub sector: &'static str,
    /// Annualized volatility, e.g. 0.30 = 30%
    pub volatility: f64,
}

/// Known symbols. Any of these always resolves to a quote.
pub const BASELINES: &[Baseline] = &[
    Baseline { symbol: "AAPL", name: "Apple Inc.", price: 189.50, volume: 52_000_000, sector: "Technology", volatility: 0.28 },
    Baseline { symbol: "MSFT", name: "Microsoft Corp.", price: 412.30, volume: 21_000_000, sector: "Technology", volatility: 0.25 },
    Baseline { symbol: "GOOGL", name: "Alphabet Inc.", price: 152.10, volume: 25_000_000, sector: "Communication", volatility: 0.30 },
    Baseline { symbol: "AMZN", name: "Amazon.com Inc.", price: 178.90, volume: 38_000_000, sector: "Consumer", volatility: 0.33 },
    Baseline { symbol: "TSLA", name: "Tesla Inc.", price: 205.60, volume: 95_000_000, sector: "Automotive", volatility: 0.55 },
    Baseline { symbol: "NVDA", name: "NVIDIA Corp.", price: 875.40, volume: 44_000_000, sector: "Technology", volatility: 0.50 },
    Baseline { symbol: "META", name: "Meta Platforms Inc.", price: 485.20, volume: 16_000_000, sector: "Communication", volatility: 0.38 },
    Baseline { symbol: "NFLX", name: "Netflix Inc.", price: 610.80, volume: 4_000_000, sector: "Communication", volatility: 0.40 },
    Baseline { symbol: "JPM", name: "JPMorgan Chase & Co.", price: 195.70, volume: 9_000_000, sector: "Financials", volatility: 0.22 },
    Baseline { symbol: "V", name: "Visa Inc.", price: 279.40, volume: 6_500_000, sector: "Financials", volatility: 0.20 },
    Baseline { symbol: "INFY", name: "Infosys Ltd.", price: 1555.35, volume: 6_200_000, sector: "Technology", volatility: 0.27 },
    Baseline { symbol: "TCS", name: "Tata Consultancy Services", price: 3194.80, volume: 2_100_000, sector: "Technology", volatility: 0.22 },
    Baseline { symbol: "RELIANCE", name: "Reliance Industries", price: 2112.40, volume: 8_800_000, sector: "Energy", volatility: 0.26 },
    Baseline { symbol: "HDFCBANK", name: "HDFC Bank Ltd.", price: 1522.35, volume: 11_400_000, sector: "Financials", volatility: 0.21 },
    Baseline { symbol: "ITC", name: "ITC Ltd.", price: 207.90, volume: 14_600_000, sector: "Consumer", volatility: 0.19 },
    Baseline { symbol: "SBIN", name: "State Bank of India", price: 430.20, volume: 18_300_000, sector: "Financials", volatility: 0.29 },
    Baseline { symbol: "WIPRO", name: "Wipro Ltd.", price: 577.75, volume: 5_700_000, sector: "Technology", volatility: 0.28 },
    Baseline { symbol: "ONGC", name: "Oil & Natural Gas Corp.", price: 116.80, volume: 12_900_000, sector: "Energy", volatility: 0.31 },
];

/// Look up the baseline for a symbol (case-insensitive).
pub fn baseline(symbol: &str) -> Option<&'static Baseline> {
    BASELINES
        .iter()
        .find(|b| b.symbol.eq_ignore_ascii_case(symbol))
}

/// Maximum relative deviation of a mock price from its baseline.
pub const PRICE_JITTER: f64 = 0.02;
/// Maximum relative deviation of mock volume from its baseline.
pub const VOLUME_JITTER: f64 = 0.20;
/// Number of daily closes in a mock history.
pub const HISTORY_DAYS: i64 = 30;

/// Synthesizes quotes from the baseline table.
///
/// - `deterministic`: seeded by `(symbol, date)`, so the same symbol returns
///   the same quote all day. Used when every live provider is out of budget.
/// - `perturbed`: draws from the generator's own RNG, so repeated calls vary
///   within the jitter bounds. Used when a live provider fails.
pub struct MockQuoteProvider {
    rng: Mutex<StdRng>,
}

impl MockQuoteProvider {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible perturbations (tests).
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn knows(&self, symbol: &str) -> bool {
        baseline(symbol).is_some()
    }

    /// Same output for the same `(symbol, date)`.
    pub fn deterministic(&self, symbol: &str, date: NaiveDate) -> Option<RawQuote> {
        let base = baseline(symbol)?;
        let seed = fnv1a(base.symbol.as_bytes()) ^ (date.num_days_from_ce() as u64);
        let mut rng = StdRng::seed_from_u64(seed);
        Some(synthesize(base, &mut rng, date))
    }

    /// Baseline plus bounded random perturbation.
    pub fn perturbed(&self, symbol: &str, date: NaiveDate) -> Option<RawQuote> {
        let base = baseline(symbol)?;
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        Some(synthesize(base, &mut *rng, date))
    }
}

impl Default for MockQuoteProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a quote ending on `date`: jittered price and volume plus a random-walk
/// history scaled to the symbol's volatility.
fn synthesize<R: Rng + ?Sized>(base: &Baseline, rng: &mut R, date: NaiveDate) -> RawQuote {
    let price = round_cents(base.price * (1.0 + rng.gen_range(-PRICE_JITTER..=PRICE_JITTER)));
    let volume =
        (base.volume as f64 * (1.0 + rng.gen_range(-VOLUME_JITTER..=VOLUME_JITTER))) as u64;

    // Walk backwards from today's price so the series ends exactly on it.
    let daily_vol = base.volatility / 252f64.sqrt();
    let mut closes = Vec::with_capacity(HISTORY_DAYS as usize);
    let mut p = price;
    closes.push(p);
    for _ in 1..HISTORY_DAYS {
        let step: f64 = rng.gen_range(-1.0..=1.0) * daily_vol;
        p = round_cents((p / (1.0 + step)).max(0.01));
        closes.push(p);
    }
    closes.reverse();

    let historical_prices: Vec<PricePoint> = closes
        .iter()
        .enumerate()
        .map(|(i, &price)| PricePoint {
            date: date - Duration::days(HISTORY_DAYS - 1 - i as i64),
            price,
        })
        .collect();

    let prev = closes[closes.len() - 2];
    let percent_change = if prev > 0.0 {
        (price - prev) / prev * 100.0
    } else {
        0.0
    };

    RawQuote {
        price,
        volume,
        percent_change,
        historical_prices,
    }
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
