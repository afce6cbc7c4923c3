//! Small numeric helpers behind the analytics endpoints.

/// Trading days per year, for annualizing daily figures.
pub const TRADING_DAYS: f64 = 252.0;

/// Annualized volatility from daily closes (stdev of log returns × √252).
/// `None` with fewer than two returns or non-positive prices.
pub fn annualized_volatility(closes: &[f64]) -> Option<f64> {
    if closes.iter().any(|p| *p <= 0.0 || !p.is_finite()) {
        return None;
    }
    let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt() * TRADING_DAYS.sqrt())
}

/// Standard normal CDF (Abramowitz & Stegun 7.1.26, |error| < 1.5e-7).
pub fn norm_cdf(x: f64) -> f64 {
    let z = x / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + 0.327_591_1 * z.abs());
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    let erf = 1.0 - poly * (-z * z).exp();
    let erf = if z >= 0.0 { erf } else { -erf };
    0.5 * (1.0 + erf)
}

/// European option prices and deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionPrice {
    pub call: f64,
    pub put: f64,
    pub call_delta: f64,
    pub put_delta: f64,
}

/// Black-Scholes for a non-dividend stock. `years` and `vol` must be positive.
pub fn black_scholes(spot: f64, strike: f64, years: f64, rate: f64, vol: f64) -> OptionPrice {
    let sqrt_t = years.sqrt();
    let d1 = ((spot / strike).ln() + (rate + 0.5 * vol * vol) * years) / (vol * sqrt_t);
    let d2 = d1 - vol * sqrt_t;
    let discount = (-rate * years).exp();

    OptionPrice {
        call: spot * norm_cdf(d1) - strike * discount * norm_cdf(d2),
        put: strike * discount * norm_cdf(-d2) - spot * norm_cdf(-d1),
        call_delta: norm_cdf(d1),
        put_delta: norm_cdf(d1) - 1.0,
    }
}

/// Fitted line in price units: `price(day) = intercept + slope * day`, day 0 = first close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn at(&self, day: f64) -> f64 {
        self.intercept + self.slope * day
    }
}

/// Fit a line to `closes` by batch gradient descent for a fixed number of epochs.
///
/// Inputs are min-max scaled to [0, 1] on both axes before fitting, then the
/// coefficients are mapped back to price units per day.
pub fn fit_linear_trend(closes: &[f64], epochs: usize, learning_rate: f64) -> Option<LinearFit> {
    match closes.len() {
        0 => return None,
        1 => {
            return Some(LinearFit {
                slope: 0.0,
                intercept: closes[0],
            })
        }
        _ => {}
    }

    let min = closes.iter().copied().fold(f64::INFINITY, f64::min);
    let max = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= f64::EPSILON {
        return Some(LinearFit {
            slope: 0.0,
            intercept: min,
        });
    }

    let last = (closes.len() - 1) as f64;
    let points: Vec<(f64, f64)> = closes
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64 / last, (p - min) / range))
        .collect();
    let n = points.len() as f64;

    let (mut w, mut b) = (0.0, 0.0);
    for _ in 0..epochs {
        let (mut dw, mut db) = (0.0, 0.0);
        for (x, y) in &points {
            let err = w * x + b - y;
            dw += err * x;
            db += err;
        }
        w -= learning_rate * 2.0 * dw / n;
        b -= learning_rate * 2.0 * db / n;
    }

    Some(LinearFit {
        slope: w * range / last,
        intercept: min + b * range,
    })
}
