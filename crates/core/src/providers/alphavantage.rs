use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::traits::QuoteProvider;
use crate::errors::CoreError;
use crate::models::quote::{PricePoint, ProviderQuote, RawQuote};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

/// Daily closes kept from the compact series.
const HISTORY_DAYS: usize = 30;

/// Alpha Vantage API provider.
///
/// - **Free tier**: 25 requests/day across all endpoints, so it is registered
///   as a metered tier.
/// - **Requires**: API key (settings key "alphavantage").
/// - One quote costs two calls: GLOBAL_QUOTE plus TIME_SERIES_DAILY.
///
/// When the daily limit is hit the API still answers 200 with a "Note" or
/// "Information" message instead of data; that maps to `ProviderQuote::Empty`.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Point the provider at a different host (used against local stubs).
    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            base_url: base_url.into(),
        }
    }
}

// ── Alpha Vantage API response types ────────────────────────────────

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

#[derive(Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyData>>,
}

#[derive(Deserialize)]
struct DailyData {
    #[serde(rename = "4. close")]
    close: String,
}

impl GlobalQuoteResponse {
    /// The throttling/complaint message, if the API sent one instead of data.
    fn notice(&self) -> Option<&str> {
        self.note
            .as_deref()
            .or(self.information.as_deref())
            .or(self.error_message.as_deref())
    }
}

/// Parse "1.2345%" into 1.2345.
fn parse_percent(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches('%').parse().ok()
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn cost(&self) -> u32 {
        2
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<ProviderQuote, CoreError> {
        let resp: GlobalQuoteResponse = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to parse quote for {symbol}: {e}"),
            })?;

        if let Some(notice) = resp.notice() {
            return Ok(ProviderQuote::Empty {
                reason: notice.to_string(),
            });
        }

        let Some(quote) = resp.global_quote else {
            return Ok(ProviderQuote::Empty {
                reason: format!("No quote data for {symbol}"),
            });
        };

        let Some(price) = quote.price.as_deref().and_then(|p| p.parse::<f64>().ok()) else {
            // An unknown ticker comes back as an empty "Global Quote" object.
            return Ok(ProviderQuote::Empty {
                reason: format!("No price for {symbol}"),
            });
        };

        let volume = quote
            .volume
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let percent_change = quote
            .change_percent
            .as_deref()
            .and_then(parse_percent)
            .unwrap_or(0.0);

        let historical_prices = self.fetch_daily_series(symbol).await?;

        Ok(ProviderQuote::Found(RawQuote {
            price,
            volume,
            percent_change,
            historical_prices,
        }))
    }
}

impl AlphaVantageProvider {
    /// Fetch the compact daily series and keep the most recent closes, oldest first.
    async fn fetch_daily_series(&self, symbol: &str) -> Result<Vec<PricePoint>, CoreError> {
        let resp: TimeSeriesResponse = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", "compact"),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to parse time series for {symbol}: {e}"),
            })?;

        let Some(series) = resp.time_series else {
            return Ok(Vec::new());
        };

        let mut points: Vec<PricePoint> = series
            .iter()
            .filter_map(|(date_str, data)| {
                let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
                let price = data.close.parse().ok()?;
                Some(PricePoint { date, price })
            })
            .collect();

        points.sort_by_key(|p| p.date);
        if points.len() > HISTORY_DAYS {
            points.drain(..points.len() - HISTORY_DAYS);
        }
        Ok(points)
    }
}
