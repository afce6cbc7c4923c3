use async_trait::async_trait;

use super::traits::QuoteProvider;
use crate::errors::CoreError;
use crate::models::quote::{PricePoint, ProviderQuote, RawQuote};

const PROVIDER: &str = "Yahoo Finance";

/// Yahoo Finance provider.
///
/// - **Free**: No API key required, no published daily cap, so it is
///   registered unmetered.
/// - One call fetches a month of daily bars; the last bar is the quote and the
///   one before it is the previous close.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to create connector: {e}"),
        })?;
        Ok(Self { connector })
    }

    /// Convert a unix timestamp (seconds) to a calendar date.
    fn timestamp_to_naive_date(ts: i64) -> Option<chrono::NaiveDate> {
        chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<ProviderQuote, CoreError> {
        let resp = self
            .connector
            .get_quote_range(symbol, "1d", "1mo")
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to fetch quotes for {symbol}: {e}"),
            })?;

        let bars = resp.quotes().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse quotes for {symbol}: {e}"),
        })?;

        let Some(last) = bars.last() else {
            return Ok(ProviderQuote::Empty {
                reason: format!("No bars returned for {symbol}"),
            });
        };

        let percent_change = match bars.len().checked_sub(2).map(|i| &bars[i]) {
            Some(prev) if prev.close > 0.0 => (last.close - prev.close) / prev.close * 100.0,
            _ => 0.0,
        };

        let historical_prices = bars
            .iter()
            .filter_map(|bar| {
                let date = Self::timestamp_to_naive_date(bar.timestamp as i64)?;
                Some(PricePoint {
                    date,
                    price: bar.close,
                })
            })
            .collect();

        Ok(ProviderQuote::Found(RawQuote {
            price: last.close,
            volume: last.volume as u64,
            percent_change,
            historical_prices,
        }))
    }
}
