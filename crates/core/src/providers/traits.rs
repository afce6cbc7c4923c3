use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::quote::ProviderQuote;

/// Abstraction over every market data source.
///
/// Each provider (Alpha Vantage, Yahoo Finance, test doubles) implements this
/// trait; the quote service only ever talks to `dyn QuoteProvider`.
/// Transport and parse failures are `Err`; a well-formed answer without usable
/// data is `Ok(ProviderQuote::Empty)`.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider (for logs and status).
    fn name(&self) -> &str;

    /// Metered calls consumed by one `fetch_quote`.
    fn cost(&self) -> u32 {
        1
    }

    /// Fetch the latest quote and recent daily history for an uppercase symbol.
    async fn fetch_quote(&self, symbol: &str) -> Result<ProviderQuote, CoreError>;
}
