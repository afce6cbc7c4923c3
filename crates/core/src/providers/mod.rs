pub mod registry;
pub mod traits;

// Quote provider implementations
pub mod alphavantage;
pub mod mock;
pub mod yahoo_finance;
