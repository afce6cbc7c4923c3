pub mod analytics_service;
pub mod auth_service;
pub mod order_service;
pub mod portfolio_service;
pub mod quant;
pub mod quote_service;
pub mod rate_limit;
