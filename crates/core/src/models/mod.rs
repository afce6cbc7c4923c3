pub mod analytics;
pub mod holding;
pub mod order;
pub mod quote;
pub mod settings;
pub mod user;
