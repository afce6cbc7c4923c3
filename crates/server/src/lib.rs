pub mod api;
pub mod config;
pub mod error;
pub mod handlers;
pub mod persistence;

pub use api::routes;
