pub mod encryption;
pub mod format;
pub mod snapshot;
pub mod store;
