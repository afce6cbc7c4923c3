use std::sync::Arc;

use env_logger::Builder;
use log::{error, info, LevelFilter};
use trading_pit_core::clock::SystemClock;
use trading_pit_core::providers::{mock::MockQuoteProvider, registry::ProviderRegistry};
use trading_pit_core::TradingDesk;
use trading_pit_server::config::ServerConfig;
use trading_pit_server::persistence::{load_store, save_if_dirty};
use trading_pit_server::routes;

#[tokio::main]
async fn main() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let store = match load_store(config.snapshot_path.as_deref(), &config.snapshot_secret).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to load snapshot: {e}");
            std::process::exit(1);
        }
    };

    let desk = Arc::new(TradingDesk::with_parts(
        store.clone(),
        ProviderRegistry::new_with_defaults(&config.settings),
        MockQuoteProvider::new(),
        Arc::new(SystemClock),
        config.settings.clone(),
    ));
    let providers: Vec<String> = desk.quotes().status().providers.into_iter().map(|p| p.name).collect();
    info!("Quote providers: {}", providers.join(", "));

    if let Some(path) = config.snapshot_path.clone() {
        let store = store.clone();
        let secret = config.snapshot_secret.clone();
        let every = config.snapshot_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // Failures are logged inside and retried next tick.
                let _ = save_if_dirty(&store, &path, &secret).await;
            }
        });
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    };
    let bound = warp::serve(routes(desk)).try_bind_with_graceful_shutdown(config.addr, shutdown);
    let (addr, server) = match bound {
        Ok(bound) => bound,
        Err(e) => {
            error!("Failed to bind {}: {e}", config.addr);
            std::process::exit(1);
        }
    };

    info!("Trading Pit running on http://{addr}");
    server.await;
    info!("Shutting down");

    if let Some(path) = &config.snapshot_path {
        if let Err(e) = save_if_dirty(&store, path, &config.snapshot_secret).await {
            error!("Final snapshot save failed: {e}");
        }
    }
}
