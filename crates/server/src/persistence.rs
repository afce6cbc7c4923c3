use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use trading_pit_core::errors::CoreError;
use trading_pit_core::storage::snapshot::SnapshotManager;
use trading_pit_core::storage::store::TradingStore;

/// Restore the store from `path`, or start empty if the file does not exist yet.
pub async fn load_store(path: Option<&Path>, secret: &str) -> Result<TradingStore, CoreError> {
    let Some(path) = path else {
        return Ok(TradingStore::new());
    };
    if !path.exists() {
        info!("No snapshot at {}, starting with an empty book", path.display());
        return Ok(TradingStore::new());
    }

    let (path_buf, secret) = (path.to_path_buf(), secret.to_string());
    let state = tokio::task::spawn_blocking(move || {
        SnapshotManager::load_from_file(&path_buf, &secret)
    })
    .await
    .map_err(|e| CoreError::FileIO(format!("Snapshot load task failed: {e}")))??;
    info!(
        "Loaded snapshot from {}: {} users, {} orders",
        path.display(),
        state.users.len(),
        state.orders.len()
    );
    Ok(TradingStore::from_state(state))
}

/// Write a snapshot if anything changed since the last one. Returns whether a save happened.
///
/// Encryption and file IO run on the blocking pool. On failure the store is
/// marked dirty again so the next attempt retries.
pub async fn save_if_dirty(
    store: &Arc<TradingStore>,
    path: &Path,
    secret: &str,
) -> Result<bool, CoreError> {
    if !store.is_dirty() {
        return Ok(false);
    }
    let state = store.snapshot().await;
    let (path_buf, secret): (PathBuf, String) = (path.to_path_buf(), secret.to_string());
    let result = tokio::task::spawn_blocking(move || {
        SnapshotManager::save_to_file(&state, &path_buf, &secret)
    })
    .await
    .map_err(|e| CoreError::FileIO(format!("Snapshot save task failed: {e}")))
    .and_then(|r| r);

    match result {
        Ok(()) => {
            info!("Saved snapshot to {}", path.display());
            Ok(true)
        }
        Err(e) => {
            warn!("Snapshot save to {} failed: {e}", path.display());
            store.mark_dirty();
            Err(e)
        }
    }
}
