use std::path::Path;

use super::encryption::{self, KdfParams};
use super::format;
use super::store::StoreState;
use crate::errors::CoreError;

/// Save and load encrypted store snapshots.
///
/// Flow: StoreState → bincode → AES-256-GCM(Argon2id(secret, salt)) → TPIT bytes
pub struct SnapshotManager;

impl SnapshotManager {
    pub fn save_to_bytes(state: &StoreState, secret: &str) -> Result<Vec<u8>, CoreError> {
        Self::save_with_params(state, secret, KdfParams::default())
    }

    /// Same as `save_to_bytes` with explicit KDF costs.
    pub fn save_with_params(
        state: &StoreState,
        secret: &str,
        kdf_params: KdfParams,
    ) -> Result<Vec<u8>, CoreError> {
        let plaintext = bincode::serialize(state)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize store: {e}")))?;

        let salt = encryption::random_bytes::<16>()?;
        let nonce = encryption::random_bytes::<12>()?;
        let key = encryption::derive_key(secret, &salt, &kdf_params)?;
        let ciphertext = encryption::encrypt(&plaintext, &key, &nonce)?;

        Ok(format::write_snapshot(
            format::CURRENT_VERSION,
            &kdf_params,
            &salt,
            &nonce,
            &ciphertext,
        ))
    }

    pub fn load_from_bytes(data: &[u8], secret: &str) -> Result<StoreState, CoreError> {
        let (header, ciphertext) = format::read_snapshot(data)?;
        let key = encryption::derive_key(secret, &header.salt, &header.kdf_params)?;
        let plaintext = encryption::decrypt(ciphertext, &key, &header.nonce)?;
        bincode::deserialize(&plaintext)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize store: {e}")))
    }

    /// Write atomically: encrypt to a sibling temp file, then rename over the target.
    pub fn save_to_file(state: &StoreState, path: &Path, secret: &str) -> Result<(), CoreError> {
        let bytes = Self::save_to_bytes(state, secret)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path, secret: &str) -> Result<StoreState, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes, secret)
    }
}
