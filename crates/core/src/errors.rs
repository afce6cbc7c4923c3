use thiserror::Error;

/// Unified error type for the trading-pit-core library.
/// Every fallible public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Snapshot / File ─────────────────────────────────────────────
    #[error("Invalid snapshot format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u16),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: wrong secret or corrupted snapshot")]
    Decryption,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),

    // ── Quote providers / Network ───────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No quote available for {0}")]
    QuoteUnavailable(String),

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Insufficient funds: order costs {required:.2} but balance is {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("Insufficient holdings: cannot sell {requested} {symbol}, only {held} held")]
    InsufficientHoldings {
        symbol: String,
        requested: u64,
        held: u64,
    },

    // ── Auth ────────────────────────────────────────────────────────
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl CoreError {
    /// Errors caused by the caller's input. Everything else is an internal
    /// failure whose message should not reach a client.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::ValidationError(_)
                | CoreError::NotFound(_)
                | CoreError::Conflict(_)
                | CoreError::InsufficientFunds { .. }
                | CoreError::InsufficientHoldings { .. }
                | CoreError::QuoteUnavailable(_)
                | CoreError::Unauthorized(_)
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors carry the full URL, which includes the API key.
        let msg = e.to_string();
        let sanitized = match msg.find('?') {
            Some(idx) => format!("{}?<query redacted>", &msg[..idx]),
            None => msg,
        };
        CoreError::Network(sanitized)
    }
}

impl From<aes_gcm::Error> for CoreError {
    fn from(_: aes_gcm::Error) -> Self {
        CoreError::Decryption
    }
}

impl From<jsonwebtoken::errors::Error> for CoreError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match e.kind() {
            ErrorKind::ExpiredSignature => CoreError::Unauthorized("Token expired".into()),
            _ => CoreError::Unauthorized("Invalid token".into()),
        }
    }
}
