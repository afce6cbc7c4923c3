use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::settings::Settings;
use crate::models::user::{AuthSession, LoginRequest, SignupRequest, User, UserProfile};
use crate::storage::encryption::random_bytes;
use crate::storage::store::TradingStore;

const MIN_PASSWORD_LEN: usize = 6;
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
/// Fixed salt and digest for the stand-in hash checked when a login names no account.
const DUMMY_SALT_B64: &str = "c29tZXNhbHRzb21lc2FsdA";
const DUMMY_DIGEST_B64: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Session token payload.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    iat: i64,
    exp: i64,
}

/// Account creation, password login and bearer token handling.
pub struct AuthService {
    store: Arc<TradingStore>,
    jwt_secret: String,
    token_ttl: Duration,
    starting_balance: f64,
    password_params: Params,
}

impl AuthService {
    pub fn new(store: Arc<TradingStore>, settings: &Settings) -> Self {
        Self {
            store,
            jwt_secret: settings.jwt_secret.clone(),
            token_ttl: settings
                .token_ttl()
                .unwrap_or_else(|| Duration::hours(DEFAULT_TOKEN_TTL_HOURS)),
            starting_balance: settings.starting_balance,
            password_params: Params::default(),
        }
    }

    /// Override the Argon2 cost used for new password hashes.
    pub fn with_password_params(mut self, params: Params) -> Self {
        self.password_params = params;
        self
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<AuthSession, CoreError> {
        let username = request.username.trim();
        let name = request.name.trim();
        let email = request.email.trim().to_lowercase();

        if username.is_empty() {
            return Err(CoreError::ValidationError("Username is required".into()));
        }
        if name.is_empty() {
            return Err(CoreError::ValidationError("Name is required".into()));
        }
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(CoreError::ValidationError(format!("Invalid email '{email}'")));
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::ValidationError(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            name: name.to_string(),
            email,
            password_hash: self.hash_password(&request.password).await?,
            balance: self.starting_balance,
            created_at: Utc::now(),
        };
        self.store.insert_user(user.clone()).await?;
        info!("Registered user {} ({})", user.username, user.id);

        Ok(AuthSession {
            token: self.issue_token(&user)?,
            user: user.profile(),
        })
    }

    /// Log in by username or email. Every failure is the same `Unauthorized`.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthSession, CoreError> {
        let invalid = || CoreError::Unauthorized("Invalid credentials".into());
        let user = self.store.find_user_by_login(&request.username).await;
        let stored_hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.dummy_hash(),
        };
        let verified = verify_password(request.password.clone(), stored_hash).await?;
        let user = match user {
            Some(user) if verified => user,
            _ => return Err(invalid()),
        };
        Ok(AuthSession {
            token: self.issue_token(&user)?,
            user: user.profile(),
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, CoreError> {
        self.store
            .user(user_id)
            .await
            .map(|u| u.profile())
            .ok_or_else(|| CoreError::NotFound(format!("User {user_id}")))
    }

    pub fn issue_token(&self, user: &User) -> Result<String, CoreError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(self.token_ttl)
                .ok_or_else(|| CoreError::Encryption("Token expiry out of range".into()))?
                .timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| CoreError::Encryption(format!("Failed to sign token: {e}")))
    }

    /// Check signature and expiry; return the user id the token was issued for.
    pub fn verify_token(&self, token: &str) -> Result<Uuid, CoreError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;
        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| CoreError::Unauthorized("Invalid token subject".into()))
    }

    /// Argon2id hashing runs on the blocking pool.
    async fn hash_password(&self, password: &str) -> Result<String, CoreError> {
        let params = self.password_params.clone();
        let password = password.to_string();
        task::spawn_blocking(move || {
            let salt = SaltString::encode_b64(&random_bytes::<16>()?)
                .map_err(|e| CoreError::PasswordHash(e.to_string()))?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| CoreError::PasswordHash(e.to_string()))
        })
        .await
        .map_err(|e| CoreError::PasswordHash(format!("Hashing task failed: {e}")))?
    }

    /// A well-formed PHC string at the configured cost that no password matches.
    fn dummy_hash(&self) -> String {
        let p = &self.password_params;
        format!(
            "$argon2id$v=19$m={},t={},p={}${DUMMY_SALT_B64}${DUMMY_DIGEST_B64}",
            p.m_cost(),
            p.t_cost(),
            p.p_cost()
        )
    }
}

/// Parameters are read from the PHC string, so hashes made with other costs still verify.
async fn verify_password(password: String, hash: String) -> Result<bool, CoreError> {
    task::spawn_blocking(move || {
        PasswordHash::new(&hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    })
    .await
    .map_err(|e| CoreError::PasswordHash(format!("Verification task failed: {e}")))
}
