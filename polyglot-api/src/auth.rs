//! Authentication Module
//!
//! Two authentication methods are accepted on protected routes:
//! 1. JWT bearer tokens issued by `POST /login` (Authorization: Bearer header)
//! 2. Static API keys configured at startup (X-API-Key header)
//!
//! Logout revokes the presented token by its `jti` until it would have
//! expired anyway. Passwords are stored as a salted PBKDF2-HMAC-SHA256 key and
//! compared in constant time.

use crate::error::{ApiError, ApiResult};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use polyglot_core::{ConfigError, PolyglotError, UserCredentials};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashSet;
use std::sync::Arc;

const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Clock abstraction for JWT time validation.
///
/// Time checks are done here rather than inside `jsonwebtoken` so tests can
/// pin the clock.
pub trait JwtClock: Send + Sync {
    /// Current time as Unix epoch seconds.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

/// Test clock helpers for common scenarios.
#[cfg(test)]
pub mod test_clocks {
    use super::FixedClock;

    /// 2024-01-01 00:00:00 UTC
    pub fn valid() -> FixedClock {
        FixedClock(1704067200)
    }

    /// 2030-01-01 00:00:00 UTC
    pub fn future() -> FixedClock {
        FixedClock(1893456000)
    }
}

// ============================================================================
// JWT SECRET (TYPE-SAFE)
// ============================================================================

/// JWT signing secret that never shows up in logs.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// Create a new JWT secret. Empty secrets are rejected.
    pub fn new(secret: String) -> Result<Self, PolyglotError> {
        if secret.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "jwt_secret".to_string(),
            }
            .into());
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value for signing and verification only.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_SECRET
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Valid static API keys.
    pub api_keys: HashSet<String>,

    /// JWT secret key for signing and verification
    pub jwt_secret: JwtSecret,

    /// JWT algorithm (default: HS256)
    pub jwt_algorithm: Algorithm,

    /// JWT token lifetime in seconds (default: 1 hour)
    pub jwt_expiration_secs: i64,

    /// Tolerated clock skew in seconds (default: 60)
    pub jwt_clock_skew_secs: i64,

    /// Clock for JWT time validation (injected for testing)
    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_keys", &format!("[{} keys]", self.api_keys.len()))
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("jwt_clock_skew_secs", &self.jwt_clock_skew_secs)
            .field("clock", &"<JwtClock>")
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        let secret_str = std::env::var("POLYGLOT_JWT_SECRET")
            .unwrap_or_else(|_| INSECURE_DEFAULT_SECRET.to_string());

        Self {
            api_keys: HashSet::new(),
            jwt_secret: build_jwt_secret(secret_str),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: 3600,
            jwt_clock_skew_secs: 60,
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuthConfig {
    /// Create authentication configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `POLYGLOT_API_KEYS`: Comma-separated list of valid API keys
    /// - `POLYGLOT_JWT_SECRET`: JWT signing secret
    /// - `POLYGLOT_JWT_EXPIRATION_SECS`: JWT token lifetime (default: 3600)
    /// - `POLYGLOT_JWT_CLOCK_SKEW_SECS`: JWT clock skew tolerance (default: 60)
    pub fn from_env() -> Self {
        let mut api_keys = HashSet::new();
        if let Ok(keys_str) = std::env::var("POLYGLOT_API_KEYS") {
            for key in keys_str.split(',') {
                let trimmed = key.trim();
                if !trimmed.is_empty() {
                    api_keys.insert(trimmed.to_string());
                }
            }
        }

        let secret_str = std::env::var("POLYGLOT_JWT_SECRET")
            .unwrap_or_else(|_| INSECURE_DEFAULT_SECRET.to_string());

        Self {
            api_keys,
            jwt_secret: build_jwt_secret(secret_str),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: std::env::var("POLYGLOT_JWT_EXPIRATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            jwt_clock_skew_secs: std::env::var("POLYGLOT_JWT_CLOCK_SKEW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            clock: Arc::new(SystemClock),
        }
    }

    /// Refuse insecure secrets when `POLYGLOT_ENVIRONMENT` is production.
    ///
    /// Outside production the same problems are only logged.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        let environment = std::env::var("POLYGLOT_ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase();
        let is_production = environment == "production" || environment == "prod";

        if self.jwt_secret.is_insecure_default() {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "Cannot start server in production with insecure JWT secret. \
                     Set POLYGLOT_JWT_SECRET to a secure value. \
                     POLYGLOT_ENVIRONMENT={}",
                    environment
                )));
            }
            tracing::warn!(
                "Using insecure default JWT secret. Set POLYGLOT_JWT_SECRET \
                 to a random value of at least 32 characters before deploying."
            );
        } else if self.jwt_secret.len() < 32 {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "JWT secret is too short for production use ({} chars). \
                     It must be at least 32 characters long.",
                    self.jwt_secret.len()
                )));
            }
            tracing::warn!(
                chars = self.jwt_secret.len(),
                "JWT secret is short; use at least 32 characters in production"
            );
        }

        Ok(())
    }

    pub fn add_api_key(&mut self, key: String) {
        self.api_keys.insert(key);
    }

    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.api_keys.contains(key)
    }
}

fn build_jwt_secret(secret_str: String) -> JwtSecret {
    let normalized = if secret_str.trim().is_empty() {
        INSECURE_DEFAULT_SECRET.to_string()
    } else {
        secret_str
    };

    match JwtSecret::new(normalized) {
        Ok(secret) => secret,
        Err(_) => JwtSecret(SecretString::new(INSECURE_DEFAULT_SECRET.to_string().into())),
    }
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Token id, used for revocation
    pub jti: String,
}

impl Claims {
    /// Create new claims for a user using a clock.
    pub fn new(user_id: String, expiration_secs: i64, clock: &dyn JwtClock) -> Self {
        let now = clock.now_epoch_secs();

        Self {
            sub: user_id,
            iat: now,
            exp: now + expiration_secs,
            jti: hex::encode(rand::random::<[u8; 16]>()),
        }
    }

    pub fn is_expired(&self, clock: &dyn JwtClock) -> bool {
        self.exp < clock.now_epoch_secs()
    }
}

// ============================================================================
// REVOCATION
// ============================================================================

/// Revoked token ids, each kept until the token's own expiry.
#[derive(Debug, Default)]
pub struct RevocationList {
    revoked: DashMap<String, i64>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke `jti` until `expires_at`.
    pub fn revoke(&self, jti: impl Into<String>, expires_at: i64) {
        self.revoked.insert(jti.into(), expires_at);
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.revoked.contains_key(jti)
    }

    /// Drop entries whose tokens have expired. Returns how many were dropped.
    pub fn purge_expired(&self, now: i64) -> usize {
        let before = self.revoked.len();
        self.revoked.retain(|_, expires_at| *expires_at >= now);
        before - self.revoked.len()
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}

// ============================================================================
// AUTHENTICATION CONTEXT
// ============================================================================

/// Authentication method used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey,
    Jwt,
}

/// Authentication context injected into request extensions.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (JWT `sub`, or an API key label)
    pub user_id: String,

    /// Token id and expiry, present for JWT authentication
    pub token: Option<(String, i64)>,

    pub auth_method: AuthMethod,
}

impl AuthContext {
    pub fn api_key(user_id: String) -> Self {
        Self {
            user_id,
            token: None,
            auth_method: AuthMethod::ApiKey,
        }
    }

    pub fn jwt(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            token: Some((claims.jti, claims.exp)),
            auth_method: AuthMethod::Jwt,
        }
    }
}

// ============================================================================
// AUTHENTICATION FUNCTIONS
// ============================================================================

pub fn validate_api_key(config: &AuthConfig, api_key: &str) -> ApiResult<()> {
    if config.is_valid_api_key(api_key) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("Invalid API key"))
    }
}

fn validate_claim_times(now: i64, exp: i64, leeway_secs: i64) -> ApiResult<()> {
    if exp < now - leeway_secs {
        return Err(ApiError::token_expired());
    }
    Ok(())
}

/// Validate a JWT token and extract claims.
///
/// Signature validation is done by `jsonwebtoken`; expiry is checked against
/// the configured clock.
pub fn validate_jwt_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = HashSet::from(["exp".to_string()]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            _ => ApiError::invalid_token("Token is invalid"),
        })?;

    let claims = token_data.claims;
    let now = config.clock.now_epoch_secs();

    if now < 0 {
        tracing::error!(
            timestamp = now,
            "System clock returned pre-epoch time - server time is broken"
        );
        return Err(ApiError::internal_error(
            "Server time configuration error - please contact support",
        ));
    }

    validate_claim_times(now, claims.exp, config.jwt_clock_skew_secs)?;

    Ok(claims)
}

/// Generate a JWT token for a user. Returns the encoded token and its claims.
pub fn generate_jwt_token(config: &AuthConfig, user_id: String) -> ApiResult<(String, Claims)> {
    let claims = Claims::new(user_id, config.jwt_expiration_secs, &*config.clock);

    let encoding_key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    let header = Header::new(config.jwt_algorithm);

    let token = encode(&header, &claims, &encoding_key).map_err(|e| {
        tracing::error!(error = %e, "Failed to sign token");
        ApiError::internal_error("Failed to generate token")
    })?;
    Ok((token, claims))
}

/// Authenticate a request using either an API key or a bearer token.
pub fn authenticate(
    config: &AuthConfig,
    revocations: &RevocationList,
    api_key_header: Option<&str>,
    auth_header: Option<&str>,
) -> ApiResult<AuthContext> {
    if let Some(api_key) = api_key_header {
        validate_api_key(config, api_key)?;
        let label = format!("api_key_{}", api_key.chars().take(8).collect::<String>());
        return Ok(AuthContext::api_key(label));
    }

    if let Some(auth_value) = auth_header {
        let token = auth_value.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::invalid_token("Authorization header must use Bearer scheme")
        })?;
        let claims = validate_jwt_token(config, token)?;
        if revocations.is_revoked(&claims.jti) {
            return Err(ApiError::invalid_token("Token has been revoked"));
        }
        return Ok(AuthContext::jwt(claims));
    }

    Err(ApiError::unauthorized(
        "Authentication required: provide X-API-Key or Authorization header",
    ))
}

// ============================================================================
// PASSWORDS
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

/// PBKDF2 rounds applied to every stored password.
pub const PASSWORD_ITERATIONS: u32 = 100_000;

/// Digest length of one PBKDF2-HMAC-SHA256 block.
const PASSWORD_KEY_LEN: usize = 32;

/// PBKDF2-HMAC-SHA256 (RFC 8018) with a single output block.
fn derive_password_key(salt: &str, password: &str, rounds: u32) -> Option<[u8; PASSWORD_KEY_LEN]> {
    let prf = HmacSha256::new_from_slice(password.as_bytes()).ok()?;

    let mut first = prf.clone();
    first.update(salt.as_bytes());
    first.update(&1u32.to_be_bytes());
    let mut block = [0u8; PASSWORD_KEY_LEN];
    block.copy_from_slice(&first.finalize().into_bytes());

    let mut derived = block;
    for _ in 1..rounds {
        let mut round = prf.clone();
        round.update(&block);
        block.copy_from_slice(&round.finalize().into_bytes());
        derived
            .iter_mut()
            .zip(block.iter())
            .for_each(|(out, byte)| *out ^= byte);
    }
    Some(derived)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Fresh random salt, hex encoded.
pub fn generate_salt() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Hex encoded PBKDF2-HMAC-SHA256 key of `password` under `salt`, stretched
/// over [`PASSWORD_ITERATIONS`] rounds.
pub fn hash_password(salt: &str, password: &str) -> ApiResult<String> {
    let key = derive_password_key(salt, password, PASSWORD_ITERATIONS)
        .ok_or_else(|| ApiError::internal_error("Failed to initialize password digest"))?;
    Ok(hex::encode(key))
}

/// Check a password against stored credentials in constant time.
pub fn verify_password(credentials: &UserCredentials, password: &str) -> bool {
    let Ok(expected) = hex::decode(&credentials.password_hash) else {
        return false;
    };
    derive_password_key(&credentials.password_salt, password, PASSWORD_ITERATIONS)
        .is_some_and(|key| constant_time_eq(&key, &expected))
}
