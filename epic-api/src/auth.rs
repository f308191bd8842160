//! Authentication Module
//!
//! Bearer token authentication for the EPIC API. Users exchange their
//! username and password for a signed JWT at `/api/v1/token-auth` and send it
//! back as `Authorization: Bearer <token>`.

use crate::error::{ApiError, ApiResult};
use epic_core::{EpicUser, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";
const MIN_PRODUCTION_SECRET_LEN: usize = 32;
/// Tokens are HMAC signed with the shared secret.
const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Source of "now" for issuing and checking tokens, in Unix seconds.
pub trait JwtClock: Send + Sync {
    fn now_epoch_secs(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock stopped at the given second.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

// ============================================================================
// SIGNING SECRET
// ============================================================================

/// Token signing secret. `Debug` prints only its length.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// Wrap a secret, falling back to the development default when blank.
    pub fn new(secret: String) -> Self {
        let normalized = if secret.trim().is_empty() {
            INSECURE_DEFAULT_SECRET.to_string()
        } else {
            secret
        };
        Self(SecretString::new(normalized.into()))
    }

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

/// Token settings.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: JwtSecret,
    /// Token lifetime, one day by default
    pub jwt_expiration_secs: i64,
    /// Seconds an expired token is still accepted
    pub jwt_clock_skew_secs: i64,
    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("jwt_clock_skew_secs", &self.jwt_clock_skew_secs)
            .field("clock", &"<JwtClock>")
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: JwtSecret::new(String::new()),
            jwt_expiration_secs: 86400,
            jwt_clock_skew_secs: 60,
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuthConfig {
    /// Read `EPIC_JWT_SECRET`, `EPIC_JWT_EXPIRATION_SECS` and
    /// `EPIC_JWT_CLOCK_SKEW_SECS`. Unset or unparsable values keep the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, default: i64| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };
        Self {
            jwt_secret: JwtSecret::new(std::env::var("EPIC_JWT_SECRET").unwrap_or_default()),
            jwt_expiration_secs: secs("EPIC_JWT_EXPIRATION_SECS", defaults.jwt_expiration_secs),
            jwt_clock_skew_secs: secs("EPIC_JWT_CLOCK_SKEW_SECS", defaults.jwt_clock_skew_secs),
            clock: defaults.clock,
        }
    }

    /// Use a fixed secret. Intended for tests and tooling.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: JwtSecret::new(secret.into()),
            ..Self::default()
        }
    }

    /// Refuse a default or short secret in production, warn about it elsewhere.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        let problem = if self.jwt_secret.is_insecure_default() {
            "EPIC_JWT_SECRET is not set".to_string()
        } else if self.jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN {
            format!(
                "EPIC_JWT_SECRET has {} characters, at least {} are required",
                self.jwt_secret.len(),
                MIN_PRODUCTION_SECRET_LEN
            )
        } else {
            return Ok(());
        };

        if crate::config::is_production_environment() {
            return Err(ApiError::invalid_input(format!("Refusing to start: {problem}")));
        }
        tracing::warn!(problem = %problem, "Weak token secret, fine for development only");
        Ok(())
    }
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

/// Token payload. `sub` is the user id; times are Unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user: &EpicUser, expiration_secs: i64, clock: &dyn JwtClock) -> Self {
        let now = clock.now_epoch_secs();
        Self {
            sub: user.id.to_string(),
            username: user.username.clone(),
            iat: now,
            exp: now + expiration_secs,
        }
    }

    /// The user id carried in `sub`.
    pub fn user_id(&self) -> ApiResult<UserId> {
        Uuid::parse_str(&self.sub).map_err(|_| ApiError::invalid_token("Token subject is not a user id"))
    }
}

// ============================================================================
// TOKEN VALIDATION
// ============================================================================

/// Verify the signature of `token` and check its expiry against the
/// configured clock.
pub fn validate_jwt_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let mut validation = Validation::new(JWT_ALGORITHM);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = std::collections::HashSet::from(["exp".to_string()]);

    let claims = decode::<Claims>(token, &decoding_key, &validation)?.claims;

    let now = config.clock.now_epoch_secs();
    if now < 0 {
        tracing::error!(timestamp = now, "System clock returned pre-epoch time");
        return Err(ApiError::internal_error("Server time configuration error"));
    }

    if claims.exp < now - config.jwt_clock_skew_secs {
        return Err(ApiError::token_expired());
    }
    Ok(claims)
}

/// Issue a token for `user`.
pub fn generate_jwt_token(config: &AuthConfig, user: &EpicUser) -> ApiResult<String> {
    let claims = Claims::new(user, config.jwt_expiration_secs, &*config.clock);
    let encoding_key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    encode(&Header::new(JWT_ALGORITHM), &claims, &encoding_key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

/// Pull the token out of an `Authorization: Bearer` header value.
pub fn bearer_token(header_value: &str) -> ApiResult<&str> {
    header_value
        .strip_prefix("Bearer ")
        .or_else(|| header_value.strip_prefix("Token "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::invalid_token("Authorization header must use Bearer scheme"))
}
