//! JWT token service implementation.

use chrono::{TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quill_core::ports::{AuthError, TokenClaims, TokenKind, TokenService, TokenSubject};
use quill_core::services::RotationPolicy;

const DEFAULT_SECRET: &str = "change-me-in-production";

/// JWT token service configuration.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub access_expiration_minutes: i64,
    pub refresh_expiration_hours: i64,
    pub rotation: RotationPolicy,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_SECRET.to_string(),
            issuer: "quill-api".to_string(),
            access_expiration_minutes: 15,
            refresh_expiration_hours: 24,
            rotation: RotationPolicy::default(),
        }
    }
}

impl JwtConfig {
    /// Load configuration from environment variables, falling back to
    /// [`JwtConfig::default`] for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| DEFAULT_SECRET.to_string());

        // Warn if using default secret in production
        if secret == DEFAULT_SECRET {
            let is_production = std::env::var("RUST_ENV")
                .map(|v| v == "production" || v == "prod")
                .unwrap_or(false);

            if is_production {
                tracing::error!(
                    "SECURITY: Using default JWT secret in production! Set JWT_SECRET environment variable."
                );
            } else {
                tracing::warn!("Using default JWT secret. Set JWT_SECRET for production use.");
            }
        }

        Self {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or(defaults.issuer),
            access_expiration_minutes: env_number("JWT_ACCESS_EXPIRATION_MINUTES")
                .unwrap_or(defaults.access_expiration_minutes),
            refresh_expiration_hours: env_number("JWT_REFRESH_EXPIRATION_HOURS")
                .unwrap_or(defaults.refresh_expiration_hours),
            rotation: RotationPolicy {
                rotate_refresh_tokens: env_flag(
                    "JWT_ROTATE_REFRESH_TOKENS",
                    defaults.rotation.rotate_refresh_tokens,
                ),
                blacklist_after_rotation: env_flag(
                    "JWT_BLACKLIST_AFTER_ROTATION",
                    defaults.rotation.blacklist_after_rotation,
                ),
            },
        }
    }

    fn lifetime(&self, kind: TokenKind) -> TimeDelta {
        match kind {
            TokenKind::Access => TimeDelta::minutes(self.access_expiration_minutes),
            TokenKind::Refresh => TimeDelta::hours(self.refresh_expiration_hours),
        }
    }
}

fn env_number(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v != "false" && v != "0")
        .unwrap_or(default)
}

/// Internal JWT claims structure for serialization.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // user_id
    username: String,
    email: String,
    token_type: TokenKind,
    jti: String,
    exp: i64,    // expiration timestamp
    iat: i64,    // issued at
    iss: String, // issuer
}

/// JWT-based token service (HS256).
pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    config: JwtConfig,
}

impl JwtTokenService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            encoding_key,
            decoding_key,
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(JwtConfig::from_env())
    }
}

impl TokenService for JwtTokenService {
    fn generate_token(
        &self,
        kind: TokenKind,
        subject: &TokenSubject,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + self.config.lifetime(kind);

        let claims = Claims {
            sub: subject.user_id.to_string(),
            username: subject.username.clone(),
            email: subject.email.clone(),
            token_type: kind,
            jti: Uuid::new_v4().to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.config.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    fn validate_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        let claims = token_data.claims;
        let user_id =
            Uuid::parse_str(&claims.sub).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let jti =
            Uuid::parse_str(&claims.jti).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(TokenClaims {
            user_id,
            username: claims.username,
            email: claims.email,
            kind: claims.token_type,
            jti,
            exp: claims.exp,
        })
    }

    fn expiration_seconds(&self, kind: TokenKind) -> i64 {
        self.config.lifetime(kind).num_seconds()
    }
}
