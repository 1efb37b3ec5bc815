//! Authentication ports: token signing, password hashing and revocation.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::User;
use crate::error::RepoError;

/// Kind of bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived token presented on protected requests.
    Access,
    /// Long-lived token exchanged for new access tokens.
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// The identity a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&User> for TokenSubject {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// Claims decoded from a valid token.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub kind: TokenKind,
    /// Unique token identifier, the key used for blacklisting.
    pub jti: Uuid,
    pub exp: i64,
}

impl TokenClaims {
    pub fn subject(&self) -> TokenSubject {
        TokenSubject {
            user_id: self.user_id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// Token service trait for JWT operations.
pub trait TokenService: Send + Sync {
    /// Issue a signed token of the given kind for a subject.
    fn generate_token(&self, kind: TokenKind, subject: &TokenSubject)
    -> Result<String, AuthError>;

    /// Validate signature, issuer and expiry, then decode the claims.
    ///
    /// Revocation is not checked here; see [`TokenBlacklist`].
    fn validate_token(&self, token: &str) -> Result<TokenClaims, AuthError>;

    /// Lifetime of tokens of the given kind, in seconds.
    fn expiration_seconds(&self, kind: TokenKind) -> i64;
}

/// Password hashing service.
pub trait PasswordService: Send + Sync {
    /// Hash a plain text password.
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// Verify a password against a hash.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;
}

/// Persistent list of revoked token identifiers.
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Record a token as revoked. Revoking twice is a no-op.
    async fn revoke(
        &self,
        jti: Uuid,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepoError>;

    /// Whether the token identifier has been revoked.
    async fn is_revoked(&self, jti: Uuid) -> Result<bool, RepoError>;

    /// Drop entries for tokens that expired before `before`. Returns how many
    /// were removed.
    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, RepoError>;
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token is blacklisted")]
    TokenRevoked,

    #[error("Token has wrong type: expected {expected}")]
    WrongTokenKind { expected: TokenKind },

    #[error("Missing authorization header")]
    MissingAuth,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Hashing error: {0}")]
    HashingError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] RepoError),
}

impl AuthError {
    /// Whether the error describes a bad token rather than a server fault.
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::TokenExpired
                | AuthError::InvalidToken(_)
                | AuthError::TokenRevoked
                | AuthError::WrongTokenKind { .. }
        )
    }
}
