//! Login and the bearer-token lifecycle.
//!
//! Tokens move from issued to active, and from there either get refreshed,
//! blacklisted (terminal) or expire (terminal). Blacklisting is keyed by the
//! token's `jti` and persisted through [`TokenBlacklist`].

use std::sync::{Arc, OnceLock};

use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use crate::domain::User;
use crate::error::RepoError;
use crate::ports::{
    AuthError, PasswordService, TokenBlacklist, TokenClaims, TokenKind, TokenService,
    TokenSubject, UserRepository,
};

/// Minimum accepted password length on registration.
const MIN_PASSWORD_LEN: usize = 8;
/// Maximum length, in characters, of usernames and first/last names.
pub const MAX_NAME_LEN: usize = 150;

/// Blacklist entries are kept this long past token expiry, beyond the
/// validator's clock leeway.
const PURGE_GRACE_MINUTES: i64 = 5;

/// Hashed once and verified against when a login names an unknown user.
const DUMMY_PASSWORD: &str = "quill-dummy-password";

/// What happens to refresh tokens when they are exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Issue a fresh refresh token on every refresh.
    pub rotate_refresh_tokens: bool,
    /// Blacklist the presented refresh token once it has been rotated.
    pub blacklist_after_rotation: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            rotate_refresh_tokens: true,
            blacklist_after_rotation: true,
        }
    }
}

/// An access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of `access_token`, in seconds.
    pub expires_in: i64,
}

/// Result of a successful login or registration.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub user: User,
}

/// Registration input.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Authentication use cases.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    passwords: Arc<dyn PasswordService>,
    tokens: Arc<dyn TokenService>,
    blacklist: Arc<dyn TokenBlacklist>,
    rotation: RotationPolicy,
    dummy_hash: Arc<OnceLock<String>>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        passwords: Arc<dyn PasswordService>,
        tokens: Arc<dyn TokenService>,
        blacklist: Arc<dyn TokenBlacklist>,
    ) -> Self {
        Self {
            users,
            passwords,
            tokens,
            blacklist,
            rotation: RotationPolicy::default(),
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn token_service(&self) -> Arc<dyn TokenService> {
        self.tokens.clone()
    }

    /// Exchange a username and password for a token pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let Some(user) = self.users.find_by_username(username).await? else {
            tracing::debug!("Login attempt for unknown username");
            self.verify_dummy(password);
            return Err(AuthError::InvalidCredentials);
        };

        if !self.passwords.verify(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issue_pair(&TokenSubject::from(&user))?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginOutcome { tokens, user })
    }

    /// Create an identity and log it in.
    pub async fn register(&self, input: NewUser) -> Result<LoginOutcome, AuthError> {
        let username = input.username.trim();
        if username.is_empty() {
            return Err(AuthError::Validation("Username is required".to_string()));
        }
        for (field, value) in [
            ("Username", username),
            ("First name", input.first_name.as_str()),
            ("Last name", input.last_name.as_str()),
        ] {
            if value.chars().count() > MAX_NAME_LEN {
                return Err(AuthError::Validation(format!(
                    "{field} must be at most {MAX_NAME_LEN} characters"
                )));
            }
        }
        if input.email.is_empty() || !input.email.contains('@') {
            return Err(AuthError::Validation("Invalid email address".to_string()));
        }
        if input.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if self.users.find_by_username(username).await?.is_some() {
            return Err(AuthError::Conflict("Username already taken".to_string()));
        }
        if self.users.find_by_email(&input.email).await?.is_some() {
            return Err(AuthError::Conflict("Email already registered".to_string()));
        }

        let password_hash = self.passwords.hash(&input.password)?;
        let user = User::new(username.to_string(), input.email, password_hash)
            .with_names(input.first_name, input.last_name);

        let user = self.users.create(user).await.map_err(|e| match e {
            RepoError::Constraint(msg) => AuthError::Conflict(msg),
            other => AuthError::Storage(other),
        })?;

        let tokens = self.issue_pair(&TokenSubject::from(&user))?;
        tracing::info!(user_id = %user.id, "User registered");

        Ok(LoginOutcome { tokens, user })
    }

    /// Check that a token of either kind is authentic, unexpired and not
    /// blacklisted.
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let claims = self.tokens.validate_token(token)?;

        if self.blacklist.is_revoked(claims.jti).await? {
            return Err(AuthError::TokenRevoked);
        }

        Ok(claims)
    }

    /// Exchange a refresh token for a new access token (and, when rotating,
    /// a new refresh token).
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.verify_refresh(refresh_token).await?;
        let subject = claims.subject();

        let access_token = self.tokens.generate_token(TokenKind::Access, &subject)?;

        let refresh_token = if self.rotation.rotate_refresh_tokens {
            let rotated = self.tokens.generate_token(TokenKind::Refresh, &subject)?;
            if self.rotation.blacklist_after_rotation {
                self.blacklist
                    .revoke(claims.jti, claims.user_id, claims.expires_at())
                    .await?;
            }
            rotated
        } else {
            refresh_token.to_string()
        };

        tracing::debug!(user_id = %claims.user_id, "Tokens refreshed");

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.tokens.expiration_seconds(TokenKind::Access),
        })
    }

    /// Blacklist a refresh token.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.verify_refresh(refresh_token).await?;

        self.blacklist
            .revoke(claims.jti, claims.user_id, claims.expires_at())
            .await?;

        tracing::info!(user_id = %claims.user_id, jti = %claims.jti, "Refresh token blacklisted");
        Ok(())
    }

    /// Forget blacklisted tokens that can no longer validate anyway.
    pub async fn purge_expired_tokens(&self) -> Result<u64, AuthError> {
        let purged = self.blacklist.purge_expired(Utc::now() - TimeDelta::minutes(PURGE_GRACE_MINUTES)).await?;
        if purged > 0 {
            tracing::info!(purged, "Purged expired blacklist entries");
        }
        Ok(purged)
    }

    /// Load the profile behind an authenticated identity.
    pub async fn profile(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::InvalidToken("User no longer exists".to_string()))
    }

    async fn verify_refresh(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let claims = self.verify(token).await?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::WrongTokenKind {
                expected: TokenKind::Refresh,
            });
        }
        Ok(claims)
    }

    fn issue_pair(&self, subject: &TokenSubject) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.tokens.generate_token(TokenKind::Access, subject)?,
            refresh_token: self.tokens.generate_token(TokenKind::Refresh, subject)?,
            expires_in: self.tokens.expiration_seconds(TokenKind::Access),
        })
    }

    /// Spend the same Argon2 work as a real password check.
    fn verify_dummy(&self, password: &str) {
        let hash = self
            .dummy_hash
            .get_or_init(|| self.passwords.hash(DUMMY_PASSWORD).unwrap_or_default());
        let _ = self.passwords.verify(password, hash);
    }
}
