//! Application state - shared across all handlers.

use std::sync::Arc;
use std::time::Duration;

use quill_core::ports::{
    AuthorRepository, CommentRepository, PostRepository, TokenBlacklist, TokenService,
    UserRepository,
};
use quill_core::services::{AuthService, BlogService};
use quill_infra::{Argon2PasswordService, DatabaseConfig, InMemoryStore, JwtConfig, JwtTokenService};

#[cfg(feature = "postgres")]
use quill_infra::database::{
    PostgresAuthorRepository, PostgresCommentRepository, PostgresPostRepository,
    PostgresTokenBlacklist, PostgresUserRepository, connect,
};

/// Repository implementations backing the services.
struct Stores {
    users: Arc<dyn UserRepository>,
    authors: Arc<dyn AuthorRepository>,
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    blacklist: Arc<dyn TokenBlacklist>,
}

impl Stores {
    fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            users: store.clone(),
            authors: store.clone(),
            posts: store.clone(),
            comments: store.clone(),
            blacklist: store,
        }
    }

    #[cfg(feature = "postgres")]
    async fn postgres(config: &DatabaseConfig) -> Result<Self, String> {
        let conn = connect(config).await.map_err(|e| e.to_string())?;
        Ok(Self {
            users: Arc::new(PostgresUserRepository::new(conn.clone())),
            authors: Arc::new(PostgresAuthorRepository::new(conn.clone())),
            posts: Arc::new(PostgresPostRepository::new(conn.clone())),
            comments: Arc::new(PostgresCommentRepository::new(conn.clone())),
            blacklist: Arc::new(PostgresTokenBlacklist::new(conn)),
        })
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub blog: BlogService,
}

impl AppState {
    /// Build the application state, using PostgreSQL when a database is
    /// configured and reachable, and the in-memory store otherwise.
    pub async fn new(db_config: Option<&DatabaseConfig>, jwt: JwtConfig) -> Self {
        #[cfg(feature = "postgres")]
        let stores = match db_config {
            Some(config) => match Stores::postgres(config).await {
                Ok(stores) => stores,
                Err(e) => {
                    tracing::error!(
                        "Failed to connect to database: {}. Using in-memory fallback.",
                        e
                    );
                    Stores::in_memory()
                }
            },
            None => {
                tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
                Stores::in_memory()
            }
        };

        #[cfg(not(feature = "postgres"))]
        let stores = {
            if db_config.is_some() {
                tracing::warn!("Built without postgres feature - ignoring DATABASE_URL");
            }
            tracing::info!("Running without postgres feature - using in-memory store");
            Stores::in_memory()
        };

        let state = Self::from_stores(stores, jwt);
        tracing::info!("Application state initialized");
        state
    }

    /// State backed by a fresh in-memory store.
    pub fn in_memory(jwt: JwtConfig) -> Self {
        Self::from_stores(Stores::in_memory(), jwt)
    }

    /// Periodically drop expired entries from the token blacklist.
    pub fn spawn_blacklist_purge(&self, every: Duration) {
        let auth = self.auth.clone();
        actix_web::rt::spawn(async move {
            let mut ticker = actix_web::rt::time::interval(every);
            loop {
                ticker.tick().await;
                if let Err(e) = auth.purge_expired_tokens().await {
                    tracing::warn!(error = %e, "Blacklist purge failed");
                }
            }
        });
    }

    /// Token service used by the authentication extractors.
    pub fn token_service(&self) -> Arc<dyn TokenService> {
        self.auth.token_service()
    }

    fn from_stores(stores: Stores, jwt: JwtConfig) -> Self {
        let rotation = jwt.rotation;
        let auth = AuthService::new(
            stores.users.clone(),
            Arc::new(Argon2PasswordService::new()),
            Arc::new(JwtTokenService::new(jwt)),
            stores.blacklist,
        )
        .with_rotation(rotation);

        let blog = BlogService::new(stores.users, stores.authors, stores.posts, stores.comments);

        Self { auth, blog }
    }
}
