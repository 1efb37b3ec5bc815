//! Application configuration loaded from environment variables.

use std::env;

use quill_infra::{DatabaseConfig, JwtConfig};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs the server on the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub jwt: JwtConfig,
    /// Seconds between blacklist purges; 0 disables the task.
    pub blacklist_purge_interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database = env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .map(|url| {
                let defaults = DatabaseConfig::new(url);
                DatabaseConfig {
                    max_connections: env_parse("DB_MAX_CONNECTIONS")
                        .unwrap_or(defaults.max_connections),
                    min_connections: env_parse("DB_MIN_CONNECTIONS")
                        .unwrap_or(defaults.min_connections),
                    ..defaults
                }
            });

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_parse("PORT").unwrap_or(8080),
            database,
            jwt: JwtConfig::from_env(),
            blacklist_purge_interval_secs: env_parse("BLACKLIST_PURGE_INTERVAL_SECS")
                .unwrap_or(3600),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}
