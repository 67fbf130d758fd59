//! Configuration module
//!
//! Environment-driven configuration for the API server and the gallery
//! export pipeline. Values are read once at startup in `Config::from_env`;
//! everything downstream receives the constructed value.

use std::env;
use std::time::Duration;

// Defaults
const DEFAULT_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const EXPORT_CONCURRENCY: usize = 6;
const EXPORT_ITEM_TIMEOUT_MS: u64 = 25_000;
const EXPORT_MAX_ITEMS: usize = 2_000;

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    /// Maximum number of concurrent origin fetches during an export.
    pub export_concurrency: usize,
    /// Deadline for a single origin fetch, covering headers and body.
    pub export_item_timeout_ms: u64,
    /// Hard cap on the number of photos included in one archive.
    pub export_max_items: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        // Best effort; missing .env files are fine in containers.
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let config = Config {
            server_port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable not set"))?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            environment,
            export_concurrency: env::var("EXPORT_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(EXPORT_CONCURRENCY),
            export_item_timeout_ms: env::var("EXPORT_ITEM_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(EXPORT_ITEM_TIMEOUT_MS),
            export_max_items: env::var("EXPORT_MAX_ITEMS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(EXPORT_MAX_ITEMS),
        };

        config.validate()?;
        Ok(config)
    }

    /// Fail fast on values that would render the export pipeline inert.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.export_concurrency == 0 {
            return Err(anyhow::anyhow!("EXPORT_CONCURRENCY must be at least 1"));
        }
        if self.export_max_items == 0 {
            return Err(anyhow::anyhow!("EXPORT_MAX_ITEMS must be at least 1"));
        }
        if self.export_item_timeout_ms == 0 {
            return Err(anyhow::anyhow!("EXPORT_ITEM_TIMEOUT_MS must be at least 1"));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn export_item_timeout(&self) -> Duration {
        Duration::from_millis(self.export_item_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server_port: 8080,
            database_url: "postgres://localhost/gala".to_string(),
            cors_origins: vec!["*".to_string()],
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            environment: "development".to_string(),
            export_concurrency: EXPORT_CONCURRENCY,
            export_item_timeout_ms: EXPORT_ITEM_TIMEOUT_MS,
            export_max_items: EXPORT_MAX_ITEMS,
        }
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = base_config();
        config.export_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let mut config = base_config();
        config.export_max_items = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_production() {
        let mut config = base_config();
        assert!(!config.is_production());
        config.environment = "Production".to_string();
        assert!(config.is_production());
        config.environment = "prod".to_string();
        assert!(config.is_production());
    }

    #[test]
    fn test_export_item_timeout() {
        let config = base_config();
        assert_eq!(config.export_item_timeout(), Duration::from_secs(25));
    }
}
