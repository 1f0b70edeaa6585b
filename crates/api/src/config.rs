use std::time::Duration;

use bulkpress_catalog::RetryConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Remote catalog API settings.
    pub catalog: CatalogConfig,
    /// Bulk-job engine tuning.
    pub engine: EngineConfig,
}

/// Connection settings for the remote catalog API.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// GraphQL endpoint URL.
    pub endpoint: String,
    /// Access token supplied by the session layer.
    pub access_token: String,
    /// Retry/backoff tuning for every remote call.
    pub retry: RetryConfig,
}

/// Bulk-job engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Active operations older than this are swept by reconciliation.
    pub staleness_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            staleness_window: Duration::from_secs(60 * 60),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                    |
    /// |--------------------------|----------------------------|
    /// | `HOST`                   | `0.0.0.0`                  |
    /// | `PORT`                   | `3000`                     |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                       |
    /// | `CATALOG_API_URL`        | (required)                 |
    /// | `CATALOG_ACCESS_TOKEN`   | (required)                 |
    /// | `CATALOG_MAX_RETRIES`    | `3`                        |
    /// | `STALE_JOB_WINDOW_SECS`  | `3600`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let endpoint =
            std::env::var("CATALOG_API_URL").expect("CATALOG_API_URL must be set");
        let access_token =
            std::env::var("CATALOG_ACCESS_TOKEN").expect("CATALOG_ACCESS_TOKEN must be set");

        let max_retries: u32 = std::env::var("CATALOG_MAX_RETRIES")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("CATALOG_MAX_RETRIES must be a valid u32");

        let staleness_secs: u64 = std::env::var("STALE_JOB_WINDOW_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("STALE_JOB_WINDOW_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            catalog: CatalogConfig {
                endpoint,
                access_token,
                retry: RetryConfig {
                    max_retries,
                    ..RetryConfig::default()
                },
            },
            engine: EngineConfig {
                staleness_window: Duration::from_secs(staleness_secs),
            },
        }
    }
}
