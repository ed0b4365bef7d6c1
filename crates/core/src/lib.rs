pub mod analytics;
pub mod dataset;
pub mod domain;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_CACHE_TTL_SECS: u64 = 900;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub stock_data_path: Option<String>,
        pub sentry_dsn: Option<String>,
        pub cache_ttl_secs: Option<u64>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                stock_data_path: std::env::var("STOCK_DATA_PATH").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                cache_ttl_secs: std::env::var("CACHE_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok()),
            })
        }

        pub fn require_stock_data_path(&self) -> anyhow::Result<&str> {
            self.stock_data_path
                .as_deref()
                .context("STOCK_DATA_PATH is required")
        }

        pub fn cache_ttl(&self) -> Duration {
            Duration::from_secs(self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS))
        }
    }
}
