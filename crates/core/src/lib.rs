pub mod domain;
pub mod engine;
pub mod ingest;
pub mod storage;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub card_feed_base_url: Option<String>,
        pub card_feed_api_key: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                card_feed_base_url: std::env::var("CARD_FEED_BASE_URL").ok(),
                card_feed_api_key: std::env::var("CARD_FEED_API_KEY").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_card_feed_base_url(&self) -> anyhow::Result<&str> {
            self.card_feed_base_url
                .as_deref()
                .context("CARD_FEED_BASE_URL is required")
        }
    }
}
