pub mod domain;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod pricing;
pub mod storage;
pub mod time;

pub use engine::{PriceAdvice, PriceEngine};

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub search_base_url: Option<String>,
        pub search_api_key: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                search_base_url: non_empty_var("FLIGHT_SEARCH_BASE_URL"),
                search_api_key: non_empty_var("FLIGHT_SEARCH_API_KEY"),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_search_base_url(&self) -> anyhow::Result<&str> {
            self.search_base_url
                .as_deref()
                .context("FLIGHT_SEARCH_BASE_URL is required")
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }
}
