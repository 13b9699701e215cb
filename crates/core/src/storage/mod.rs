pub mod memory;
pub mod price_history;

pub use memory::InMemoryHistoryStore;
pub use price_history::PgHistoryStore;

use crate::domain::history::HistoricalSeries;
use crate::domain::quote::Money;
use crate::domain::route::Route;
use anyhow::Context;
use chrono::NaiveDate;

/// Source of past prices per route.
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    fn store_name(&self) -> &'static str;

    /// Observations within `window_days` of the route's most recent one (all of them for 0).
    /// A route with no history yields an empty series.
    async fn history(&self, route: &Route, window_days: u32) -> anyhow::Result<HistoricalSeries>;

    async fn record(
        &self,
        route: &Route,
        observed_on: NaiveDate,
        price: &Money,
    ) -> anyhow::Result<()>;
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}
