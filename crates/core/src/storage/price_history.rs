use crate::domain::history::{HistoricalSeries, PricePoint};
use crate::domain::quote::Money;
use crate::domain::route::Route;
use crate::storage::HistoryStore;
use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Postgres-backed price history. Reads are scoped to one currency.
#[derive(Debug, Clone)]
pub struct PgHistoryStore {
    pool: sqlx::PgPool,
    currency: String,
}

impl PgHistoryStore {
    pub fn new(pool: sqlx::PgPool, currency: impl Into<String>) -> Self {
        Self {
            pool,
            currency: currency.into().to_ascii_uppercase(),
        }
    }
}

#[async_trait::async_trait]
impl HistoryStore for PgHistoryStore {
    fn store_name(&self) -> &'static str {
        "postgres"
    }

    async fn history(&self, route: &Route, window_days: u32) -> anyhow::Result<HistoricalSeries> {
        let window = i32::try_from(window_days).context("window_days out of range")?;

        let rows: Vec<(NaiveDate, Decimal)> = sqlx::query_as(
            "SELECT observed_on, price FROM price_history \
             WHERE origin = $1 AND destination = $2 AND currency = $3 \
               AND ($4 = 0 OR observed_on > ( \
                   SELECT MAX(observed_on) FROM price_history \
                   WHERE origin = $1 AND destination = $2 AND currency = $3) - $4) \
             ORDER BY observed_on ASC, id ASC",
        )
        .bind(&route.origin)
        .bind(&route.destination)
        .bind(&self.currency)
        .bind(window)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("select price_history for {route} failed"))?;

        tracing::debug!(route = %route, window_days, rows = rows.len(), "loaded price history");

        let points = rows
            .into_iter()
            .map(|(date, price)| PricePoint { date, price })
            .collect();
        Ok(HistoricalSeries::new(route.clone(), points))
    }

    async fn record(
        &self,
        route: &Route,
        observed_on: NaiveDate,
        price: &Money,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(
            price.currency.eq_ignore_ascii_case(&self.currency),
            "refusing to record {} price into {} history",
            price.currency,
            self.currency
        );

        sqlx::query(
            "INSERT INTO price_history (origin, destination, observed_on, price, currency) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&route.origin)
        .bind(&route.destination)
        .bind(observed_on)
        .bind(price.amount)
        .bind(&self.currency)
        .execute(&self.pool)
        .await
        .context("insert price_history failed")?;

        Ok(())
    }
}
