use crate::domain::history::{HistoricalSeries, PricePoint};
use crate::domain::quote::Money;
use crate::domain::route::Route;
use crate::storage::HistoryStore;
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Process-local history, for fixtures, stub runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    points: RwLock<BTreeMap<Route, Vec<PricePoint>>>,
}

#[derive(Debug, Deserialize)]
struct FixtureHistory {
    route: String,
    points: Vec<PricePoint>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(series: impl IntoIterator<Item = HistoricalSeries>) -> Self {
        let map = series
            .into_iter()
            .map(|s| (s.route, s.points))
            .collect::<BTreeMap<_, _>>();
        Self {
            points: RwLock::new(map),
        }
    }

    /// Loads `{"history": [{"route": "JFK-LAX", "points": [{"date": ..., "price": ...}]}]}`.
    pub fn from_fixture(fixture: &Value) -> Result<Self> {
        let Some(history) = fixture.get("history") else {
            return Ok(Self::new());
        };
        let entries: Vec<FixtureHistory> = serde_json::from_value(history.clone())
            .context("fixture `history` has an unexpected shape")?;

        let mut series = Vec::with_capacity(entries.len());
        for e in entries {
            let route = Route::parse_key(&e.route)
                .with_context(|| format!("fixture route {:?} is invalid", e.route))?;
            if let Some(p) = e
                .points
                .iter()
                .find(|p| p.price.is_sign_negative() || p.price > Money::MAX_AMOUNT)
            {
                anyhow::bail!(
                    "fixture {} has out-of-range price {} on {}",
                    e.route,
                    p.price,
                    p.date
                );
            }
            series.push(HistoricalSeries::new(route, e.points));
        }
        Ok(Self::with_series(series))
    }
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    fn store_name(&self) -> &'static str {
        "in_memory"
    }

    async fn history(&self, route: &Route, window_days: u32) -> Result<HistoricalSeries> {
        let guard = self.points.read().await;
        let Some(points) = guard.get(route) else {
            return Ok(HistoricalSeries::empty(route.clone()));
        };

        let latest = points.iter().map(|p| p.date).max();
        let cutoff: Option<NaiveDate> = match (window_days, latest) {
            (0, _) | (_, None) => None,
            (days, Some(latest)) => latest.checked_sub_signed(Duration::days(i64::from(days))),
        };
        let kept = points
            .iter()
            .filter(|p| cutoff.map_or(true, |c| p.date > c))
            .copied()
            .collect();
        Ok(HistoricalSeries::new(route.clone(), kept))
    }

    async fn record(&self, route: &Route, observed_on: NaiveDate, price: &Money) -> Result<()> {
        let mut guard = self.points.write().await;
        guard.entry(route.clone()).or_default().push(PricePoint {
            date: observed_on,
            price: price.amount,
        });
        Ok(())
    }
}
