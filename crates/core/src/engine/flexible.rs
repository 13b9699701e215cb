//! Searches every date of a flexibility window and keeps the best fare per date.

use crate::domain::query::date_window;
use crate::domain::quote::PriceQuote;
use crate::domain::route::Route;
use crate::engine::config::EngineConfig;
use crate::error::QueryError;
use crate::ingest::normalize::duration_rank;
use crate::ingest::{normalize_quotes, SearchProvider};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Why a date in the window has no entry in `per_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateMiss {
    NoFlights,
    SearchFailed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlexibleSearchResult {
    pub route: Route,
    /// Only dates that produced at least one quote.
    pub per_date: BTreeMap<NaiveDate, PriceQuote>,
    pub missing: BTreeMap<NaiveDate, DateMiss>,
    pub overall_best: PriceQuote,
}

pub async fn aggregate_flexible(
    search: &dyn SearchProvider,
    route: &Route,
    base_date: NaiveDate,
    flexibility_days: u32,
    cfg: &EngineConfig,
) -> Result<FlexibleSearchResult, QueryError> {
    let outcomes: Vec<(NaiveDate, Result<PriceQuote, DateMiss>)> =
        stream::iter(date_window(base_date, flexibility_days))
            .map(|date| async move { (date, best_for_date(search, route, date, cfg).await) })
            .buffer_unordered(cfg.search_concurrency.max(1))
            .collect()
            .await;

    let mut per_date = BTreeMap::new();
    let mut missing = BTreeMap::new();
    for (date, outcome) in outcomes {
        match outcome {
            Ok(quote) => {
                per_date.insert(date, quote);
            }
            Err(miss) => {
                missing.insert(date, miss);
            }
        }
    }

    let Some(overall_best) = per_date.values().min_by(|a, b| overall_order(a, b)).cloned() else {
        return Err(QueryError::DataUnavailable {
            route: route.key(),
            reason: format!(
                "no quotes for any of {} date(s) from {base_date}",
                flexibility_days + 1
            ),
        });
    };

    tracing::debug!(
        route = %route,
        provider = search.provider_name(),
        dates_with_quotes = per_date.len(),
        dates_missing = missing.len(),
        best_price = %overall_best.price,
        best_date = %overall_best.date,
        "flexible search aggregated"
    );

    Ok(FlexibleSearchResult {
        route: route.clone(),
        per_date,
        missing,
        overall_best,
    })
}

async fn best_for_date(
    search: &dyn SearchProvider,
    route: &Route,
    date: NaiveDate,
    cfg: &EngineConfig,
) -> Result<PriceQuote, DateMiss> {
    let raw = match tokio::time::timeout(cfg.search_timeout, search.search(route, date)).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(err)) => {
            tracing::warn!(
                route = %route,
                %date,
                provider = search.provider_name(),
                error = %err,
                "search failed; skipping date"
            );
            return Err(DateMiss::SearchFailed);
        }
        Err(_) => {
            tracing::warn!(
                route = %route,
                %date,
                provider = search.provider_name(),
                timeout_ms = cfg.search_timeout.as_millis() as u64,
                "search timed out; skipping date"
            );
            return Err(DateMiss::TimedOut);
        }
    };

    normalize_quotes(&raw, &cfg.normalize)
        .quotes
        .into_iter()
        .filter(|q| q.route == *route && q.date == date)
        .min_by(date_order)
        .ok_or(DateMiss::NoFlights)
}

fn date_order(a: &PriceQuote, b: &PriceQuote) -> Ordering {
    a.price
        .amount
        .cmp(&b.price.amount)
        .then(duration_rank(a.duration_minutes).cmp(&duration_rank(b.duration_minutes)))
        .then_with(|| a.airline.cmp(&b.airline))
        .then_with(|| a.fare_class.cmp(&b.fare_class))
}

fn overall_order(a: &PriceQuote, b: &PriceQuote) -> Ordering {
    a.price
        .amount
        .cmp(&b.price.amount)
        .then(a.date.cmp(&b.date))
        .then_with(|| date_order(a, b))
}
