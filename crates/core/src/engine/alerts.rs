use crate::domain::quote::Money;
use crate::domain::route::Route;
use crate::engine::config::{AlertConfig, EngineConfig};
use crate::engine::flexible::aggregate_flexible;
use crate::ingest::SearchProvider;
use crate::storage::HistoryStore;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertUrgency {
    High,
    Medium,
}

/// A route currently priced well below its historical mean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub route: Route,
    pub current_price: Money,
    pub historical_mean: Decimal,
    pub savings: Decimal,
    pub urgency: AlertUrgency,
}

/// Compares a route's current price against its history; `None` when no drop is large enough.
pub fn evaluate_drop(
    route: &Route,
    current: &Money,
    historical_mean: Decimal,
    cfg: &AlertConfig,
) -> Option<PriceAlert> {
    if historical_mean <= Decimal::ZERO || current.amount >= historical_mean * cfg.drop_ratio {
        return None;
    }
    let urgency = if current.amount < historical_mean * cfg.high_ratio {
        AlertUrgency::High
    } else {
        AlertUrgency::Medium
    };
    Some(PriceAlert {
        route: route.clone(),
        current_price: current.clone(),
        historical_mean: historical_mean.round_dp(2),
        savings: (historical_mean - current.amount).round_dp(2),
        urgency,
    })
}

/// Scans `routes` for price drops on `as_of`. Routes that cannot be priced or have no history are
/// skipped. Alerts keep the order of `routes`.
pub async fn scan_routes(
    search: &dyn SearchProvider,
    history: &dyn HistoryStore,
    routes: &[Route],
    as_of: NaiveDate,
    cfg: &EngineConfig,
) -> Vec<PriceAlert> {
    let pending: Vec<_> = routes
        .iter()
        .map(|route| check_route(search, history, route, as_of, cfg))
        .collect();
    let checked: Vec<Option<PriceAlert>> = stream::iter(pending)
        .buffered(cfg.search_concurrency.max(1))
        .collect()
        .await;

    let alerts: Vec<PriceAlert> = checked.into_iter().flatten().collect();
    tracing::info!(
        routes = routes.len(),
        alerts = alerts.len(),
        %as_of,
        "market scan complete"
    );
    alerts
}

async fn check_route(
    search: &dyn SearchProvider,
    history: &dyn HistoryStore,
    route: &Route,
    as_of: NaiveDate,
    cfg: &EngineConfig,
) -> Option<PriceAlert> {
    let (current, series) = tokio::join!(
        aggregate_flexible(search, route, as_of, 0, cfg),
        history.history(route, cfg.lookback_days)
    );

    let current = match current {
        Ok(found) => found.overall_best.price,
        Err(err) => {
            tracing::debug!(route = %route, error = %err, "no current price; skipping route");
            return None;
        }
    };
    let mean = match series {
        Ok(series) => series.mean()?,
        Err(err) => {
            tracing::warn!(route = %route, error = %err, "history lookup failed; skipping route");
            return None;
        }
    };

    evaluate_drop(route, &current, mean, &cfg.alerts)
}
