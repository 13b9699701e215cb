//! End-to-end price advice: search, history, baseline, forecast and classification.

pub mod alerts;
pub mod config;
pub mod flexible;

pub use alerts::{AlertUrgency, PriceAlert};
pub use config::{AlertConfig, EngineConfig};
pub use flexible::{aggregate_flexible, DateMiss, FlexibleSearchResult};

use crate::domain::baseline::Baseline;
use crate::domain::forecast::ForecastPoint;
use crate::domain::history::HistoricalSeries;
use crate::domain::query::{PriceQuery, ValidatedQuery};
use crate::domain::recommendation::Recommendation;
use crate::domain::route::Route;
use crate::error::QueryError;
use crate::ingest::SearchProvider;
use crate::pricing::{build_baseline, classify, forecast, weekday_insight, WeekdayInsight};
use crate::storage::HistoryStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything the engine worked out for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAdvice {
    pub route: Route,
    pub as_of: NaiveDate,
    pub outbound: FlexibleSearchResult,
    pub return_leg: Option<FlexibleSearchResult>,
    pub baseline: Baseline,
    pub forecast: Vec<ForecastPoint>,
    pub recommendation: Recommendation,
    pub booking_insight: Option<WeekdayInsight>,
}

#[derive(Clone)]
pub struct PriceEngine {
    search: Arc<dyn SearchProvider>,
    history: Arc<dyn HistoryStore>,
    config: EngineConfig,
}

impl PriceEngine {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        history: Arc<dyn HistoryStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            search,
            history,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Answers a query. Only invalid input or a window without any quote is an error; missing
    /// history degrades to a budget-only decision and a failed return leg is reported as `None`.
    pub async fn advise(
        &self,
        query: PriceQuery,
        as_of: NaiveDate,
    ) -> Result<PriceAdvice, QueryError> {
        let q = query.validate(self.config.max_flexibility_days)?;
        let cfg = &self.config;

        let (outbound, series) = tokio::join!(
            aggregate_flexible(
                self.search.as_ref(),
                &q.route,
                q.departure_date,
                q.flexibility_days,
                cfg
            ),
            self.load_history(&q.route)
        );
        let outbound = outbound?;
        let return_leg = self.return_leg(&q).await;

        let baseline = build_baseline(&series, cfg.lookback_days);
        let forecast = forecast(&series, &cfg.forecast);
        let recommendation = classify(
            &outbound.overall_best,
            &baseline,
            &forecast,
            q.budget,
            &cfg.classifier,
        );
        let booking_insight = weekday_insight(&series, cfg.insight_min_points);

        tracing::info!(
            route = %q.route,
            %as_of,
            action = %recommendation.action,
            confidence = recommendation.confidence,
            price = %recommendation.current_price,
            samples = baseline.sample_size(),
            "price advice ready"
        );

        if cfg.record_observations {
            if let Err(err) = self
                .history
                .record(&q.route, as_of, &outbound.overall_best.price)
                .await
            {
                tracing::warn!(
                    route = %q.route,
                    store = self.history.store_name(),
                    error = %err,
                    "failed to record observation"
                );
            }
        }

        Ok(PriceAdvice {
            route: q.route,
            as_of,
            outbound,
            return_leg,
            baseline,
            forecast,
            recommendation,
            booking_insight,
        })
    }

    pub async fn market_alerts(&self, routes: &[Route], as_of: NaiveDate) -> Vec<PriceAlert> {
        alerts::scan_routes(
            self.search.as_ref(),
            self.history.as_ref(),
            routes,
            as_of,
            &self.config,
        )
        .await
    }

    async fn load_history(&self, route: &Route) -> HistoricalSeries {
        match self.history.history(route, self.config.lookback_days).await {
            Ok(series) => series,
            Err(err) => {
                tracing::warn!(
                    route = %route,
                    store = self.history.store_name(),
                    error = %err,
                    "history unavailable; continuing without baseline"
                );
                HistoricalSeries::empty(route.clone())
            }
        }
    }

    async fn return_leg(&self, q: &ValidatedQuery) -> Option<FlexibleSearchResult> {
        let return_date = q.return_date?;
        let back = q.route.reversed();
        match aggregate_flexible(
            self.search.as_ref(),
            &back,
            return_date,
            q.flexibility_days,
            &self.config,
        )
        .await
        {
            Ok(found) => Some(found),
            Err(err) => {
                tracing::warn!(route = %back, %return_date, error = %err, "return leg unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::PricePoint;
    use crate::domain::quote::Money;
    use crate::domain::recommendation::{Action, RuleId};
    use crate::ingest::InMemorySearchProvider;
    use crate::storage::InMemoryHistoryStore;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, 2).unwrap() + Duration::days(offset)
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()
    }

    fn quote(route: &Route, date: NaiveDate, price: i64) -> Value {
        json!({
            "origin": route.origin,
            "destination": route.destination,
            "date": date,
            "price": price,
            "airline": "SQ"
        })
    }

    fn query(budget: i64, flexibility_days: i64) -> PriceQuery {
        PriceQuery {
            origin: "SIN".to_string(),
            destination: "NRT".to_string(),
            departure_date: day(0),
            return_date: None,
            budget: Decimal::from(budget),
            flexibility_days,
        }
    }

    /// 30 daily observations cycling 200/350/600 ending the day before `as_of`.
    fn history(route: &Route) -> HistoricalSeries {
        let points = (0..30)
            .map(|i| PricePoint {
                date: as_of() - Duration::days(30 - i),
                price: Decimal::from([200, 350, 600][i as usize % 3]),
            })
            .collect();
        HistoricalSeries::new(route.clone(), points)
    }

    struct BrokenHistory;

    #[async_trait::async_trait]
    impl HistoryStore for BrokenHistory {
        fn store_name(&self) -> &'static str {
            "broken"
        }

        async fn history(&self, _: &Route, _: u32) -> anyhow::Result<HistoricalSeries> {
            anyhow::bail!("connection refused")
        }

        async fn record(&self, _: &Route, _: NaiveDate, _: &Money) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    fn engine(search: InMemorySearchProvider, history: Arc<dyn HistoryStore>) -> PriceEngine {
        PriceEngine::new(Arc::new(search), history, EngineConfig::default())
    }

    #[tokio::test]
    async fn advises_with_baseline_and_records_observation() {
        let route = Route::new("SIN", "NRT").unwrap();
        let search = InMemorySearchProvider::new()
            .with_quotes(&route, day(0), vec![quote(&route, day(0), 210)])
            .with_quotes(&route, day(1), vec![quote(&route, day(1), 190)]);
        let store = Arc::new(InMemoryHistoryStore::with_series([history(&route)]));

        let advice = engine(search, store.clone())
            .advise(query(400, 1), as_of())
            .await
            .unwrap();

        assert_eq!(advice.outbound.overall_best.date, day(1));
        assert_eq!(advice.recommendation.action, Action::BuyNow);
        assert_eq!(advice.recommendation.decided_by, RuleId::BelowP10);
        assert!(advice.baseline.available().is_some());
        assert_eq!(advice.forecast.len(), 7);
        assert!(advice.booking_insight.is_some());
        assert!(advice.return_leg.is_none());

        let recorded = store.history(&route, 0).await.unwrap();
        assert_eq!(recorded.len(), 31);
        assert_eq!(recorded.latest_date(), Some(as_of()));
        assert_eq!(recorded.points[30].price, Decimal::from(190));
    }

    #[tokio::test]
    async fn missing_history_falls_back_to_budget() {
        let route = Route::new("SIN", "NRT").unwrap();
        let search = InMemorySearchProvider::new()
            .with_quotes(&route, day(0), vec![quote(&route, day(0), 300)]);
        let engine = engine(search, Arc::new(BrokenHistory));

        let over = engine.advise(query(250, 0), as_of()).await.unwrap();
        assert_eq!(over.recommendation.action, Action::Alternate);
        assert_eq!(over.recommendation.decided_by, RuleId::BudgetOnly);
        assert_eq!(over.baseline, Baseline::Unavailable { sample_size: 0 });
        assert!(over.forecast.is_empty());

        let under = engine.advise(query(350, 0), as_of()).await.unwrap();
        assert_eq!(under.recommendation.action, Action::Buy);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_searching() {
        let engine = engine(
            InMemorySearchProvider::new(),
            Arc::new(InMemoryHistoryStore::new()),
        );

        let err = engine.advise(query(0, 0), as_of()).await.unwrap_err();
        assert!(err.is_invalid_input());

        let err = engine.advise(query(400, 15), as_of()).await.unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn calendar_edge_dates_are_invalid_input() {
        let engine = engine(
            InMemorySearchProvider::new(),
            Arc::new(InMemoryHistoryStore::new()),
        );

        let mut q = query(400, 1);
        q.departure_date = NaiveDate::MAX;
        let err = engine.advise(q, as_of()).await.unwrap_err();
        assert!(err.is_invalid_input());

        let mut q = query(400, 2);
        q.return_date = NaiveDate::MAX.pred_opt();
        let err = engine.advise(q, as_of()).await.unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn huge_budget_is_advised_not_fatal() {
        let route = Route::new("SIN", "NRT").unwrap();
        let search = InMemorySearchProvider::new()
            .with_quotes(&route, day(0), vec![quote(&route, day(0), 340)]);
        let store = Arc::new(InMemoryHistoryStore::with_series([history(&route)]));

        let mut q = query(400, 0);
        q.budget = Decimal::MAX;
        let advice = engine(search, store).advise(q, as_of()).await.unwrap();
        assert_eq!(advice.recommendation.action, Action::Buy);
    }

    #[tokio::test]
    async fn no_quotes_anywhere_is_data_unavailable_and_records_nothing() {
        let route = Route::new("SIN", "NRT").unwrap();
        let store = Arc::new(InMemoryHistoryStore::new());
        let search = InMemorySearchProvider::new().failing_on(&route, day(0), "down");

        let err = engine(search, store.clone())
            .advise(query(400, 0), as_of())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::DataUnavailable { .. }));
        assert!(store.history(&route, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn round_trip_searches_reversed_route() {
        let route = Route::new("SIN", "NRT").unwrap();
        let back = route.reversed();
        let search = InMemorySearchProvider::new()
            .with_quotes(&route, day(0), vec![quote(&route, day(0), 300)])
            .with_quotes(&back, day(7), vec![quote(&back, day(7), 280)]);
        let engine = engine(search, Arc::new(InMemoryHistoryStore::new()));

        let mut q = query(400, 0);
        q.return_date = Some(day(7));
        let advice = engine.advise(q, as_of()).await.unwrap();
        let leg = advice.return_leg.unwrap();
        assert_eq!(leg.route, back);
        assert_eq!(leg.overall_best.price.amount, Decimal::from(280));

        // A return leg with no fares does not fail the query.
        let mut q = query(400, 0);
        q.return_date = Some(day(9));
        assert!(engine.advise(q, as_of()).await.unwrap().return_leg.is_none());
    }
}
