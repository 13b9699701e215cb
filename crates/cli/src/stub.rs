//! Deterministic offline collaborators for `--stub` runs.

use chrono::{Datelike, Duration, NaiveDate};
use fareadvisor_core::domain::history::{HistoricalSeries, PricePoint};
use fareadvisor_core::domain::route::Route;
use fareadvisor_core::ingest::{RawQuote, SearchProvider};
use rust_decimal::Decimal;
use serde_json::json;

const CARRIERS: [(&str, i64, u32); 3] = [("SQ", 0, 0), ("JL", 35, 45), ("NH", -20, 110)];

/// Fares derived from the route and date alone: same inputs, same quotes.
#[derive(Debug, Clone, Default)]
pub struct StubSearchProvider;

#[async_trait::async_trait]
impl SearchProvider for StubSearchProvider {
    fn provider_name(&self) -> &'static str {
        "stub"
    }

    async fn search(&self, route: &Route, date: NaiveDate) -> anyhow::Result<Vec<RawQuote>> {
        let base = route_base_price(route);
        // Swings of -15%..+15% by date.
        let swing = (i64::from(date.num_days_from_ce()) * 7 + route_seed(route)) % 31 - 15;
        let day_price = base * (100 + swing) / 100;
        let base_minutes = 90 + (route_seed(route) % 600) as u32;

        Ok(CARRIERS
            .iter()
            .map(|(carrier, delta, extra_minutes)| {
                RawQuote(json!({
                    "origin": route.origin,
                    "destination": route.destination,
                    "date": date,
                    "price": day_price + delta,
                    "currency": "USD",
                    "airline": carrier,
                    "fare_class": "ECONOMY",
                    "duration_minutes": base_minutes + extra_minutes,
                    "stops": u32::from(*extra_minutes > 60),
                }))
            })
            .collect())
    }
}

/// `days` daily observations ending the day before `as_of`, with weekend fares a notch higher.
pub fn stub_history(route: &Route, as_of: NaiveDate, days: i64) -> HistoricalSeries {
    let base = route_base_price(route);
    let points = (1..=days)
        .filter_map(|back| {
            let date = as_of.checked_sub_signed(Duration::days(back))?;
            let weekend = if date.weekday().number_from_monday() >= 6 {
                base / 10
            } else {
                0
            };
            let wobble = (i64::from(date.ordinal()) * 13 + route_seed(route)) % 21 - 10;
            Some(PricePoint {
                date,
                price: Decimal::from(base + weekend + base * wobble / 100),
            })
        })
        .collect();
    HistoricalSeries::new(route.clone(), points)
}

fn route_seed(route: &Route) -> i64 {
    route
        .key()
        .bytes()
        .fold(0i64, |acc, b| (acc * 31 + i64::from(b)) % 10_007)
}

fn route_base_price(route: &Route) -> i64 {
    150 + route_seed(route) % 700
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_search_is_deterministic() {
        let route = Route::new("JFK", "LAX").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
        let a = StubSearchProvider.search(&route, date).await.unwrap();
        let b = StubSearchProvider.search(&route, date).await.unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[test]
    fn stub_history_covers_requested_days() {
        let route = Route::new("SIN", "NRT").unwrap();
        let as_of = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let series = stub_history(&route, as_of, 60);
        assert_eq!(series.len(), 60);
        assert_eq!(series.latest_date(), as_of.pred_opt());
        assert!(series.points.iter().all(|p| p.price > Decimal::ZERO));
    }
}
