use crate::domain::route::Route;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: Decimal,
}

/// Past prices for a route, ordered by date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub route: Route,
    pub points: Vec<PricePoint>,
}

impl HistoricalSeries {
    pub fn new(route: Route, mut points: Vec<PricePoint>) -> Self {
        // Stable, so same-day observations keep their arrival order.
        points.sort_by_key(|p| p.date);
        Self { route, points }
    }

    pub fn empty(route: Route) -> Self {
        Self {
            route,
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn mean(&self) -> Option<Decimal> {
        if self.points.is_empty() {
            return None;
        }
        let sum: Decimal = self.points.iter().map(|p| p.price).sum();
        Some(sum / Decimal::from(self.points.len()))
    }
}
