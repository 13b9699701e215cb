use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_price: Decimal,
    pub trend_direction: TrendDirection,
}

/// Direction shared by a forecast sequence; `None` when nothing was forecast.
pub fn forecast_direction(points: &[ForecastPoint]) -> Option<TrendDirection> {
    points.first().map(|p| p.trend_direction)
}
