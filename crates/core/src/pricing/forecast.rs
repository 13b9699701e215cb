//! Short-horizon price forecast from a least-squares line through the history.

use crate::domain::forecast::{ForecastPoint, TrendDirection};
use crate::domain::history::HistoricalSeries;
use chrono::Duration;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Fewer points than this and no forecast is produced.
pub const MIN_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastConfig {
    pub horizon_days: u32,
    /// Slopes within `±ratio × mean price` per day count as flat.
    pub trend_epsilon_ratio: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_days: 7,
            trend_epsilon_ratio: 0.001,
        }
    }
}

/// Fitted price-per-day line; `x` is days since the first observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendFit {
    pub slope: f64,
    pub intercept: f64,
    pub mean_price: f64,
}

impl TrendFit {
    pub fn direction(&self, epsilon_ratio: f64) -> TrendDirection {
        let epsilon = (epsilon_ratio * self.mean_price).abs();
        if self.slope > epsilon {
            TrendDirection::Up
        } else if self.slope < -epsilon {
            TrendDirection::Down
        } else {
            TrendDirection::Flat
        }
    }

    fn predict(&self, x: f64) -> f64 {
        (self.intercept + self.slope * x).max(0.0)
    }
}

pub fn fit_trend(series: &HistoricalSeries) -> Option<TrendFit> {
    let first = series.first_date()?;
    let xy: Vec<(f64, f64)> = series
        .points
        .iter()
        .filter_map(|p| Some(((p.date - first).num_days() as f64, p.price.to_f64()?)))
        .collect();
    if xy.len() < MIN_POINTS {
        return None;
    }

    let n = xy.len() as f64;
    let mean_x = xy.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = xy.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (sxx, sxy) = xy.iter().fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
        let dx = x - mean_x;
        (sxx + dx * dx, sxy + dx * (y - mean_y))
    });

    // All observations on one day: no slope to speak of.
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    Some(TrendFit {
        slope,
        intercept: mean_y - slope * mean_x,
        mean_price: mean_y,
    })
}

/// One point per day after the latest observation, up to the configured horizon.
///
/// Returns an empty sequence for short series or a zero horizon. Identical input always yields
/// identical output.
pub fn forecast(series: &HistoricalSeries, cfg: &ForecastConfig) -> Vec<ForecastPoint> {
    if cfg.horizon_days == 0 {
        return Vec::new();
    }
    let (Some(fit), Some(first), Some(latest)) =
        (fit_trend(series), series.first_date(), series.latest_date())
    else {
        return Vec::new();
    };

    let direction = fit.direction(cfg.trend_epsilon_ratio);
    let latest_x = (latest - first).num_days();

    (1..=i64::from(cfg.horizon_days))
        .filter_map(|k| {
            let date = latest.checked_add_signed(Duration::days(k))?;
            let predicted = Decimal::from_f64(fit.predict((latest_x + k) as f64))?;
            Some(ForecastPoint {
                date,
                predicted_price: predicted.round_dp(2),
                trend_direction: direction,
            })
        })
        .collect()
}
