//! Percentile baseline over a route's recent price history.
//!
//! Percentiles use the interpolated-rank method: for `n` sorted samples the `p`th percentile sits
//! at rank `p/100 * (n - 1)` and is interpolated linearly between its two neighbours. This is
//! stable for small samples and matches numpy's default `percentile`.

use crate::domain::baseline::{Baseline, PercentileBaseline};
use crate::domain::history::HistoricalSeries;
use chrono::Duration;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Fewer samples than this and the baseline is unavailable.
pub const MIN_SAMPLES: usize = 2;

/// Builds the baseline from the observations within `lookback_days` of the most recent one.
/// A lookback of zero keeps the whole series.
pub fn build_baseline(series: &HistoricalSeries, lookback_days: u32) -> Baseline {
    let (Some(first), Some(latest)) = (series.first_date(), series.latest_date()) else {
        return Baseline::Unavailable { sample_size: 0 };
    };

    let window_start = if lookback_days == 0 {
        first
    } else {
        latest
            .checked_sub_signed(Duration::days(i64::from(lookback_days) - 1))
            .map_or(first, |start| start.max(first))
    };

    let mut prices: Vec<Decimal> = series
        .points
        .iter()
        .filter(|p| p.date >= window_start)
        .map(|p| p.price)
        .collect();

    if prices.len() < MIN_SAMPLES {
        return Baseline::Unavailable {
            sample_size: prices.len(),
        };
    }

    prices.sort();

    let n = Decimal::from(prices.len());
    let mean = prices.iter().copied().sum::<Decimal>() / n;
    let variance = prices
        .iter()
        .map(|p| (*p - mean) * (*p - mean))
        .sum::<Decimal>()
        / n;
    let std_dev = variance
        .to_f64()
        .map(f64::sqrt)
        .and_then(Decimal::from_f64)
        .unwrap_or_default();

    Baseline::Available(PercentileBaseline {
        p10: percentile(&prices, 10),
        p50: percentile(&prices, 50),
        p90: percentile(&prices, 90),
        sample_size: prices.len(),
        mean: mean.round_dp(2),
        std_dev: std_dev.round_dp(2),
        window_start,
        window_end: latest,
    })
}

/// Interpolated-rank percentile of an ascending, non-empty slice. `pct` is in `0..=100`.
fn percentile(sorted: &[Decimal], pct: usize) -> Decimal {
    let last = sorted.len() - 1;
    // rank = pct/100 * last, split into integer and hundredths without rounding.
    let scaled = pct.min(100) * last;
    let lo = scaled / 100;
    let hi = (lo + 1).min(last);
    let frac = Decimal::new((scaled % 100) as i64, 2);

    (sorted[lo] + (sorted[hi] - sorted[lo]) * frac).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::PricePoint;
    use crate::domain::route::Route;
    use chrono::NaiveDate;

    fn series(prices: &[i64]) -> HistoricalSeries {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, p)| PricePoint {
                date: start + Duration::days(i as i64),
                price: Decimal::from(*p),
            })
            .collect();
        HistoricalSeries::new(Route::new("JFK", "LAX").unwrap(), points)
    }

    fn available(b: Baseline) -> PercentileBaseline {
        match b {
            Baseline::Available(b) => b,
            other => panic!("expected available baseline, got {other:?}"),
        }
    }

    #[test]
    fn interpolates_between_ranks() {
        let b = available(build_baseline(&series(&[500, 100, 300, 200, 400]), 0));
        assert_eq!(b.p10, Decimal::from(140));
        assert_eq!(b.p50, Decimal::from(300));
        assert_eq!(b.p90, Decimal::from(460));
        assert_eq!(b.sample_size, 5);
        assert_eq!(b.mean, Decimal::from(300));
    }

    #[test]
    fn two_samples_are_enough() {
        let b = available(build_baseline(&series(&[100, 200]), 30));
        assert_eq!(b.p10, Decimal::from(110));
        assert_eq!(b.p50, Decimal::from(150));
        assert_eq!(b.p90, Decimal::from(190));
        assert_eq!(b.std_dev, Decimal::from(50));
    }

    #[test]
    fn small_or_empty_series_is_unavailable() {
        assert_eq!(
            build_baseline(&series(&[]), 30),
            Baseline::Unavailable { sample_size: 0 }
        );
        assert_eq!(
            build_baseline(&series(&[250]), 30),
            Baseline::Unavailable { sample_size: 1 }
        );
    }

    #[test]
    fn identical_prices_collapse_percentiles() {
        let b = available(build_baseline(&series(&[320, 320, 320, 320]), 30));
        assert_eq!(b.p10, b.p50);
        assert_eq!(b.p50, b.p90);
        assert_eq!(b.std_dev, Decimal::ZERO);
    }

    #[test]
    fn lookback_window_is_anchored_at_latest_observation() {
        // 10 daily points; a 3-day window keeps the last three.
        let b = available(build_baseline(
            &series(&[900, 900, 900, 900, 900, 900, 900, 100, 200, 300]),
            3,
        ));
        assert_eq!(b.sample_size, 3);
        assert_eq!(b.p50, Decimal::from(200));
        assert_eq!(b.window_start, NaiveDate::from_ymd_opt(2026, 1, 8).unwrap());
        assert_eq!(b.window_end, NaiveDate::from_ymd_opt(2026, 1, 10).unwrap());

        // A window holding a single point is unavailable.
        assert_eq!(
            build_baseline(&series(&[100, 200]), 1),
            Baseline::Unavailable { sample_size: 1 }
        );
    }

    #[test]
    fn percentiles_are_monotonic() {
        // Deterministic pseudo-random series of varying length.
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        for len in 2..60 {
            let prices: Vec<i64> = (0..len)
                .map(|_| {
                    state = state
                        .wrapping_mul(6364136223846793005)
                        .wrapping_add(1442695040888963407);
                    50 + ((state >> 33) % 950) as i64
                })
                .collect();
            let b = available(build_baseline(&series(&prices), 0));
            assert!(b.p10 <= b.p50, "p10 > p50 for {prices:?}");
            assert!(b.p50 <= b.p90, "p50 > p90 for {prices:?}");
            assert_eq!(b.sample_size, prices.len());
        }
    }
}
