use crate::domain::history::HistoricalSeries;
use chrono::{Datelike, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayAverage {
    pub weekday: Weekday,
    pub average_price: Decimal,
    pub samples: usize,
}

/// Which day of the week the route has historically been cheapest on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayInsight {
    pub cheapest_weekday: Weekday,
    pub dearest_weekday: Weekday,
    /// Gap between the dearest and cheapest weekday averages.
    pub potential_savings: Decimal,
    pub sample_size: usize,
    pub by_weekday: Vec<WeekdayAverage>,
}

/// `None` when the series holds fewer than `min_points` observations.
pub fn weekday_insight(series: &HistoricalSeries, min_points: usize) -> Option<WeekdayInsight> {
    if series.len() < min_points.max(1) {
        return None;
    }

    let mut sums = [(Decimal::ZERO, 0usize); 7];
    for p in &series.points {
        let slot = &mut sums[p.date.weekday().num_days_from_monday() as usize];
        slot.0 += p.price;
        slot.1 += 1;
    }

    let by_weekday: Vec<WeekdayAverage> = sums
        .iter()
        .enumerate()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(idx, (sum, count))| WeekdayAverage {
            weekday: weekday_from_monday(idx),
            average_price: (*sum / Decimal::from(*count)).round_dp(2),
            samples: *count,
        })
        .collect();

    // Ties go to the earlier weekday.
    let cheapest = by_weekday
        .iter()
        .min_by(|a, b| a.average_price.cmp(&b.average_price))?;
    let dearest = by_weekday
        .iter()
        .rev()
        .max_by(|a, b| a.average_price.cmp(&b.average_price))?;
    let (cheapest_weekday, dearest_weekday) = (cheapest.weekday, dearest.weekday);
    let potential_savings = dearest.average_price - cheapest.average_price;

    Some(WeekdayInsight {
        cheapest_weekday,
        dearest_weekday,
        potential_savings,
        sample_size: series.len(),
        by_weekday,
    })
}

fn weekday_from_monday(idx: usize) -> Weekday {
    match idx {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::PricePoint;
    use crate::domain::route::Route;
    use chrono::{Duration, NaiveDate};

    fn two_weeks(weekend_premium: i64) -> HistoricalSeries {
        // 2026-03-02 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let points = (0..14)
            .map(|i| {
                let date = monday + Duration::days(i);
                let base = if date.weekday() == Weekday::Tue { 180 } else { 200 };
                let premium = if i % 7 >= 5 { weekend_premium } else { 0 };
                PricePoint {
                    date,
                    price: Decimal::from(base + premium),
                }
            })
            .collect();
        HistoricalSeries::new(Route::new("JFK", "MIA").unwrap(), points)
    }

    #[test]
    fn finds_cheapest_and_dearest_weekday() {
        let insight = weekday_insight(&two_weeks(40), 14).unwrap();
        assert_eq!(insight.cheapest_weekday, Weekday::Tue);
        assert_eq!(insight.dearest_weekday, Weekday::Sat);
        assert_eq!(insight.potential_savings, Decimal::from(60));
        assert_eq!(insight.by_weekday.len(), 7);
        assert!(insight.by_weekday.iter().all(|w| w.samples == 2));
    }

    #[test]
    fn requires_enough_history() {
        assert!(weekday_insight(&two_weeks(0), 15).is_none());
        assert!(weekday_insight(&two_weeks(0), 14).is_some());
    }
}
