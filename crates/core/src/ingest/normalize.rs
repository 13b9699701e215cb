//! Turns heterogeneous upstream quote records into canonical [`PriceQuote`]s.
//!
//! Two record shapes are understood: a flat one (`origin`, `destination`, `date`, `price`, ...)
//! and the nested flight-offer shape (`price.total`, `itineraries[0].segments[..]`, ...).
//! Records that cannot be priced, dated or routed are skipped, never fatal.

use crate::domain::quote::{Money, PriceQuote};
use crate::domain::route::Route;
use crate::error::ValidationError;
use crate::ingest::types::RawQuote;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

const UNKNOWN_AIRLINE: &str = "UNKNOWN";
const DEFAULT_FARE_CLASS: &str = "ECONOMY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeConfig {
    /// Currency every quote is converted into.
    pub currency: String,
    /// `1 unit of key = value units of currency`.
    pub fx_rates: BTreeMap<String, Decimal>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            fx_rates: BTreeMap::new(),
        }
    }
}

impl NormalizeConfig {
    fn rate_for(&self, currency: &str) -> Option<Decimal> {
        if currency.eq_ignore_ascii_case(&self.currency) {
            return Some(Decimal::ONE);
        }
        self.fx_rates.get(&currency.to_ascii_uppercase()).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub quotes: Vec<PriceQuote>,
    pub skipped: usize,
}

#[derive(Debug, Error)]
enum SkipReason {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("missing price")]
    MissingPrice,
    #[error("invalid price {0}")]
    InvalidPrice(String),
    #[error("missing date")]
    MissingDate,
    #[error("missing route")]
    MissingRoute,
    #[error("invalid route: {0}")]
    InvalidRoute(#[from] ValidationError),
    #[error("no exchange rate for {0}")]
    UnknownCurrency(String),
}

pub fn normalize_quotes(raw: &[RawQuote], cfg: &NormalizeConfig) -> Normalized {
    let mut best: BTreeMap<(Route, NaiveDate, String, String), PriceQuote> = BTreeMap::new();
    let mut skipped = 0;

    for (idx, record) in raw.iter().enumerate() {
        let quote = match parse_record(&record.0, cfg) {
            Ok(q) => q,
            Err(reason) => {
                skipped += 1;
                tracing::debug!(idx, %reason, "skipping raw quote");
                continue;
            }
        };

        let key = (
            quote.route.clone(),
            quote.date,
            quote.airline.clone(),
            quote.fare_class.clone(),
        );
        match best.get(&key) {
            Some(existing) if !is_better_duplicate(&quote, existing) => {}
            _ => {
                best.insert(key, quote);
            }
        }
    }

    let mut quotes: Vec<PriceQuote> = best.into_values().collect();
    quotes.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then(a.price.amount.cmp(&b.price.amount))
            .then_with(|| a.airline.cmp(&b.airline))
            .then_with(|| a.fare_class.cmp(&b.fare_class))
    });

    if skipped > 0 {
        tracing::debug!(skipped, kept = quotes.len(), "normalized quotes with skips");
    }

    Normalized { quotes, skipped }
}

fn is_better_duplicate(candidate: &PriceQuote, existing: &PriceQuote) -> bool {
    match candidate.price.amount.cmp(&existing.price.amount) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => {
            duration_rank(candidate.duration_minutes) < duration_rank(existing.duration_minutes)
        }
    }
}

/// Unknown durations sort after every known one.
pub(crate) fn duration_rank(minutes: Option<u32>) -> u32 {
    minutes.unwrap_or(u32::MAX)
}

#[derive(Debug, Default)]
struct RawFields<'a> {
    origin: Option<&'a str>,
    destination: Option<&'a str>,
    date: Option<NaiveDate>,
    price: Option<&'a Value>,
    currency: Option<&'a str>,
    airline: Option<&'a str>,
    fare_class: Option<&'a str>,
    duration_minutes: Option<u32>,
    stops: Option<u32>,
}

fn parse_record(v: &Value, cfg: &NormalizeConfig) -> Result<PriceQuote, SkipReason> {
    if !v.is_object() {
        return Err(SkipReason::NotAnObject);
    }

    let fields = if v.get("itineraries").is_some() {
        offer_fields(v)
    } else {
        flat_fields(v)
    };

    fields.into_quote(cfg)
}

fn flat_fields(v: &Value) -> RawFields<'_> {
    let price = v.get("price");
    // `price` may itself be an object carrying `total` and `currency`.
    let (price, nested_currency) = match price {
        Some(p) if p.is_object() => (
            p.get("total").or_else(|| p.get("amount")),
            p.get("currency").and_then(Value::as_str),
        ),
        other => (other, None),
    };

    RawFields {
        origin: first_str(v, &["origin", "from"]),
        destination: first_str(v, &["destination", "to"]),
        date: first_str(v, &["date", "departure_date", "departureDate", "departure_at"])
            .and_then(parse_date),
        price,
        currency: first_str(v, &["currency"]).or(nested_currency),
        airline: first_str(v, &["airline", "carrier", "carrierCode"]),
        fare_class: first_str(v, &["fare_class", "booking_class", "cabin"]),
        duration_minutes: ["duration_minutes", "duration"]
            .iter()
            .find_map(|k| v.get(*k).and_then(parse_duration)),
        stops: v.get("stops").and_then(Value::as_u64).map(saturating_u32),
    }
}

fn offer_fields(v: &Value) -> RawFields<'_> {
    let segments = v
        .pointer("/itineraries/0/segments")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let first = segments.first();
    let last = segments.last();

    RawFields {
        origin: first.and_then(|s| s.pointer("/departure/iataCode")).and_then(Value::as_str),
        destination: last.and_then(|s| s.pointer("/arrival/iataCode")).and_then(Value::as_str),
        date: first
            .and_then(|s| s.pointer("/departure/at"))
            .and_then(Value::as_str)
            .and_then(parse_date),
        price: v
            .pointer("/price/grandTotal")
            .or_else(|| v.pointer("/price/total")),
        currency: v.pointer("/price/currency").and_then(Value::as_str),
        airline: first
            .and_then(|s| s.get("carrierCode"))
            .or_else(|| v.pointer("/validatingAirlineCodes/0"))
            .and_then(Value::as_str),
        fare_class: v
            .pointer("/travelerPricings/0/fareDetailsBySegment/0/cabin")
            .and_then(Value::as_str),
        duration_minutes: v.pointer("/itineraries/0/duration").and_then(parse_duration),
        stops: (!segments.is_empty()).then(|| saturating_u32(segments.len() as u64 - 1)),
    }
}

impl RawFields<'_> {
    fn into_quote(self, cfg: &NormalizeConfig) -> Result<PriceQuote, SkipReason> {
        let amount = parse_price(self.price.ok_or(SkipReason::MissingPrice)?)?;
        let date = self.date.ok_or(SkipReason::MissingDate)?;
        let (origin, destination) = self
            .origin
            .zip(self.destination)
            .ok_or(SkipReason::MissingRoute)?;
        let route = Route::new(origin, destination)?;

        let currency = self.currency.unwrap_or(&cfg.currency);
        let rate = cfg
            .rate_for(currency)
            .ok_or_else(|| SkipReason::UnknownCurrency(currency.to_string()))?;
        let converted = amount
            .checked_mul(rate)
            .map(|c| c.round_dp(2))
            .filter(|c| *c <= Money::MAX_AMOUNT)
            .ok_or_else(|| SkipReason::InvalidPrice(amount.to_string()))?;

        Ok(PriceQuote {
            route,
            date,
            price: Money::new(converted, cfg.currency.clone()),
            airline: label_or(self.airline, UNKNOWN_AIRLINE),
            fare_class: label_or(self.fare_class, DEFAULT_FARE_CLASS),
            duration_minutes: self.duration_minutes,
            stops: self.stops,
        })
    }
}

fn parse_price(v: &Value) -> Result<Decimal, SkipReason> {
    let amount = match v {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Decimal::from(i)
            } else {
                let f = n
                    .as_f64()
                    .filter(|f| f.is_finite())
                    .ok_or_else(|| SkipReason::InvalidPrice(n.to_string()))?;
                // f64's Display is the shortest round-trip form and never uses exponents.
                Decimal::from_str(&f.to_string())
                    .map_err(|_| SkipReason::InvalidPrice(n.to_string()))?
            }
        }
        Value::String(s) => {
            Decimal::from_str(s.trim()).map_err(|_| SkipReason::InvalidPrice(s.clone()))?
        }
        Value::Null => return Err(SkipReason::MissingPrice),
        other => return Err(SkipReason::InvalidPrice(other.to_string())),
    };

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(SkipReason::InvalidPrice(amount.to_string()));
    }
    Ok(amount)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let head = s.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Minutes from `PT5H20M`, `P1DT2H`, `5h 20m`, `320` or a bare integer.
pub(crate) fn parse_duration(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().map(saturating_u32),
        Value::String(s) => parse_duration_str(s),
        _ => None,
    }
}

fn parse_duration_str(s: &str) -> Option<u32> {
    let upper = s.trim().to_ascii_uppercase();
    let body = upper.strip_prefix('P').unwrap_or(&upper);

    let mut minutes: u32 = 0;
    let mut digits = String::new();
    let mut saw_unit = false;
    for c in body.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'T' | ' ' => {}
            'D' | 'H' | 'M' | 'S' => {
                let n: u32 = digits.parse().ok()?;
                digits.clear();
                let scaled = match c {
                    'D' => n.saturating_mul(24 * 60),
                    'H' => n.saturating_mul(60),
                    'M' => n,
                    _ => n / 60,
                };
                minutes = minutes.saturating_add(scaled);
                saw_unit = true;
            }
            _ => return None,
        }
    }

    if !digits.is_empty() {
        return if saw_unit { None } else { digits.parse().ok() };
    }
    saw_unit.then_some(minutes)
}

fn first_str<'a>(v: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| v.get(*k).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}

fn label_or(label: Option<&str>, fallback: &str) -> String {
    label
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_ascii_uppercase()
}

fn saturating_u32(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg() -> NormalizeConfig {
        let mut fx_rates = BTreeMap::new();
        fx_rates.insert("EUR".to_string(), Decimal::new(110, 2));
        NormalizeConfig {
            currency: "USD".to_string(),
            fx_rates,
        }
    }

    fn raw(values: Vec<Value>) -> Vec<RawQuote> {
        values.into_iter().map(RawQuote).collect()
    }

    #[test]
    fn parses_flat_records() {
        let out = normalize_quotes(
            &raw(vec![json!({
                "origin": "jfk",
                "destination": "lax",
                "date": "2026-11-02",
                "price": 279.5,
                "airline": "JetBlue",
                "booking_class": "Economy",
                "duration": "5h 20m",
                "stops": 0
            })]),
            &cfg(),
        );

        assert_eq!(out.skipped, 0);
        let q = &out.quotes[0];
        assert_eq!(q.route.key(), "JFK-LAX");
        assert_eq!(q.date, NaiveDate::from_ymd_opt(2026, 11, 2).unwrap());
        assert_eq!(q.price, Money::new(Decimal::new(27950, 2), "USD"));
        assert_eq!(q.airline, "JETBLUE");
        assert_eq!(q.fare_class, "ECONOMY");
        assert_eq!(q.duration_minutes, Some(320));
        assert_eq!(q.stops, Some(0));
    }

    #[test]
    fn parses_flight_offer_records_and_converts_currency() {
        let offer = json!({
            "price": {"currency": "EUR", "total": "200.00", "grandTotal": "210.00"},
            "itineraries": [{
                "duration": "PT13H5M",
                "segments": [
                    {"carrierCode": "SQ", "departure": {"iataCode": "SIN", "at": "2026-11-02T08:30:00"}, "arrival": {"iataCode": "FRA"}},
                    {"carrierCode": "LH", "departure": {"iataCode": "FRA", "at": "2026-11-02T18:00:00"}, "arrival": {"iataCode": "JFK"}}
                ]
            }],
            "travelerPricings": [{"fareDetailsBySegment": [{"cabin": "BUSINESS"}]}]
        });

        let out = normalize_quotes(&raw(vec![offer]), &cfg());
        let q = &out.quotes[0];
        assert_eq!(q.route.key(), "SIN-JFK");
        assert_eq!(q.airline, "SQ");
        assert_eq!(q.fare_class, "BUSINESS");
        assert_eq!(q.price.amount, Decimal::new(23100, 2));
        assert_eq!(q.price.currency, "USD");
        assert_eq!(q.duration_minutes, Some(13 * 60 + 5));
        assert_eq!(q.stops, Some(1));
    }

    #[test]
    fn skips_records_missing_required_fields() {
        let out = normalize_quotes(
            &raw(vec![
                json!({"origin": "JFK", "destination": "LAX", "date": "2026-11-02"}),
                json!({"origin": "JFK", "destination": "LAX", "price": 100}),
                json!({"origin": "JFK", "date": "2026-11-02", "price": 100}),
                json!({"origin": "JFK", "destination": "JFK", "date": "2026-11-02", "price": 100}),
                json!("not a record"),
                json!({"origin": "JFK", "destination": "LAX", "date": "2026-11-02", "price": 100}),
            ]),
            &cfg(),
        );
        assert_eq!(out.skipped, 5);
        assert_eq!(out.quotes.len(), 1);
    }

    #[test]
    fn rejects_negative_and_non_numeric_prices() {
        let base = |price: Value| {
            json!({"origin": "JFK", "destination": "LAX", "date": "2026-11-02", "price": price})
        };
        let out = normalize_quotes(
            &raw(vec![
                base(json!(-1)),
                base(json!("NaN")),
                base(json!("12abc")),
                base(json!(true)),
                base(json!(0)),
            ]),
            &cfg(),
        );
        assert_eq!(out.skipped, 4);
        assert_eq!(out.quotes[0].price.amount, Decimal::ZERO);
    }

    #[test]
    fn skips_prices_that_overflow_conversion() {
        let out = normalize_quotes(
            &raw(vec![
                json!({
                    "origin": "JFK", "destination": "LAX", "date": "2026-11-02",
                    "price": "79228162514264337593543950335", "currency": "EUR"
                }),
                json!({
                    "origin": "JFK", "destination": "LAX", "date": "2026-11-02",
                    "price": "9999999999.99", "currency": "EUR"
                }),
                json!({
                    "origin": "JFK", "destination": "LAX", "date": "2026-11-02",
                    "price": 100, "currency": "EUR", "airline": "AA"
                }),
            ]),
            &cfg(),
        );
        assert_eq!(out.skipped, 2);
        assert_eq!(out.quotes.len(), 1);
        assert_eq!(out.quotes[0].price.amount, Decimal::new(11000, 2));
    }

    #[test]
    fn skips_unknown_currency() {
        let out = normalize_quotes(
            &raw(vec![json!({
                "origin": "JFK", "destination": "LAX", "date": "2026-11-02",
                "price": 100, "currency": "JPY"
            })]),
            &cfg(),
        );
        assert_eq!(out.skipped, 1);
        assert!(out.quotes.is_empty());
    }

    #[test]
    fn deduplicates_keeping_lowest_price_per_itinerary() {
        let rec = |price: i64, fare: &str| {
            json!({
                "origin": "JFK", "destination": "LAX", "date": "2026-11-02",
                "price": price, "airline": "Delta", "fare_class": fare
            })
        };
        let out = normalize_quotes(
            &raw(vec![
                rec(320, "economy"),
                rec(300, "ECONOMY"),
                rec(310, "economy"),
                rec(900, "business"),
            ]),
            &cfg(),
        );

        assert_eq!(out.quotes.len(), 2);
        assert_eq!(out.quotes[0].price.amount, Decimal::from(300));
        assert_eq!(out.quotes[0].fare_class, "ECONOMY");
        assert_eq!(out.quotes[1].fare_class, "BUSINESS");
    }

    #[test]
    fn equal_price_duplicates_prefer_shorter_duration() {
        let rec = |duration: &str| {
            json!({
                "origin": "JFK", "destination": "LAX", "date": "2026-11-02",
                "price": 300, "airline": "Delta", "duration": duration
            })
        };
        let out = normalize_quotes(&raw(vec![rec("PT7H"), rec("PT5H30M")]), &cfg());
        assert_eq!(out.quotes.len(), 1);
        assert_eq!(out.quotes[0].duration_minutes, Some(330));
    }

    #[test]
    fn duration_formats() {
        assert_eq!(parse_duration_str("PT5H20M"), Some(320));
        assert_eq!(parse_duration_str("P1DT2H"), Some(26 * 60));
        assert_eq!(parse_duration_str("5h 20m"), Some(320));
        assert_eq!(parse_duration_str("95"), Some(95));
        assert_eq!(parse_duration_str("five hours"), None);
        assert_eq!(parse_duration_str(""), None);
        assert_eq!(parse_duration(&json!(45)), Some(45));
    }
}
