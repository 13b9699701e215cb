use crate::ingest::NormalizeConfig;
use crate::pricing::{ClassifierConfig, ForecastConfig};
use anyhow::Context;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertConfig {
    /// Alert when the current price is below `mean × drop_ratio`.
    pub drop_ratio: Decimal,
    /// Below `mean × high_ratio` the alert is urgent.
    pub high_ratio: Decimal,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            drop_ratio: Decimal::new(8, 1),
            high_ratio: Decimal::new(7, 1),
        }
    }
}

/// Every tunable of the price engine. Passed explicitly to each component.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub normalize: NormalizeConfig,
    /// Baseline window in days (0 = all history).
    pub lookback_days: u32,
    pub forecast: ForecastConfig,
    pub classifier: ClassifierConfig,
    pub max_flexibility_days: u32,
    /// Upper bound on concurrent per-date searches.
    pub search_concurrency: usize,
    pub search_timeout: Duration,
    pub record_observations: bool,
    pub alerts: AlertConfig,
    /// Observations needed before a weekday insight is reported.
    pub insight_min_points: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeConfig::default(),
            lookback_days: 30,
            forecast: ForecastConfig::default(),
            classifier: ClassifierConfig::default(),
            max_flexibility_days: 14,
            search_concurrency: 4,
            search_timeout: Duration::from_secs(20),
            record_observations: true,
            alerts: AlertConfig::default(),
            insight_min_points: 14,
        }
    }
}

impl EngineConfig {
    /// Reads `FARE_*` overrides; unset or unparsable values keep their defaults.
    /// Only a malformed `FARE_FX_RATES` list is an error.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut out = Self::default();

        if let Some(s) = var("FARE_CURRENCY") {
            out.normalize.currency = s.trim().to_ascii_uppercase();
        }
        if let Some(s) = var("FARE_FX_RATES") {
            out.normalize.fx_rates = parse_fx_rates(&s).context("FARE_FX_RATES is malformed")?;
        }

        set_parsed("FARE_LOOKBACK_DAYS", &mut out.lookback_days);
        set_parsed("FARE_FORECAST_HORIZON_DAYS", &mut out.forecast.horizon_days);
        set_parsed(
            "FARE_TREND_EPSILON_RATIO",
            &mut out.forecast.trend_epsilon_ratio,
        );
        set_parsed(
            "FARE_BUDGET_TOLERANCE",
            &mut out.classifier.budget_tolerance,
        );
        set_parsed(
            "FARE_CONFIDENCE_HALF_SAMPLE",
            &mut out.classifier.confidence_half_sample,
        );
        set_parsed("FARE_MAX_FLEXIBILITY_DAYS", &mut out.max_flexibility_days);
        set_parsed("FARE_SEARCH_CONCURRENCY", &mut out.search_concurrency);
        set_parsed("FARE_RECORD_OBSERVATIONS", &mut out.record_observations);
        set_parsed("FARE_INSIGHT_MIN_POINTS", &mut out.insight_min_points);
        set_parsed("FARE_ALERT_DROP_RATIO", &mut out.alerts.drop_ratio);
        set_parsed("FARE_ALERT_HIGH_RATIO", &mut out.alerts.high_ratio);

        let mut timeout_secs = out.search_timeout.as_secs();
        set_parsed("FARE_SEARCH_TIMEOUT_SECS", &mut timeout_secs);
        out.search_timeout = Duration::from_secs(timeout_secs);

        out.search_concurrency = out.search_concurrency.max(1);
        Ok(out)
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn set_parsed<T: FromStr>(key: &str, slot: &mut T) {
    if let Some(s) = var(key) {
        match s.trim().parse::<T>() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, value = %s, "ignoring unparsable setting"),
        }
    }
}

/// Parses `EUR=1.08,SGD=0.74` into upper-cased currency codes and rates.
pub fn parse_fx_rates(s: &str) -> anyhow::Result<BTreeMap<String, Decimal>> {
    let mut out = BTreeMap::new();
    for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (code, rate) = pair
            .split_once('=')
            .with_context(|| format!("expected CODE=RATE, got {pair:?}"))?;
        let code = code.trim().to_ascii_uppercase();
        anyhow::ensure!(
            code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()),
            "invalid currency code {code:?}"
        );
        let rate = Decimal::from_str(rate.trim())
            .with_context(|| format!("invalid rate for {code}: {rate:?}"))?;
        anyhow::ensure!(rate > Decimal::ZERO, "rate for {code} must be positive");
        out.insert(code, rate);
    }
    Ok(out)
}
