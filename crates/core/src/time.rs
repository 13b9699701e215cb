use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};

/// The observation date a query is evaluated and recorded under: an explicit `YYYY-MM-DD`
/// argument, else today's UTC date.
pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    match as_of_date_arg.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("as-of date must be YYYY-MM-DD (got {s:?})")),
        None => Ok(now_utc.date_naive()),
    }
}
