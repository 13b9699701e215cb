use crate::domain::route::Route;
use crate::ingest::provider::SearchProvider;
use crate::ingest::types::RawQuote;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Scripted {
    Quotes(Vec<RawQuote>),
    Fail(String),
    Delayed(Duration, Vec<RawQuote>),
}

/// Search collaborator answering from a fixed script; used for fixtures and tests.
///
/// Unscripted route/date pairs answer with no quotes.
#[derive(Debug, Clone, Default)]
pub struct InMemorySearchProvider {
    script: BTreeMap<(Route, NaiveDate), Scripted>,
}

#[derive(Debug, Deserialize)]
struct FixtureSearch {
    route: String,
    date: NaiveDate,
    #[serde(default)]
    quotes: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl InMemorySearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quotes(mut self, route: &Route, date: NaiveDate, quotes: Vec<Value>) -> Self {
        let quotes = quotes.into_iter().map(RawQuote).collect();
        self.script
            .insert((route.clone(), date), Scripted::Quotes(quotes));
        self
    }

    pub fn failing_on(mut self, route: &Route, date: NaiveDate, message: &str) -> Self {
        self.script
            .insert((route.clone(), date), Scripted::Fail(message.to_string()));
        self
    }

    pub fn delayed_on(
        mut self,
        route: &Route,
        date: NaiveDate,
        delay: Duration,
        quotes: Vec<Value>,
    ) -> Self {
        let quotes = quotes.into_iter().map(RawQuote).collect();
        self.script
            .insert((route.clone(), date), Scripted::Delayed(delay, quotes));
        self
    }

    /// Loads `{"searches": [{"route": "JFK-LAX", "date": "...", "quotes": [...]}, ...]}`.
    /// An entry with `error` instead of `quotes` scripts a failing search.
    pub fn from_fixture(fixture: &Value) -> Result<Self> {
        let Some(searches) = fixture.get("searches") else {
            return Ok(Self::new());
        };
        let searches: Vec<FixtureSearch> = serde_json::from_value(searches.clone())
            .context("fixture `searches` has an unexpected shape")?;

        let mut out = Self::new();
        for s in searches {
            let route = Route::parse_key(&s.route)
                .with_context(|| format!("fixture route {:?} is invalid", s.route))?;
            out = match s.error {
                Some(message) => out.failing_on(&route, s.date, &message),
                None => out.with_quotes(&route, s.date, s.quotes),
            };
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl SearchProvider for InMemorySearchProvider {
    fn provider_name(&self) -> &'static str {
        "in_memory"
    }

    async fn search(&self, route: &Route, date: NaiveDate) -> Result<Vec<RawQuote>> {
        match self.script.get(&(route.clone(), date)) {
            None => Ok(Vec::new()),
            Some(Scripted::Quotes(quotes)) => Ok(quotes.clone()),
            Some(Scripted::Fail(message)) => bail!("{message}"),
            Some(Scripted::Delayed(delay, quotes)) => {
                tokio::time::sleep(*delay).await;
                Ok(quotes.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn answers_from_fixture() {
        let route = Route::new("JFK", "LAX").unwrap();
        let d1 = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 11, 3).unwrap();
        let provider = InMemorySearchProvider::from_fixture(&json!({
            "searches": [
                {"route": "JFK-LAX", "date": d1, "quotes": [{"price": 1}]},
                {"route": "JFK-LAX", "date": d2, "error": "upstream 503"}
            ]
        }))
        .unwrap();

        assert_eq!(provider.search(&route, d1).await.unwrap().len(), 1);
        let err = provider.search(&route, d2).await.unwrap_err();
        assert!(err.to_string().contains("upstream 503"));
        assert!(provider.search(&route.reversed(), d1).await.unwrap().is_empty());
    }

    #[test]
    fn rejects_fixture_with_bad_route() {
        let res = InMemorySearchProvider::from_fixture(&json!({
            "searches": [{"route": "NOWHERE", "date": "2026-11-02", "quotes": []}]
        }));
        assert!(res.is_err());
    }
}
