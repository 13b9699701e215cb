use crate::config::Settings;
use crate::domain::route::Route;
use crate::ingest::types::{raw_quotes_from_response, RawQuote};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PATH: &str = "/v1/flight-quotes";
const DEFAULT_RETRIES: u32 = 3;

/// Upstream flight search, called once per route and departure date.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn search(&self, route: &Route, date: NaiveDate) -> Result<Vec<RawQuote>>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonSearchProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpJsonSearchProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_search_base_url()?.to_string();

        let timeout_secs = std::env::var("FLIGHT_SEARCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("FLIGHT_SEARCH_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let path = std::env::var("FLIGHT_SEARCH_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let mut provider = Self::new(
            base_url,
            settings.search_api_key.clone(),
            Duration::from_secs(timeout_secs),
        )?;
        provider.path = path;
        provider.retries = retries;
        Ok(provider)
    }

    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build flight search http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path: DEFAULT_PATH.to_string(),
            retries: DEFAULT_RETRIES,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn search_once(&self, route: &Route, date: NaiveDate) -> Result<Vec<RawQuote>> {
        let res = self
            .http
            .get(self.url())
            .headers(self.headers()?)
            .query(&[
                ("origin", route.origin.clone()),
                ("destination", route.destination.clone()),
                ("departure_date", date.to_string()),
                ("adults", "1".to_string()),
            ])
            .send()
            .await
            .context("flight search request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read flight search response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("flight search response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("flight search HTTP {status}: {raw_json}");
        }

        raw_quotes_from_response(raw_json)
    }
}

#[async_trait::async_trait]
impl SearchProvider for HttpJsonSearchProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn search(&self, route: &Route, date: NaiveDate) -> Result<Vec<RawQuote>> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.search_once(route, date).await {
                Ok(quotes) => return Ok(quotes),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err.context(format!("{route} on {date}")));
                    }
                    let backoff = Duration::from_millis(250 << (attempt - 1).min(6));
                    tracing::warn!(attempt, %route, %date, ?backoff, error = %err, "flight search failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
