use anyhow::bail;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One upstream quote record, schema unknown until normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawQuote(pub Value);

impl From<Value> for RawQuote {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Pulls the record list out of a search response body.
///
/// Accepts a bare array or an object carrying the records under `quotes`, `flights` or `data`.
pub fn raw_quotes_from_response(body: Value) -> anyhow::Result<Vec<RawQuote>> {
    let records = match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            let key = ["quotes", "flights", "data"]
                .into_iter()
                .find(|k| obj.get(*k).is_some_and(Value::is_array));
            match key.and_then(|k| obj.remove(k)) {
                Some(Value::Array(items)) => items,
                _ => bail!("search response has no quotes/flights/data array"),
            }
        }
        other => bail!("search response must be an array or object (got {other})"),
    };

    Ok(records.into_iter().map(RawQuote).collect())
}
