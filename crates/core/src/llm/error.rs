use crate::llm::Provider;
use serde_json::Value;
use thiserror::Error;

/// Explainer failure carrying what the provider actually sent back.
#[derive(Debug, Clone, Error)]
#[error("explainer error (provider={provider:?}, stage={stage}): {detail}")]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: ExplainStage,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainStage {
    Http,
    Decode,
    EmptyOutput,
}

impl std::fmt::Display for ExplainStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Decode => "decode",
            Self::EmptyOutput => "empty_output",
        })
    }
}
