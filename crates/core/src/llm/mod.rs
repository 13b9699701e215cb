pub mod anthropic;
pub mod error;
pub mod fallback;
pub mod json;

pub use anthropic::AnthropicExplainer;

use crate::engine::PriceAdvice;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Anthropic,
}

/// Turns finished advice into prose. Never influences the decision itself.
#[async_trait::async_trait]
pub trait Explainer: Send + Sync {
    fn provider(&self) -> Provider;

    async fn explain(&self, advice: &PriceAdvice) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationSource {
    Llm,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub text: String,
    pub source: ExplanationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
}

/// Uses the explainer when present and falls back to the deterministic rendering when it is
/// missing, fails or returns nothing.
pub async fn explain_or_fallback(
    explainer: Option<&dyn Explainer>,
    advice: &PriceAdvice,
) -> Explanation {
    if let Some(explainer) = explainer {
        match explainer.explain(advice).await {
            Ok(text) if !text.trim().is_empty() => {
                return Explanation {
                    text: text.trim().to_string(),
                    source: ExplanationSource::Llm,
                    provider: Some(explainer.provider()),
                };
            }
            Ok(_) => {
                tracing::warn!(provider = ?explainer.provider(), "explainer returned empty text");
            }
            Err(err) => {
                tracing::warn!(
                    provider = ?explainer.provider(),
                    error = %err,
                    "explainer failed; using fallback"
                );
            }
        }
    }

    Explanation {
        text: fallback::render(&advice.recommendation),
        source: ExplanationSource::Fallback,
        provider: None,
    }
}
