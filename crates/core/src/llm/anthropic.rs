use crate::config::Settings;
use crate::engine::PriceAdvice;
use crate::llm::error::{ExplainStage, LlmDiagnosticsError};
use crate::llm::json::{self, ExplanationPayload};
use crate::llm::{Explainer, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 400;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const TOOL_NAME_EMIT_EXPLANATION: &str = "emit_explanation";

#[derive(Debug, Clone)]
pub struct AnthropicExplainer {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicExplainer {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);
        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    async fn create_message(
        &self,
        req: &CreateMessageRequest,
    ) -> anyhow::Result<(Value, CreateMessageResponse)> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(req)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        if !status.is_success() {
            return Err(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage: ExplainStage::Http,
                detail: format!("status={status}"),
                raw_response_json: serde_json::from_str::<Value>(&text).ok(),
                raw_output: Some(text),
            }
            .into());
        }

        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("failed to parse Anthropic response JSON: {text}"))?;
        let parsed = serde_json::from_value::<CreateMessageResponse>(raw_json.clone())
            .context("failed to decode Anthropic response into CreateMessageResponse")?;
        Ok((raw_json, parsed))
    }

    fn request(&self, advice: &PriceAdvice, max_tokens: u32) -> CreateMessageRequest {
        CreateMessageRequest {
            model: self.model.clone(),
            max_tokens,
            system: Some(Self::system_prompt()),
            messages: vec![Message {
                role: "user",
                content: Self::user_prompt(advice),
            }],
            tools: Some(Self::tools()),
            tool_choice: Some(ToolChoice::Tool {
                name: TOOL_NAME_EMIT_EXPLANATION,
            }),
        }
    }

    fn tools() -> Vec<Tool> {
        let schema = json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["explanation"],
            "properties": {
                "explanation": {"type": "string"},
                "caveat": {"type": ["string", "null"]}
            }
        });

        vec![Tool {
            name: TOOL_NAME_EMIT_EXPLANATION,
            description: "Emit the traveller-facing explanation of the fare advice",
            input_schema: schema,
        }]
    }

    fn system_prompt() -> String {
        [
            "You are a travel pricing expert explaining a fare recommendation to a traveller.",
            "The decision has already been made; explain it, never change it.",
            "Write 2-3 conversational sentences: where the price sits against recent fares,",
            "what the traveller should do next, and how it compares with their budget.",
            "Use only the numbers provided. Put any uncertainty in `caveat`.",
        ]
        .join("\n")
    }

    fn user_prompt(advice: &PriceAdvice) -> String {
        let rec = &advice.recommendation;
        let best = &advice.outbound.overall_best;
        let context = json!({
            "route": advice.route.key(),
            "departure_date": best.date,
            "airline": best.airline,
            "action": rec.action.to_string(),
            "confidence": rec.confidence,
            "current_price": rec.current_price.to_string(),
            "baseline": advice.baseline,
            "forecast_direction": crate::domain::forecast::forecast_direction(&advice.forecast),
            "rationale_facts": rec.rationale_facts,
            "cheapest_weekday": advice.booking_insight.as_ref().map(|i| i.cheapest_weekday),
        });
        format!("Explain this fare advice.\n\nAdvice JSON:\n{context}")
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        res.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn response_tool_payload(
        res: &CreateMessageResponse,
    ) -> anyhow::Result<Option<ExplanationPayload>> {
        for block in &res.content {
            if let ContentBlock::ToolUse { name, input, .. } = block {
                if name == TOOL_NAME_EMIT_EXPLANATION {
                    let parsed = serde_json::from_value::<ExplanationPayload>(input.clone())
                        .context("failed to decode tool_use.input into ExplanationPayload")?;
                    return Ok(Some(parsed));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait::async_trait]
impl Explainer for AnthropicExplainer {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn explain(&self, advice: &PriceAdvice) -> anyhow::Result<String> {
        let (mut raw_json, mut res) = self
            .create_message(&self.request(advice, self.max_tokens))
            .await?;

        // A truncated tool call is useless; retry once with more room.
        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            let bumped = self.max_tokens.saturating_mul(2).max(1024);
            tracing::warn!(
                route = %advice.route,
                from = self.max_tokens,
                to = bumped,
                "Anthropic stop_reason=max_tokens; retrying once with higher max_tokens"
            );
            (raw_json, res) = self.create_message(&self.request(advice, bumped)).await?;
        }

        if let Some(payload) = Self::response_tool_payload(&res)? {
            let text = payload.into_text();
            if !text.is_empty() {
                return Ok(text);
            }
        }

        // Text fallback: the model answered without the tool.
        let text = Self::response_text(&res);
        json::parse_explanation(&text).map_err(|err| {
            LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage: if text.trim().is_empty() {
                    ExplainStage::EmptyOutput
                } else {
                    ExplainStage::Decode
                },
                detail: err.to_string(),
                raw_output: Some(text),
                raw_response_json: Some(raw_json),
            }
            .into()
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },

    #[serde(other)]
    Unknown,
}
