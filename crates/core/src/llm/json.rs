use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Shape the model is asked to emit, either as tool input or as a JSON text reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationPayload {
    pub explanation: String,
    #[serde(default)]
    pub caveat: Option<String>,
}

impl ExplanationPayload {
    pub fn into_text(self) -> String {
        let explanation = self.explanation.trim();
        match self.caveat.as_deref().map(str::trim) {
            Some(caveat) if !caveat.is_empty() => format!("{explanation} {caveat}"),
            _ => explanation.to_string(),
        }
    }
}

/// Pulls a JSON object out of a model reply: the body of a Markdown fence, else the span from the
/// first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if let Some(fenced) = trimmed.strip_prefix("```") {
        // Drop the info string (`json`) on the opening line.
        let body = fenced.split_once('\n').map_or("", |(_, rest)| rest);
        let body = body.rfind("```").map_or(body, |end| &body[..end]);
        return Some(body.trim());
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| trimmed[start..=end].trim())
}

/// Accepts a JSON payload (fenced or bare) or, failing that, plain prose.
pub fn parse_explanation(text: &str) -> anyhow::Result<String> {
    match extract_json(text) {
        Some(json_str) => {
            let payload = serde_json::from_str::<ExplanationPayload>(json_str)
                .with_context(|| format!("explanation is not valid JSON: {json_str}"))?;
            let out = payload.into_text();
            anyhow::ensure!(!out.is_empty(), "explanation payload is empty");
            Ok(out)
        }
        None => {
            let prose = text.trim();
            anyhow::ensure!(!prose.is_empty(), "explanation reply is empty");
            Ok(prose.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = r#"{"explanation":"ok"}"#;
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = r#"Sure! {"explanation":"ok"} Hope that helps."#;
        assert_eq!(extract_json(s), Some(r#"{"explanation":"ok"}"#));
        assert_eq!(extract_json("no braces here"), None);
    }

    #[test]
    fn parses_payload_with_caveat() {
        let text = r#"{"explanation": "Book now.", "caveat": "Fares change daily."}"#;
        assert_eq!(
            parse_explanation(text).unwrap(),
            "Book now. Fares change daily."
        );
    }

    #[test]
    fn plain_prose_is_accepted() {
        assert_eq!(
            parse_explanation("  This fare is a good deal.  ").unwrap(),
            "This fare is a good deal."
        );
    }

    #[test]
    fn rejects_broken_or_empty_payloads() {
        assert!(parse_explanation(r#"{"explanation": }"#).is_err());
        assert!(parse_explanation(r#"{"explanation": "  "}"#).is_err());
        assert!(parse_explanation("   ").is_err());
    }
}
