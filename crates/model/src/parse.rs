//! Tolerant extraction of the advice object from model output.
//!
//! Accepts a bare JSON object, a fenced ```json block, or the first
//! `{…}` substring, then validates and sanitizes the fields.

use serde::Deserialize;

use cc_domain::advice::{CoachingAdvice, RiskLevel};

use crate::ModelError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAdvice {
    #[serde(alias = "risk_score")]
    risk_score: f64,
    #[serde(default)]
    feedback: String,
    #[serde(default, alias = "what_to_say")]
    what_to_say: String,
    #[serde(default, alias = "what_to_do")]
    what_to_do: String,
    #[serde(default, alias = "next_steps")]
    next_steps: Vec<String>,
    #[serde(default = "d_confidence")]
    confidence: f32,
}

fn d_confidence() -> f32 {
    0.6
}

/// Parse model output into a sanitized [`CoachingAdvice`].
pub fn extract_advice(content: &str, now_ms: i64) -> Result<CoachingAdvice, ModelError> {
    let candidate = json_candidate(content).ok_or_else(|| {
        ModelError::transport(format!(
            "no JSON object in model output: {:.80}",
            content.trim()
        ))
    })?;

    let raw: RawAdvice = serde_json::from_str(candidate)
        .map_err(|e| ModelError::transport(format!("unparseable advice object: {e}")))?;

    let score = raw.risk_score.round().clamp(0.0, 100.0) as u8;
    Ok(CoachingAdvice {
        risk_score: score,
        risk_level: RiskLevel::from_score(score),
        feedback: raw.feedback,
        what_to_say: raw.what_to_say,
        what_to_do: raw.what_to_do,
        next_steps: raw.next_steps,
        confidence: raw.confidence,
        updated_at: now_ms,
    }
    .sanitized())
}

/// Find the JSON object inside possibly-decorated model output.
fn json_candidate(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    // Fenced block: ```json ... ``` (or a bare fence).
    if let Some(fence_start) = trimmed.find("```") {
        let after = &trimmed[fence_start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(fence_end) = after.find("```") {
            let inner = after[..fence_end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    // First `{` … last `}` substring.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}
