//! Chat-completions adapter for the model scorer.

use async_trait::async_trait;
use serde_json::Value;

use cc_domain::advice::{now_ms, CoachingAdvice};
use cc_domain::call::TranscriptChunk;
use cc_domain::config::ModelConfig;
use cc_domain::error::{Error, Result};

use crate::parse::extract_advice;
use crate::prompt::{user_message, SYSTEM_PROMPT};
use crate::{AdviceModel, ModelError};

/// Hard deadline for one model call. The client aborts the request at the
/// deadline, so a slow upstream can never stall a call's worker longer.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(8);

const TEMPERATURE: f64 = 0.15;
const MAX_TOKENS: u32 = 240;

/// [`AdviceModel`] backed by an OpenAI-compatible chat-completions endpoint.
pub struct HttpAdviceModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model_name: String,
}

impl HttpAdviceModel {
    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model_name: cfg.name.clone(),
        })
    }
}

#[async_trait]
impl AdviceModel for HttpAdviceModel {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn score(
        &self,
        transcript: &[TranscriptChunk],
        previous: Option<&CoachingAdvice>,
    ) -> std::result::Result<CoachingAdvice, ModelError> {
        let Some(api_key) = &self.api_key else {
            return Err(ModelError::transport("no API key configured"));
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model_name,
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_message(transcript, previous) },
            ],
        });

        tracing::debug!(model = %self.model_name, lines = transcript.len(), "model scoring request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::transport("request deadline exceeded")
                } else {
                    ModelError::transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after_ms = parse_retry_after(
                resp.headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok()),
            );
            let text = resp.text().await.unwrap_or_default();
            return Err(ModelError {
                status: Some(status.as_u16()),
                retry_after_ms,
                message: format!("{:.200}", text),
            });
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| ModelError::transport(format!("unreadable response body: {e}")))?;
        let content = payload
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| ModelError::transport("response carries no message content"))?;

        extract_advice(content, now_ms())
    }
}

/// `Retry-After` arrives in whole seconds.
fn parse_retry_after(header: Option<&str>) -> Option<u64> {
    let secs: f64 = header?.trim().parse().ok()?;
    if secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_parses_seconds() {
        assert_eq!(parse_retry_after(Some("8")), Some(8_000));
        assert_eq!(parse_retry_after(Some("0.5")), Some(500));
        assert_eq!(parse_retry_after(Some("nope")), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn unconfigured_client_reports_it() {
        let model = HttpAdviceModel::from_config(&ModelConfig::default()).unwrap();
        assert!(!model.is_configured());
    }
}
