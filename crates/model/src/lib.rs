//! Remote model scorer.
//!
//! The per-call worker consumes the [`AdviceModel`] trait; [`HttpAdviceModel`]
//! is the chat-completions adapter. Failures are classified into
//! [`ModelError`] so the worker can tell a rate limit (back off, honor
//! `Retry-After`) from a transient failure (just respect the minimum
//! interval).

pub mod client;
pub mod parse;
pub mod prompt;

use std::fmt;

use async_trait::async_trait;

use cc_domain::advice::CoachingAdvice;
use cc_domain::call::TranscriptChunk;

pub use client::HttpAdviceModel;

/// A failed model call, classified for the backoff controller.
#[derive(Debug)]
pub struct ModelError {
    /// Upstream HTTP status, when one was received.
    pub status: Option<u16>,
    /// Parsed `Retry-After`, when the upstream sent one.
    pub retry_after_ms: Option<u64>,
    pub message: String,
}

impl ModelError {
    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429)
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            retry_after_ms: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "model call failed (HTTP {code}): {}", self.message),
            None => write!(f, "model call failed: {}", self.message),
        }
    }
}

impl std::error::Error for ModelError {}

/// The advice-scoring contract the worker depends on.
#[async_trait]
pub trait AdviceModel: Send + Sync {
    /// False when no API key is configured; the worker skips the model
    /// entirely and coaches from the heuristic alone.
    fn is_configured(&self) -> bool;

    /// Score the transcript tail, with the previous advice as continuity.
    async fn score(
        &self,
        transcript: &[TranscriptChunk],
        previous: Option<&CoachingAdvice>,
    ) -> Result<CoachingAdvice, ModelError>;
}
