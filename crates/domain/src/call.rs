//! Call-level value types: status normalization, speaker tracks, transcript
//! fragments, and case slug validation.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Call status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Canonical monitor-call status. Providers report a zoo of strings;
/// [`CallStatus::normalize`] folds them into this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Queued,
    Ringing,
    InProgress,
    Ended,
    Failed,
    Unknown,
}

impl CallStatus {
    /// Fold an arbitrary provider status string into the canonical set.
    ///
    /// Matching is by lowercase substring, checked in declaration order, so
    /// `"completed"` lands on `Ended` and `"no-answer"` on `Unknown`.
    pub fn normalize(raw: &str) -> Self {
        let s = raw.trim().to_lowercase();
        if s.contains("queued") {
            CallStatus::Queued
        } else if s.contains("ring") {
            CallStatus::Ringing
        } else if s.contains("in progress") || s.contains("in-progress") || s.contains("active") {
            CallStatus::InProgress
        } else if s.contains("fail") || s.contains("error") || s.contains("busy") {
            CallStatus::Failed
        } else if s.contains("end") || s.contains("complete") || s.contains("cancel") {
            CallStatus::Ended
        } else {
            CallStatus::Unknown
        }
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, CallStatus::Ended | CallStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallStatus::Queued => "queued",
            CallStatus::Ringing => "ringing",
            CallStatus::InProgress => "in-progress",
            CallStatus::Ended => "ended",
            CallStatus::Failed => "failed",
            CallStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Speaker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which side of the bridged call a transcript fragment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Caller,
    Other,
    Unknown,
}

impl Speaker {
    /// Classify a provider track / channel / role hint.
    pub fn classify(hint: &str) -> Self {
        let h = hint.to_lowercase();
        if h.contains("caller") || h.contains("customer") || h.contains("inbound") {
            Speaker::Caller
        } else if h.contains("outbound")
            || h.contains("callee")
            || h.contains("agent")
            || h.contains("recipient")
            || h.contains("other")
        {
            Speaker::Other
        } else {
            Speaker::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Speaker::Caller => "caller",
            Speaker::Other => "other",
            Speaker::Unknown => "unknown",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transcript fragment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One transcript fragment, keyed for idempotent insertion by
/// `source_event_id` (the dedup fingerprint computed at parse time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptChunk {
    pub source_event_id: String,
    pub speaker: Speaker,
    /// Non-empty, trimmed.
    pub text: String,
    pub timestamp_ms: i64,
    pub is_final: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Case slug
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A case slug is 3–64 lowercase alphanumeric-or-hyphen characters.
pub fn validate_slug(slug: &str) -> bool {
    (3..=64).contains(&slug.len())
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_normalization_table() {
        let cases = [
            ("queued", CallStatus::Queued),
            ("ringing", CallStatus::Ringing),
            ("in-progress", CallStatus::InProgress),
            ("In Progress", CallStatus::InProgress),
            ("active", CallStatus::InProgress),
            ("completed", CallStatus::Ended),
            ("canceled", CallStatus::Ended),
            ("call.ended", CallStatus::Ended),
            ("failed", CallStatus::Failed),
            ("busy", CallStatus::Failed),
            ("error", CallStatus::Failed),
            ("no-answer", CallStatus::Unknown),
            ("", CallStatus::Unknown),
        ];
        for (raw, expected) in cases {
            assert_eq!(CallStatus::normalize(raw), expected, "input {raw:?}");
        }
    }

    #[test]
    fn terminality() {
        assert!(CallStatus::Ended.is_terminal());
        assert!(CallStatus::Failed.is_terminal());
        assert!(!CallStatus::InProgress.is_terminal());
        assert!(!CallStatus::Unknown.is_terminal());
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&CallStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
    }

    #[test]
    fn speaker_classification() {
        assert_eq!(Speaker::classify("inbound_track"), Speaker::Caller);
        assert_eq!(Speaker::classify("Customer"), Speaker::Caller);
        assert_eq!(Speaker::classify("outbound_track"), Speaker::Other);
        assert_eq!(Speaker::classify("recipient"), Speaker::Other);
        assert_eq!(Speaker::classify("mixed"), Speaker::Unknown);
        assert_eq!(Speaker::classify(""), Speaker::Unknown);
    }

    #[test]
    fn slug_shape() {
        assert!(validate_slug("abc"));
        assert!(validate_slug("case-12f9"));
        assert!(!validate_slug("ab"));
        assert!(!validate_slug("Case-12"));
        assert!(!validate_slug("has space"));
        assert!(!validate_slug(&"x".repeat(65)));
    }
}
