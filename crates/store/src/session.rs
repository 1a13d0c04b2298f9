//! Session row and read-model types.

use cc_domain::advice::CoachingAdvice;
use cc_domain::call::{CallStatus, TranscriptChunk};
use serde::Serialize;

/// One row per outbound monitor call, keyed by the provider-assigned call id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    pub call_id: String,
    pub slug: String,
    pub status: CallStatus,
    /// Residual from the legacy voice-agent mode; stored and returned for
    /// the view, never mutated by the advice worker.
    pub assistant_muted: bool,
    /// True only while a model call is in flight.
    pub analyzing: bool,
    /// User-safe note, e.g. "Live analysis is delayed."
    pub last_error: Option<String>,
    pub advice: CoachingAdvice,
    /// Epoch ms of the last advice write; `None` until a scorer has run.
    pub last_advice_at: Option<i64>,
    /// Monotonically advancing per mutation.
    pub updated_at: i64,
    /// Mutation counter; advances with `updated_at`.
    pub version: u64,
}

impl CallSession {
    pub fn new(call_id: &str, slug: &str, now_ms: i64) -> Self {
        Self {
            call_id: call_id.to_owned(),
            slug: slug.to_owned(),
            status: CallStatus::Unknown,
            assistant_muted: false,
            analyzing: false,
            last_error: None,
            advice: CoachingAdvice::starter(now_ms),
            last_advice_at: None,
            updated_at: now_ms,
            version: 1,
        }
    }
}

/// A transcript chunk with its insertion id. Within one call, `seq` order is
/// insertion order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredChunk {
    pub seq: u64,
    #[serde(flatten)]
    pub chunk: TranscriptChunk,
}

/// What the advice worker reads at the top of each cycle.
#[derive(Debug, Clone)]
pub struct CallSummary {
    pub slug: String,
    pub status: CallStatus,
    pub last_advice_at: Option<i64>,
    pub advice: CoachingAdvice,
}

/// The live-view read model: session state plus the transcript tail,
/// oldest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub call_id: String,
    pub slug: String,
    pub status: CallStatus,
    pub assistant_muted: bool,
    pub analyzing: bool,
    pub last_error: Option<String>,
    pub updated_at: i64,
    pub version: u64,
    pub advice: CoachingAdvice,
    pub transcript: Vec<StoredChunk>,
}
