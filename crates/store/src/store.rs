//! The live store: session rows + append-only transcript chunks.
//!
//! Contracts the rest of the system leans on:
//! - `upsert_session` is idempotent and the slug is immutable once set;
//! - `append_chunk` is a no-op for a `(call_id, source_event_id)` pair that
//!   was already inserted;
//! - terminal statuses latch — later status events are ignored;
//! - every mutation bumps `updated_at` + `version` and publishes a
//!   [`StoreEvent`] for the call's subscribers.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tokio::sync::broadcast;

use cc_domain::advice::{now_ms, CoachingAdvice};
use cc_domain::call::{CallStatus, TranscriptChunk};
use cc_domain::error::{Error, Result};

use crate::events::{EventHub, StoreEvent};
use crate::session::{CallSession, CallSummary, Snapshot, StoredChunk};

/// Set as `last_error` when a call transitions to `failed`.
const CALL_FAILED_NOTE: &str = "The call ended unexpectedly.";

struct CallRow {
    session: CallSession,
    chunks: Vec<StoredChunk>,
    seen_event_ids: HashSet<String>,
}

/// In-memory live store for active monitor calls.
pub struct LiveStore {
    rows: RwLock<HashMap<String, CallRow>>,
    events: EventHub,
}

impl Default for LiveStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            events: EventHub::new(),
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Create or update the session row. The slug is immutable once set;
    /// a status, when present, goes through the terminal latch.
    pub fn upsert_session(
        &self,
        call_id: &str,
        slug: &str,
        status: Option<CallStatus>,
    ) -> Result<()> {
        let mut rows = self.rows.write();
        let now = now_ms();

        let row = rows.entry(call_id.to_owned()).or_insert_with(|| {
            tracing::info!(call_id, slug, "session created");
            CallRow {
                session: CallSession::new(call_id, slug, now),
                chunks: Vec::new(),
                seen_event_ids: HashSet::new(),
            }
        });

        if row.session.slug != slug {
            tracing::debug!(
                call_id,
                existing = %row.session.slug,
                ignored = slug,
                "slug is immutable; keeping existing"
            );
        }

        if let Some(status) = status {
            apply_status(&mut row.session, status, None);
        }

        bump(&mut row.session);
        let event = StoreEvent::Session {
            session: row.session.clone(),
        };
        drop(rows);
        self.events.emit(call_id, event);
        Ok(())
    }

    /// Append a transcript chunk; duplicates by `source_event_id` are
    /// no-ops. Returns whether the chunk was inserted.
    pub fn append_chunk(&self, call_id: &str, chunk: TranscriptChunk) -> Result<bool> {
        let mut rows = self.rows.write();
        let row = rows.get_mut(call_id).ok_or(Error::NotFound)?;

        if !row.seen_event_ids.insert(chunk.source_event_id.clone()) {
            tracing::debug!(call_id, event_id = %chunk.source_event_id, "duplicate chunk skipped");
            return Ok(false);
        }

        let seq = row.chunks.len() as u64 + 1;
        let stored = StoredChunk { seq, chunk };
        row.chunks.push(stored.clone());
        bump(&mut row.session);

        drop(rows);
        self.events.emit(call_id, StoreEvent::Chunk { chunk: stored });
        Ok(true)
    }

    /// Apply a status transition (latched once terminal).
    pub fn set_status(&self, call_id: &str, status: CallStatus, last_error: Option<String>) {
        self.mutate_session(call_id, |session| {
            apply_status(session, status, last_error);
        });
    }

    pub fn set_analyzing(&self, call_id: &str, analyzing: bool) {
        self.mutate_session(call_id, |session| {
            session.analyzing = analyzing;
        });
    }

    /// Persist a new advice payload. The advice worker is the only caller.
    pub fn set_advice(
        &self,
        call_id: &str,
        advice: CoachingAdvice,
        last_error: Option<String>,
        analyzing: bool,
    ) {
        self.mutate_session(call_id, |session| {
            session.last_advice_at = Some(advice.updated_at);
            session.advice = advice;
            session.last_error = last_error;
            session.analyzing = analyzing;
        });
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get_session(&self, call_id: &str) -> Option<CallSession> {
        self.rows.read().get(call_id).map(|r| r.session.clone())
    }

    /// The worker's view of a session at the top of a cycle.
    pub fn get_summary(&self, call_id: &str) -> Option<CallSummary> {
        self.rows.read().get(call_id).map(|r| CallSummary {
            slug: r.session.slug.clone(),
            status: r.session.status,
            last_advice_at: r.session.last_advice_at,
            advice: r.session.advice.clone(),
        })
    }

    /// Last `limit` chunks in insertion order (ascending).
    pub fn get_chunks(&self, call_id: &str, limit: usize) -> Vec<StoredChunk> {
        let rows = self.rows.read();
        let Some(row) = rows.get(call_id) else {
            return Vec::new();
        };
        let start = row.chunks.len().saturating_sub(limit);
        row.chunks[start..].to_vec()
    }

    /// The live-view read model; `None` when the row is absent or the slug
    /// does not match.
    pub fn get_snapshot(&self, call_id: &str, slug: &str, transcript_limit: usize) -> Option<Snapshot> {
        let rows = self.rows.read();
        let row = rows.get(call_id)?;
        if row.session.slug != slug {
            return None;
        }
        let start = row.chunks.len().saturating_sub(transcript_limit);
        let s = &row.session;
        Some(Snapshot {
            call_id: s.call_id.clone(),
            slug: s.slug.clone(),
            status: s.status,
            assistant_muted: s.assistant_muted,
            analyzing: s.analyzing,
            last_error: s.last_error.clone(),
            updated_at: s.updated_at,
            version: s.version,
            advice: s.advice.clone(),
            transcript: row.chunks[start..].to_vec(),
        })
    }

    // ── Change notifications ─────────────────────────────────────────

    pub fn subscribe(&self, call_id: &str) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe(call_id)
    }

    /// Drop the event channel for a call that no longer has a row.
    pub fn cleanup_channel(&self, call_id: &str) {
        self.events.cleanup(call_id);
    }

    // ── Private ──────────────────────────────────────────────────────

    fn mutate_session(&self, call_id: &str, f: impl FnOnce(&mut CallSession)) {
        let mut rows = self.rows.write();
        let Some(row) = rows.get_mut(call_id) else {
            tracing::warn!(call_id, "mutation on unknown session ignored");
            return;
        };
        f(&mut row.session);
        bump(&mut row.session);
        let event = StoreEvent::Session {
            session: row.session.clone(),
        };
        drop(rows);
        self.events.emit(call_id, event);
    }
}

/// Apply a status transition, honoring the terminal latch and attaching the
/// user-safe failure note.
fn apply_status(session: &mut CallSession, status: CallStatus, last_error: Option<String>) {
    if session.status.is_terminal() {
        tracing::debug!(
            call_id = %session.call_id,
            current = %session.status,
            ignored = %status,
            "status transition after terminal ignored"
        );
        return;
    }
    if session.status == status {
        return;
    }
    session.status = status;
    if status == CallStatus::Failed {
        session.last_error = Some(last_error.unwrap_or_else(|| CALL_FAILED_NOTE.into()));
    } else if let Some(note) = last_error {
        session.last_error = Some(note);
    }
}

/// Advance `updated_at` (strictly monotonic) and the mutation counter.
fn bump(session: &mut CallSession) {
    session.updated_at = now_ms().max(session.updated_at + 1);
    session.version += 1;
}
