//! Per-call advice workers.
//!
//! One logical worker per active call id, serialized within the call and
//! parallel across calls. Each call owns a mailbox of three flags —
//! `pending`, `running`, `force_model` — so any number of ingest enqueues
//! coalesce into at most one queued cycle, and a force request arriving
//! mid-cycle is never dropped: it either ran this cycle or triggers exactly
//! one more.
//!
//! The worker is the sole writer of a session's `advice`, `analyzing`, and
//! `last_error` fields. A cycle persists heuristic advice first, then —
//! when the pacing gate admits it — replaces it with stabilized model
//! advice. When the session row has disappeared the worker releases its
//! mailbox slot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use cc_domain::advice::now_ms;
use cc_domain::call::TranscriptChunk;
use cc_model::AdviceModel;
use cc_scoring::{stabilize, RiskBanks, StepCaps};
use cc_store::LiveStore;

use super::backoff::BackoffState;

/// How many trailing chunks a cycle reads for scoring.
const SCORING_WINDOW: usize = 40;

/// User-safe note for a transient model failure.
pub const DELAYED_NOTE: &str = "Live analysis is delayed.";

/// User-safe note while the model is rate-limited.
pub const RATE_LIMITED_NOTE: &str = "Live analysis is temporarily rate-limited.";

/// Everything a cycle needs, shared by all workers.
pub struct WorkerDeps {
    pub store: Arc<LiveStore>,
    pub model: Arc<dyn AdviceModel>,
    pub banks: Arc<RiskBanks>,
    pub caps: StepCaps,
    pub min_interval: Duration,
}

#[derive(Default)]
struct Flags {
    pending: bool,
    running: bool,
    force_model: bool,
}

struct Mailbox {
    flags: Mutex<Flags>,
    backoff: Mutex<BackoffState>,
}

impl Mailbox {
    fn new() -> Self {
        Self {
            flags: Mutex::new(Flags::default()),
            backoff: Mutex::new(BackoffState::new()),
        }
    }
}

/// The concurrent map of per-call mailboxes.
pub struct WorkerMap {
    deps: Arc<WorkerDeps>,
    mailboxes: Mutex<HashMap<String, Arc<Mailbox>>>,
}

impl WorkerMap {
    pub fn new(deps: WorkerDeps) -> Self {
        Self {
            deps: Arc::new(deps),
            mailboxes: Mutex::new(HashMap::new()),
        }
    }

    /// Request an advice cycle for a call. Coalesces with any cycle already
    /// queued; `force` survives coalescing (it ORs in).
    pub fn enqueue(self: &Arc<Self>, call_id: &str, force: bool) {
        let mailbox = self
            .mailboxes
            .lock()
            .entry(call_id.to_owned())
            .or_insert_with(|| Arc::new(Mailbox::new()))
            .clone();

        let start_loop = {
            let mut flags = mailbox.flags.lock();
            flags.pending = true;
            flags.force_model |= force;
            if flags.running {
                false
            } else {
                flags.running = true;
                true
            }
        };

        if start_loop {
            let map = Arc::clone(self);
            let call_id = call_id.to_owned();
            tokio::spawn(async move {
                run_loop(map, call_id, mailbox).await;
            });
        }
    }

    /// Number of tracked calls (for monitoring and tests).
    pub fn tracked_calls(&self) -> usize {
        self.mailboxes.lock().len()
    }

    /// Drop mailboxes for calls that are idle and whose session rows are
    /// gone. Called from the background pruner.
    pub fn prune(&self) {
        let mut mailboxes = self.mailboxes.lock();
        mailboxes.retain(|call_id, mailbox| {
            let flags = mailbox.flags.lock();
            flags.running || flags.pending || self.deps.store.get_summary(call_id).is_some()
        });
    }

    fn release(&self, call_id: &str) {
        self.mailboxes.lock().remove(call_id);
        self.deps.store.cleanup_channel(call_id);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum CycleOutcome {
    Done,
    SessionGone,
}

async fn run_loop(map: Arc<WorkerMap>, call_id: String, mailbox: Arc<Mailbox>) {
    loop {
        let force = {
            let mut flags = mailbox.flags.lock();
            if !flags.pending {
                flags.running = false;
                return;
            }
            flags.pending = false;
            std::mem::take(&mut flags.force_model)
        };

        match run_cycle(&map.deps, &call_id, &mailbox, force).await {
            CycleOutcome::Done => {}
            CycleOutcome::SessionGone => {
                let idle = {
                    let mut flags = mailbox.flags.lock();
                    if flags.pending {
                        false
                    } else {
                        flags.running = false;
                        true
                    }
                };
                if idle {
                    tracing::debug!(call_id, "session gone; releasing worker mailbox");
                    map.release(&call_id);
                    return;
                }
            }
        }
    }
}

async fn run_cycle(
    deps: &Arc<WorkerDeps>,
    call_id: &str,
    mailbox: &Mailbox,
    force: bool,
) -> CycleOutcome {
    let Some(summary) = deps.store.get_summary(call_id) else {
        return CycleOutcome::SessionGone;
    };
    let call_ended = summary.status.is_terminal();

    let stored = deps.store.get_chunks(call_id, SCORING_WINDOW);
    if stored.is_empty() {
        return CycleOutcome::Done;
    }
    let chunks: Vec<TranscriptChunk> = stored.into_iter().map(|s| s.chunk).collect();

    // Heuristic advice lands every cycle, and clears any stale error note.
    let previous = summary.last_advice_at.map(|_| summary.advice);
    let heuristic = deps.banks.advise(&chunks, now_ms());
    let heuristic = stabilize(previous.as_ref(), heuristic, &deps.caps, now_ms());
    deps.store.set_advice(call_id, heuristic.clone(), None, false);

    let model_due = deps.model.is_configured()
        && mailbox
            .backoff
            .lock()
            .model_allowed(Instant::now(), force, call_ended, deps.min_interval);
    if !model_due {
        return CycleOutcome::Done;
    }

    deps.store.set_analyzing(call_id, true);
    match deps.model.score(&chunks, Some(&heuristic)).await {
        Ok(model_advice) => {
            let refined = stabilize(Some(&heuristic), model_advice, &deps.caps, now_ms());
            tracing::debug!(call_id, score = refined.risk_score, "model advice persisted");
            deps.store.set_advice(call_id, refined, None, false);
            mailbox.backoff.lock().on_success(Instant::now());
        }
        Err(err) => {
            let note = if err.is_rate_limited() {
                RATE_LIMITED_NOTE
            } else {
                DELAYED_NOTE
            };
            tracing::warn!(call_id, %err, "model scoring failed; keeping heuristic advice");
            deps.store
                .set_advice(call_id, heuristic, Some(note.into()), false);
            let mut backoff = mailbox.backoff.lock();
            if err.is_rate_limited() {
                backoff.on_rate_limited(Instant::now(), err.retry_after_ms);
            } else {
                backoff.on_failure(Instant::now());
            }
        }
    }

    CycleOutcome::Done
}
