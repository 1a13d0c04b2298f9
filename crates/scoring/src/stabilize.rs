//! Advice stabilizer.
//!
//! Sits between any raw advice source (heuristic or model) and the store,
//! and prevents whiplash in what the user sees:
//!
//! - the risk score moves by at most a confidence-tiered step per write,
//!   with a larger allowance when the write crosses into the high band;
//! - moves inside the ±3 dead-zone keep the previous score;
//! - the action queue is the deduplicated union of the new and previous
//!   actions, so "what to do" stays sticky instead of flickering.

use std::collections::HashSet;

use cc_domain::advice::{CoachingAdvice, RiskLevel, HIGH_BAND_FLOOR, NEXT_STEPS_MAX};

/// No update is emitted for score moves inside this band.
pub const DEAD_ZONE: i32 = 3;

/// Step allowance when a write crosses into the high band.
pub const BAND_CROSS_CAP: u8 = 22;

/// Shown when neither the new nor the previous advice carries an action.
pub const FALLBACK_ACTION: &str =
    "Stay calm and verify the caller through an official channel.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step caps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-write score step caps, tiered by the scorer's confidence.
///
/// Caps must be monotone non-decreasing in confidence: `low <= mid <= high`.
/// Two families are in use: [`StepCaps::DEFAULT`] (18/14/10) and the tighter
/// [`StepCaps::TIGHT`] (11/9/6).
#[derive(Debug, Clone, Copy)]
pub struct StepCaps {
    /// Applied when confidence >= 0.75.
    pub high: u8,
    /// Applied when confidence >= 0.55.
    pub mid: u8,
    /// Applied otherwise.
    pub low: u8,
}

impl StepCaps {
    pub const DEFAULT: StepCaps = StepCaps {
        high: 18,
        mid: 14,
        low: 10,
    };

    pub const TIGHT: StepCaps = StepCaps {
        high: 11,
        mid: 9,
        low: 6,
    };

    pub fn for_confidence(&self, confidence: f32) -> u8 {
        if confidence >= 0.75 {
            self.high
        } else if confidence >= 0.55 {
            self.mid
        } else {
            self.low
        }
    }
}

impl Default for StepCaps {
    fn default() -> Self {
        StepCaps::DEFAULT
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stabilization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Smooth `next` against the last persisted advice and merge the action
/// queues. The result is fully sanitized and carries `now_ms`.
pub fn stabilize(
    previous: Option<&CoachingAdvice>,
    next: CoachingAdvice,
    caps: &StepCaps,
    now_ms: i64,
) -> CoachingAdvice {
    let mut next = next.sanitized();

    let (what_to_do, next_steps) = merge_actions(previous, &next);
    next.what_to_do = what_to_do;
    next.next_steps = next_steps;

    if let Some(prev) = previous {
        next.risk_score = step_limited(prev.risk_score, next.risk_score, next.confidence, caps);
        next.risk_level = RiskLevel::from_score(next.risk_score);
    }

    next.updated_at = now_ms;
    next
}

fn step_limited(prev: u8, next: u8, confidence: f32, caps: &StepCaps) -> u8 {
    let p = i32::from(prev);
    let n = i32::from(next);
    let delta = n - p;

    if delta.abs() <= DEAD_ZONE {
        return prev;
    }

    let mut cap = i32::from(caps.for_confidence(confidence));
    if p < i32::from(HIGH_BAND_FLOOR) && n >= i32::from(HIGH_BAND_FLOOR) {
        cap = cap.max(i32::from(BAND_CROSS_CAP));
    }

    (p + delta.signum() * delta.abs().min(cap)) as u8
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Action queue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Union the candidate actions in priority order, dropping empties and
/// case-insensitive duplicates: first survivor becomes `what_to_do`, the
/// next two become `next_steps`.
fn merge_actions(
    previous: Option<&CoachingAdvice>,
    next: &CoachingAdvice,
) -> (String, Vec<String>) {
    let mut queue: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    push_action(&mut queue, &mut seen, &next.what_to_do);
    if let Some(prev) = previous {
        push_action(&mut queue, &mut seen, &prev.what_to_do);
        for step in &prev.next_steps {
            push_action(&mut queue, &mut seen, step);
        }
    }
    for step in &next.next_steps {
        push_action(&mut queue, &mut seen, step);
    }

    if queue.is_empty() {
        queue.push(FALLBACK_ACTION.to_string());
    }

    let what_to_do = queue.remove(0);
    queue.truncate(NEXT_STEPS_MAX);
    (what_to_do, queue)
}

fn push_action(queue: &mut Vec<String>, seen: &mut HashSet<String>, candidate: &str) {
    let canonical = candidate.split_whitespace().collect::<Vec<_>>().join(" ");
    if canonical.is_empty() {
        return;
    }
    if seen.insert(canonical.to_lowercase()) {
        queue.push(canonical);
    }
}
