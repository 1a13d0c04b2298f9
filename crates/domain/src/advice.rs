//! Coaching advice value types.
//!
//! [`CoachingAdvice`] is the payload pushed to the live view: a bounded risk
//! score, a terse feedback line, one thing to say, one thing to do, and up to
//! two queued follow-up actions. All advice that reaches the store goes
//! through [`CoachingAdvice::sanitized`] first.

use serde::{Deserialize, Serialize};

/// Maximum length of each free-text advice line, in characters.
pub const LINE_MAX_CHARS: usize = 220;

/// Maximum number of queued follow-up actions.
pub const NEXT_STEPS_MAX: usize = 2;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Risk level
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Risk band derived from the numeric score. Never stored independently —
/// always recomputed from `risk_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Band cutoffs: `< 40` low, `40–69` medium, `>= 70` high.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=39 => RiskLevel::Low,
            40..=69 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Score at which the high band starts.
pub const HIGH_BAND_FLOOR: u8 = 70;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CoachingAdvice
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One coaching payload for the live view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachingAdvice {
    /// Bounded risk score in `[0, 100]`.
    pub risk_score: u8,
    /// Always the derivation of `risk_score`.
    pub risk_level: RiskLevel,
    /// Terse read on the call so far.
    pub feedback: String,
    /// One sentence the user can say right now.
    pub what_to_say: String,
    /// The single next action the user should take.
    pub what_to_do: String,
    /// Up to two queued follow-up actions.
    #[serde(default)]
    pub next_steps: Vec<String>,
    /// Scorer confidence in `[0, 1]`.
    pub confidence: f32,
    /// Epoch milliseconds of the last refresh.
    pub updated_at: i64,
}

impl CoachingAdvice {
    /// The neutral payload a session starts with, before any scorer has run.
    pub fn starter(now_ms: i64) -> Self {
        Self {
            risk_score: 20,
            risk_level: RiskLevel::Low,
            feedback: "Listening. No assessment yet.".into(),
            what_to_say: "Take your time — you don't have to decide anything on this call.".into(),
            what_to_do: "Stay on the line and let the conversation play out.".into(),
            next_steps: Vec::new(),
            confidence: 0.3,
            updated_at: now_ms,
        }
    }

    /// Clamp every field into its contract: score to `[0, 100]`, confidence
    /// to `[0, 1]`, lines to [`LINE_MAX_CHARS`], the action queue to
    /// [`NEXT_STEPS_MAX`] entries, and re-derive the level from the score.
    pub fn sanitized(mut self) -> Self {
        self.risk_score = self.risk_score.min(100);
        self.risk_level = RiskLevel::from_score(self.risk_score);
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self.feedback = clamp_line(&self.feedback);
        self.what_to_say = clamp_line(&self.what_to_say);
        self.what_to_do = clamp_line(&self.what_to_do);
        self.next_steps.retain(|s| !s.trim().is_empty());
        self.next_steps.truncate(NEXT_STEPS_MAX);
        for step in &mut self.next_steps {
            *step = clamp_line(step);
        }
        self
    }
}

/// Truncate a line to [`LINE_MAX_CHARS`] characters, respecting char
/// boundaries.
pub fn clamp_line(s: &str) -> String {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(LINE_MAX_CHARS) {
        Some((byte_idx, _)) => trimmed[..byte_idx].to_string(),
        None => trimmed.to_string(),
    }
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
