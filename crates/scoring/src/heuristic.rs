//! Regex-bank heuristic scorer.
//!
//! Produces a provisional [`CoachingAdvice`] from the transcript tail alone:
//! start at 20, add 15 per HIGH-bank hit and 8 per MEDIUM-bank hit, clamp to
//! `[5, 95]`, then pick the response templates for the resulting band.
//! Always available — this is what the user sees when the model scorer is
//! unconfigured, cooling down, or failing.

use cc_domain::advice::{CoachingAdvice, RiskLevel};
use cc_domain::call::TranscriptChunk;
use cc_domain::error::{Error, Result};
use regex::Regex;

/// How many trailing chunks the scorer looks at.
const WINDOW_CHUNKS: usize = 10;

const BASE_SCORE: i32 = 20;
const HIGH_HIT: i32 = 15;
const MEDIUM_HIT: i32 = 8;
const SCORE_FLOOR: i32 = 5;
const SCORE_CEIL: i32 = 95;

const HIGH_PATTERNS: &[&str] = &[
    r"(?i)gift\s*cards?",
    r"(?i)wire\s*transfer",
    r"(?i)crypto|bitcoin",
    r"(?i)one[-\s]?time\s*pass(?:code|word)|\botp\b|verification\s*code",
    r"(?i)\bssn\b|social\s*security",
    r"(?i)bank\s*account|routing\s*number",
    r"(?i)remote\s*access|screen\s*shar(?:e|ing)|install\s+(?:an?\s+)?app",
    r"(?i)urgent|immediately|act\s*now|final\s*warning",
    r"(?i)arrest|warrant|lawsuit|jail",
];

const MEDIUM_PATTERNS: &[&str] = &[
    r"(?i)keep\s+(?:this\s+|it\s+)?confidential|don'?t\s+tell",
    r"(?i)suspicious\s+activity",
    r"(?i)refund\s+department|tech\s+support",
    r"(?i)pay\s+now|security\s+hold",
    r"(?i)confirm\s+your\s+identity",
];

/// Compiled risk-pattern banks. Built once at startup and shared through the
/// application state.
pub struct RiskBanks {
    high: Vec<Regex>,
    medium: Vec<Regex>,
}

impl RiskBanks {
    pub fn compile() -> Result<Self> {
        Ok(Self {
            high: compile_bank(HIGH_PATTERNS)?,
            medium: compile_bank(MEDIUM_PATTERNS)?,
        })
    }

    /// Score the transcript tail and render the matching advice template.
    pub fn advise(&self, chunks: &[TranscriptChunk], now_ms: i64) -> CoachingAdvice {
        let tail_start = chunks.len().saturating_sub(WINDOW_CHUNKS);
        let text = chunks[tail_start..]
            .iter()
            .map(|c| c.text.to_lowercase())
            .collect::<Vec<_>>()
            .join("\n");

        let high_hits = count_hits(&self.high, &text);
        let medium_hits = count_hits(&self.medium, &text);

        let raw = BASE_SCORE + HIGH_HIT * high_hits as i32 + MEDIUM_HIT * medium_hits as i32;
        let score = raw.clamp(SCORE_FLOOR, SCORE_CEIL) as u8;
        let level = RiskLevel::from_score(score);

        tracing::debug!(high_hits, medium_hits, score, level = level.as_str(), "heuristic pass");

        let t = template_for(level);
        CoachingAdvice {
            risk_score: score,
            risk_level: level,
            feedback: t.feedback.into(),
            what_to_say: t.what_to_say.into(),
            what_to_do: t.what_to_do.into(),
            next_steps: t.next_steps.iter().map(|s| s.to_string()).collect(),
            confidence: t.confidence,
            updated_at: now_ms,
        }
        .sanitized()
    }
}

fn compile_bank(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| Error::Config(format!("risk pattern {p:?}: {e}"))))
        .collect()
}

fn count_hits(bank: &[Regex], text: &str) -> usize {
    bank.iter().map(|re| re.find_iter(text).count()).sum()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response templates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Template {
    feedback: &'static str,
    what_to_say: &'static str,
    what_to_do: &'static str,
    next_steps: &'static [&'static str],
    confidence: f32,
}

fn template_for(level: RiskLevel) -> Template {
    match level {
        RiskLevel::Low => Template {
            feedback: "No strong scam markers yet. Stay alert and keep control of the pace.",
            what_to_say: "Can you spell your name and tell me which department you're calling from?",
            what_to_do: "Ask who is calling and why, and write the details down.",
            next_steps: &[
                "Do not share codes, passwords, or account numbers.",
                "Verify the caller through an official number if anything feels off.",
            ],
            confidence: 0.45,
        },
        RiskLevel::Medium => Template {
            feedback: "Pressure tactics detected. Verify this caller before acting on anything.",
            what_to_say: "I don't act on calls I didn't start. I'll verify this through the \
                          official number.",
            what_to_do: "Slow the call down and verify the request through an official channel.",
            next_steps: &[
                "Never read out one-time codes or passwords.",
                "Hang up if the caller resists verification.",
            ],
            confidence: 0.50,
        },
        RiskLevel::High => Template {
            feedback: "Strong scam indicators. Verify independently before doing anything \
                       this caller asks.",
            what_to_say: "I'm going to hang up and call the official number myself.",
            what_to_do: "Hang up now and call the organization back on its official number.",
            next_steps: &[
                "Do not send money, gift cards, or crypto.",
                "Report the call to your bank or local authorities.",
            ],
            confidence: 0.55,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_domain::call::Speaker;

    fn chunk(text: &str) -> TranscriptChunk {
        TranscriptChunk {
            source_event_id: format!("ev-{}", text.len()),
            speaker: Speaker::Caller,
            text: text.into(),
            timestamp_ms: 0,
            is_final: true,
        }
    }

    #[test]
    fn quiet_transcript_scores_base() {
        let banks = RiskBanks::compile().unwrap();
        let advice = banks.advise(&[chunk("hello, how is the weather")], 1);
        assert_eq!(advice.risk_score, 20);
        assert_eq!(advice.risk_level, RiskLevel::Low);
        assert_eq!(advice.confidence, 0.45);
    }

    #[test]
    fn pressure_phrases_cross_into_medium() {
        let banks = RiskBanks::compile().unwrap();
        let advice = banks.advise(&[chunk("you must wire transfer the fee urgent immediately")], 1);
        // wire transfer + urgent + immediately = 3 HIGH hits.
        assert!(advice.risk_score >= 40, "score {}", advice.risk_score);
        assert_eq!(advice.risk_level, RiskLevel::Medium);
        assert!(advice.feedback.to_lowercase().contains("verify"));
    }

    #[test]
    fn gift_cards_and_otp_both_count() {
        let banks = RiskBanks::compile().unwrap();
        let advice = banks.advise(
            &[
                chunk("buy gift cards at the store"),
                chunk("then read me the OTP you received"),
            ],
            1,
        );
        assert!(advice.risk_score >= 50);
    }

    #[test]
    fn score_clamps_at_ninety_five() {
        let banks = RiskBanks::compile().unwrap();
        let advice = banks.advise(
            &[chunk(
                "urgent arrest warrant, wire transfer bitcoin gift card now, \
                 share your SSN and bank account and routing number immediately",
            )],
            1,
        );
        assert_eq!(advice.risk_score, 95);
        assert_eq!(advice.risk_level, RiskLevel::High);
    }

    #[test]
    fn medium_bank_scores_lighter() {
        let banks = RiskBanks::compile().unwrap();
        let advice = banks.advise(&[chunk("this is tech support about suspicious activity")], 1);
        // 20 + 8 + 8 = 36: still low band.
        assert_eq!(advice.risk_score, 36);
        assert_eq!(advice.risk_level, RiskLevel::Low);
    }

    #[test]
    fn templates_never_direct_sharing_credentials() {
        let banks = RiskBanks::compile().unwrap();
        for text in ["hi", "wire transfer urgent", "arrest warrant gift card otp pay now"] {
            let advice = banks.advise(&[chunk(text)], 1);
            let action = advice.what_to_do.to_lowercase();
            assert!(!action.contains("share your"), "{action}");
            assert!(!action.starts_with("give"), "{action}");
        }
    }

    #[test]
    fn only_the_tail_window_is_scored() {
        let banks = RiskBanks::compile().unwrap();
        let mut chunks: Vec<TranscriptChunk> = (0..WINDOW_CHUNKS)
            .map(|i| chunk(&format!("benign line {i}")))
            .collect();
        chunks.insert(0, chunk("wire transfer bitcoin urgent"));
        let advice = banks.advise(&chunks, 1);
        // The risky chunk fell outside the 10-chunk window.
        assert_eq!(advice.risk_score, 20);
    }
}
