//! Prompt assembly for the model scorer.
//!
//! Two messages: a fixed system prompt pinning the output shape and the
//! coaching rules, and a user message carrying the previous advice as a
//! continuity snapshot plus the transcript as `Speaker: text` lines, newest
//! at the bottom.

use cc_domain::advice::CoachingAdvice;
use cc_domain::call::TranscriptChunk;

pub const SYSTEM_PROMPT: &str = "\
You are a real-time anti-scam call coach. The user is on a live phone call \
that may be a scam; you see the transcript as it arrives.

Respond with a single JSON object and nothing else:
{
  \"riskScore\": <integer 0-100>,
  \"feedback\": <one terse sentence on what is happening>,
  \"whatToSay\": <one sentence the user can say right now>,
  \"whatToDo\": <the single next action the user should take>,
  \"nextSteps\": [<up to two short follow-up actions>],
  \"confidence\": <number 0-1>
}

Rules:
- Never advise sharing personal data, codes, passwords, or account details.
- Lead with the action: whatToDo is the most important field.
- Do not move the score sharply without concrete evidence in the transcript.
- Keep every sentence short enough to read mid-call.";

/// Render the user message: continuity snapshot first, then the transcript,
/// newest line at the bottom.
pub fn user_message(
    transcript: &[TranscriptChunk],
    previous: Option<&CoachingAdvice>,
) -> String {
    let mut out = String::new();

    match previous {
        Some(advice) => {
            out.push_str("Previous advice (for continuity):\n");
            out.push_str(&serde_json::to_string(advice).unwrap_or_else(|_| "{}".into()));
            out.push_str("\n\n");
        }
        None => out.push_str("No previous advice yet.\n\n"),
    }

    out.push_str("Transcript (oldest first):\n");
    for chunk in transcript {
        out.push_str(chunk.speaker.as_str());
        out.push_str(": ");
        out.push_str(&chunk.text);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_domain::call::Speaker;

    fn chunk(speaker: Speaker, text: &str) -> TranscriptChunk {
        TranscriptChunk {
            source_event_id: "ev".into(),
            speaker,
            text: text.into(),
            timestamp_ms: 0,
            is_final: true,
        }
    }

    #[test]
    fn transcript_renders_speaker_lines_in_order() {
        let msg = user_message(
            &[
                chunk(Speaker::Caller, "hello"),
                chunk(Speaker::Other, "send gift cards"),
            ],
            None,
        );
        let hello = msg.find("caller: hello").unwrap();
        let cards = msg.find("other: send gift cards").unwrap();
        assert!(hello < cards, "newest at the bottom");
        assert!(msg.starts_with("No previous advice yet."));
    }

    #[test]
    fn previous_advice_is_embedded_as_json() {
        let advice = CoachingAdvice::starter(9);
        let msg = user_message(&[], Some(&advice));
        assert!(msg.contains("\"riskScore\":20"));
        assert!(msg.contains("continuity"));
    }

    #[test]
    fn system_prompt_pins_shape_and_rules() {
        assert!(SYSTEM_PROMPT.contains("riskScore"));
        assert!(SYSTEM_PROMPT.contains("Never advise sharing"));
    }
}
