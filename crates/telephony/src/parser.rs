//! Transcript-event parser.
//!
//! Providers disagree about payload shape (form-encoded vs JSON), key casing
//! (`CallSid` / `callSid` / `call_sid`), and where the transcript text hides
//! (top-level, `TranscriptionData` JSON string, or `segments[0]`). The parser
//! sniffs the content type, then extracts each semantic field through a
//! [`FieldExtractor`] — a form-map adapter or a depth-limited JSON-tree
//! walker — by normalized-key alias matching.
//!
//! Every transcript fragment gets a deterministic dedup fingerprint so
//! webhook retries collapse to a single stored chunk.

use serde_json::Value;
use sha1::{Digest, Sha1};

use cc_domain::advice::now_ms;
use cc_domain::call::{CallStatus, Speaker, TranscriptChunk};

/// How deep the JSON walker descends looking for a field.
const MAX_WALK_DEPTH: usize = 4;

const CALL_ID_ALIASES: &[&str] = &["CallSid", "call_id", "callId", "sid"];
const ACCOUNT_ALIASES: &[&str] = &["AccountSid", "account_id"];
const SLUG_ALIASES: &[&str] = &["slug", "case", "caseSlug"];
const STATUS_ALIASES: &[&str] = &["CallStatus", "call_status", "status"];
const TEXT_ALIASES: &[&str] = &["TranscriptionText", "transcript", "text", "SpeechResult"];
const TRACK_ALIASES: &[&str] = &["Track", "Channel", "ParticipantRole"];
const FINAL_ALIASES: &[&str] = &["IsFinal", "final"];
const EVENT_ALIASES: &[&str] = &["TranscriptionEvent", "EventType", "event"];
const TIMESTAMP_ALIASES: &[&str] = &["Timestamp", "timestamp_ms"];
const SEGMENT_SID_ALIASES: &[&str] = &["SegmentSid", "segment_sid"];
const SOURCE_HINT_ALIASES: &[&str] = &["SourceEventId", "EventSid", "event_id"];
const TRANSCRIPTION_SID_ALIASES: &[&str] = &["TranscriptionSid"];
const SEQUENCE_ALIASES: &[&str] = &["SequenceId", "SequenceNumber"];

/// What the ingest path needs from one provider event. Every field is
/// optional — the ingest decides what a usable event looks like.
#[derive(Debug, Default)]
pub struct ParsedEvent {
    pub call_id: Option<String>,
    pub account_id: Option<String>,
    pub slug: Option<String>,
    pub status: Option<CallStatus>,
    pub transcript: Option<TranscriptChunk>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Field extraction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A payload-shape-agnostic field source. `get` returns the first non-empty
/// value whose normalized key (lowercased, non-alphanumerics stripped)
/// matches any of the aliases.
pub trait FieldExtractor {
    fn get(&self, aliases: &[&str]) -> Option<String>;
}

/// Strip non-alphanumerics and lowercase, so `CallSid`, `call_sid`, and
/// `callSid` all collapse to `callsid`.
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Form-encoded payload adapter.
pub struct FormFields {
    pairs: Vec<(String, String)>,
}

impl FormFields {
    pub fn parse(body: &[u8]) -> Self {
        let pairs = url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { pairs }
    }

    /// The decoded key/value pairs, as needed by the signature check.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

impl FieldExtractor for FormFields {
    fn get(&self, aliases: &[&str]) -> Option<String> {
        let targets: Vec<String> = aliases.iter().map(|a| normalize_key(a)).collect();
        self.pairs
            .iter()
            .find(|(k, v)| targets.contains(&normalize_key(k)) && !v.trim().is_empty())
            .map(|(_, v)| v.trim().to_string())
    }
}

/// JSON payload adapter: depth-limited document-order tree walk.
pub struct JsonFields {
    root: Value,
}

impl JsonFields {
    pub fn new(root: Value) -> Self {
        Self { root }
    }
}

impl FieldExtractor for JsonFields {
    fn get(&self, aliases: &[&str]) -> Option<String> {
        let targets: Vec<String> = aliases.iter().map(|a| normalize_key(a)).collect();
        walk(&self.root, &targets, 0)
    }
}

fn walk(value: &Value, targets: &[String], depth: usize) -> Option<String> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if targets.contains(&normalize_key(key)) {
                    if let Some(s) = scalar_to_string(child) {
                        return Some(s);
                    }
                }
                if depth + 1 < MAX_WALK_DEPTH {
                    if let Some(found) = walk(child, targets, depth + 1) {
                        return Some(found);
                    }
                }
            }
            None
        }
        Value::Array(items) => {
            if depth + 1 >= MAX_WALK_DEPTH {
                return None;
            }
            items.iter().find_map(|item| walk(item, targets, depth + 1))
        }
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decode a raw webhook body into a [`ParsedEvent`].
///
/// Content sniffing: declared JSON, or a body whose first non-space byte is
/// `{` or `[`, parses as JSON; everything else as form-encoded.
pub fn parse_event(body: &[u8], content_type: Option<&str>, slug_hint: Option<&str>) -> ParsedEvent {
    if looks_like_json(body, content_type) {
        match serde_json::from_slice::<Value>(body) {
            Ok(root) => return extract(&JsonFields::new(root), slug_hint),
            Err(err) => {
                tracing::debug!(%err, "JSON-looking body failed to parse; trying form");
            }
        }
    }
    extract(&FormFields::parse(body), slug_hint)
}

/// Whether a body should be treated as JSON (declared, or sniffed).
pub fn looks_like_json(body: &[u8], content_type: Option<&str>) -> bool {
    if content_type
        .map(|c| c.to_lowercase().contains("json"))
        .unwrap_or(false)
    {
        return true;
    }
    body.iter()
        .find(|b| !b.is_ascii_whitespace())
        .map(|b| *b == b'{' || *b == b'[')
        .unwrap_or(false)
}

fn extract(fields: &dyn FieldExtractor, slug_hint: Option<&str>) -> ParsedEvent {
    let call_id = fields.get(CALL_ID_ALIASES);
    let account_id = fields.get(ACCOUNT_ALIASES);
    let slug = slug_hint
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| fields.get(SLUG_ALIASES));
    let status = fields.get(STATUS_ALIASES).map(|s| CallStatus::normalize(&s));

    // A `TranscriptionData` field may carry a JSON document of its own
    // (providers nest it as a string inside form payloads).
    let data_fields = fields
        .get(&["TranscriptionData"])
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        .map(JsonFields::new);

    let text = fields.get(TEXT_ALIASES).or_else(|| {
        data_fields
            .as_ref()
            .and_then(|d| d.get(&["transcript", "text"]))
    });

    let transcript = text.map(|text| {
        let speaker = Speaker::classify(&fields.get(TRACK_ALIASES).unwrap_or_default());
        let is_final = resolve_finality(fields, data_fields.as_ref());
        let timestamp_ms = resolve_timestamp(fields);
        let primary_id = resolve_primary_id(fields, timestamp_ms, speaker);
        let source_event_id =
            fingerprint(call_id.as_deref().unwrap_or_default(), &primary_id, &text);
        TranscriptChunk {
            source_event_id,
            speaker,
            text: text.trim().to_string(),
            timestamp_ms,
            is_final,
        }
    });

    ParsedEvent {
        call_id,
        account_id,
        slug,
        status,
        transcript,
    }
}

/// Explicit `IsFinal` wins; then `TranscriptionData.isFinal`; then the event
/// type matched against `(final|complete|stopped)`.
fn resolve_finality(fields: &dyn FieldExtractor, data: Option<&JsonFields>) -> bool {
    if let Some(v) = fields.get(FINAL_ALIASES) {
        return parse_bool(&v);
    }
    if let Some(v) = data.and_then(|d| d.get(&["isFinal"])) {
        return parse_bool(&v);
    }
    let event_type = fields.get(EVENT_ALIASES).unwrap_or_default().to_lowercase();
    ["final", "complete", "stopped"]
        .iter()
        .any(|marker| event_type.contains(marker))
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn resolve_timestamp(fields: &dyn FieldExtractor) -> i64 {
    let Some(raw) = fields.get(TIMESTAMP_ALIASES) else {
        return now_ms();
    };
    if let Ok(ms) = raw.parse::<i64>() {
        return ms;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&raw) {
        return dt.timestamp_millis();
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(&raw) {
        return dt.timestamp_millis();
    }
    now_ms()
}

/// First non-empty of: segment sid, explicit source hint,
/// `transcription_sid:sequence_id`, then `timestamp:speaker`.
fn resolve_primary_id(fields: &dyn FieldExtractor, timestamp_ms: i64, speaker: Speaker) -> String {
    if let Some(sid) = fields.get(SEGMENT_SID_ALIASES) {
        return sid;
    }
    if let Some(hint) = fields.get(SOURCE_HINT_ALIASES) {
        return hint;
    }
    if let (Some(tsid), Some(seq)) = (
        fields.get(TRANSCRIPTION_SID_ALIASES),
        fields.get(SEQUENCE_ALIASES),
    ) {
        return format!("{tsid}:{seq}");
    }
    format!("{timestamp_ms}:{}", speaker.as_str())
}

/// SHA-1 hex of `call_id | primary_id | lowercased_trimmed_text`.
pub fn fingerprint(call_id: &str, primary_id: &str, text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(call_id.as_bytes());
    hasher.update(b"|");
    hasher.update(primary_id.as_bytes());
    hasher.update(b"|");
    hasher.update(text.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}
