//! Webhook ingest — the provider's speech-to-text events land here.
//!
//! `POST /webhook?slug=…`. The raw body is kept verbatim for signature
//! verification, then parsed, persisted (session upsert + idempotent chunk
//! append), and acknowledged synchronously with 200. Advice work is
//! dispatched asynchronously to the call's worker — a later advice failure
//! never turns into a webhook failure.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use cc_telephony::parser::{self, FormFields};
use cc_telephony::signature::{self, SignedPayload};

use crate::api::error::api_error;
use crate::state::AppState;

/// Signature header names we accept, in preference order.
const SIGNATURE_HEADERS: &[&str] = &["x-twilio-signature", "x-provider-signature"];

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    #[serde(default)]
    pub slug: Option<String>,
}

pub async fn ingest(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = header(&headers, "content-type");

    // ── 1. Signature ──────────────────────────────────────────────
    if !state.config.provider.skip_signature_validation {
        if !verify_signature(&state, &uri, &headers, &body, content_type.as_deref()) {
            return api_error(StatusCode::UNAUTHORIZED, "invalid webhook signature");
        }
    }

    // ── 2. Parse + account match ──────────────────────────────────
    let event = parser::parse_event(&body, content_type.as_deref(), query.slug.as_deref());

    if let (Some(expected), Some(got)) = (
        state.config.provider.account_id.as_deref(),
        event.account_id.as_deref(),
    ) {
        if expected != got {
            tracing::warn!(got, "webhook for foreign account rejected");
            return api_error(StatusCode::UNAUTHORIZED, "account mismatch");
        }
    }

    // Events without a call id are acknowledged and dropped.
    let Some(call_id) = event.call_id else {
        return Json(serde_json::json!({ "ok": true })).into_response();
    };

    // ── 3. Resolve slug ───────────────────────────────────────────
    let slug = event
        .slug
        .or_else(|| state.store.get_session(&call_id).map(|s| s.slug));
    let Some(slug) = slug else {
        return api_error(StatusCode::BAD_REQUEST, "no case slug for this call");
    };

    // ── 4. Persist ────────────────────────────────────────────────
    if let Err(err) = state.store.upsert_session(&call_id, &slug, event.status) {
        tracing::error!(%err, call_id, "session upsert failed");
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "could not record event");
    }

    let mut force_model = event.status.map(|s| s.is_terminal()).unwrap_or(false);
    if let Some(chunk) = event.transcript {
        force_model |= chunk.is_final;
        match state.store.append_chunk(&call_id, chunk) {
            Ok(inserted) => {
                tracing::debug!(call_id, inserted, "transcript chunk processed");
            }
            Err(err) => {
                tracing::error!(%err, call_id, "chunk append failed");
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, "could not record event");
            }
        }
    }

    // ── 5. Dispatch advice work, acknowledge ──────────────────────
    state.workers.enqueue(&call_id, force_model);
    Json(serde_json::json!({ "ok": true })).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Signature plumbing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn verify_signature(
    state: &AppState,
    uri: &Uri,
    headers: &HeaderMap,
    body: &Bytes,
    content_type: Option<&str>,
) -> bool {
    let Some(auth_token) = state.config.provider.auth_token.as_deref() else {
        tracing::error!("webhook received but no auth token is configured");
        return false;
    };
    let Some(sig) = SIGNATURE_HEADERS.iter().find_map(|h| header(headers, h)) else {
        return false;
    };

    let candidates = signature::url_candidates(
        &received_url(uri, headers),
        header(headers, "x-forwarded-host").as_deref(),
        header(headers, "x-forwarded-proto").as_deref(),
        state.config.server.public_base_url.as_deref(),
    );

    if parser::looks_like_json(body, content_type) {
        signature::verify(auth_token, &sig, &candidates, &SignedPayload::Json(body))
    } else {
        let form = FormFields::parse(body);
        signature::verify(
            auth_token,
            &sig,
            &candidates,
            &SignedPayload::Form(form.pairs()),
        )
    }
}

/// Reconstruct the URL this request arrived on from the Host header and the
/// request target.
fn received_url(uri: &Uri, headers: &HeaderMap) -> String {
    let host = header(headers, "host").unwrap_or_else(|| "localhost".into());
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/webhook");
    format!("http://{host}{path_and_query}")
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
