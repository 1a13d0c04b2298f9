//! Case provisioning and call initiation.
//!
//! Thin routes around the core pipeline: mint a case, register the
//! protected number, and trigger the outbound monitor call that the
//! provider bridges into the user's conversation.

use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use cc_domain::call::validate_slug;
use cc_domain::error::Error;
use cc_telephony::normalize_phone;

use crate::api::error::ApiError;
use crate::state::AppState;

const CALL_IP_LIMIT: u32 = 5;
const CALL_IP_WINDOW: Duration = Duration::from_secs(60);
const CALL_SLUG_COOLDOWN: Duration = Duration::from_secs(30);

const PHONE_IP_LIMIT: u32 = 20;
const PHONE_IP_WINDOW: Duration = Duration::from_secs(600);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /start
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Mint a fresh case and send the browser to its page.
pub async fn start(State(state): State<AppState>) -> Response {
    let slug = state.cases.create();
    (
        StatusCode::FOUND,
        [(header::LOCATION, format!("/t/{slug}"))],
    )
        .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PUT /phone
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePhoneRequest {
    pub slug: String,
    pub phone_number: String,
    /// Replace a different number already on file.
    #[serde(default, rename = "override")]
    pub replace: bool,
}

pub async fn save_phone(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SavePhoneRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state
        .limiter
        .take(&client_key(&headers), PHONE_IP_LIMIT, PHONE_IP_WINDOW)
    {
        return Err(Error::RateLimited {
            retry_in_secs: PHONE_IP_WINDOW.as_secs(),
        }
        .into());
    }

    check_slug(&req.slug)?;
    if !state.cases.exists(&req.slug) {
        return Err(Error::NotFound.into());
    }

    let normalized = normalize_phone(&req.phone_number)?;
    state.cases.set_phone(&req.slug, &normalized, req.replace)?;

    tracing::info!(slug = %req.slug, "protected number registered");
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /call
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct PlaceCallRequest {
    pub slug: String,
}

pub async fn place_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PlaceCallRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state
        .limiter
        .take(&client_key(&headers), CALL_IP_LIMIT, CALL_IP_WINDOW)
    {
        return Err(Error::RateLimited {
            retry_in_secs: CALL_IP_WINDOW.as_secs(),
        }
        .into());
    }

    check_slug(&req.slug)?;
    if !state.cases.exists(&req.slug) {
        return Err(Error::NotFound.into());
    }
    let Some(phone) = state.cases.phone(&req.slug) else {
        return Err(Error::BadRequest("no protected number on file for this case".into()).into());
    };

    let remaining = state.cooldowns.take(&req.slug, CALL_SLUG_COOLDOWN);
    if remaining > 0 {
        return Err(Error::RateLimited {
            retry_in_secs: remaining,
        }
        .into());
    }

    if !state.dialer.is_configured() {
        return Err(Error::Config("telephony provider is not configured".into()).into());
    }

    let webhook_url = webhook_url(&state, &headers, &req.slug);
    let placed = state.dialer.place_monitor_call(&phone, &webhook_url).await?;

    state
        .store
        .upsert_session(&placed.call_id, &req.slug, Some(placed.status))?;

    tracing::info!(slug = %req.slug, call_id = %placed.call_id, "monitor call placed");
    Ok(Json(serde_json::json!({
        "ok": true,
        "callId": placed.call_id,
        "status": placed.status,
    })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn check_slug(slug: &str) -> Result<(), ApiError> {
    if validate_slug(slug) {
        Ok(())
    } else {
        Err(Error::BadRequest("malformed case slug".into()).into())
    }
}

/// Limiter key for the requesting client. Behind a proxy this is the first
/// forwarded address; otherwise requests share one bucket.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "direct".into())
}

/// Where the provider should deliver events for this call.
fn webhook_url(state: &AppState, headers: &HeaderMap, slug: &str) -> String {
    let base = state
        .config
        .server
        .public_base_url
        .clone()
        .unwrap_or_else(|| {
            let proto = headers
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("https");
            let host = headers
                .get("x-forwarded-host")
                .or_else(|| headers.get("host"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("localhost");
            format!("{proto}://{host}")
        });
    format!("{}/webhook?slug={slug}", base.trim_end_matches('/'))
}
