pub mod calls;
pub mod error;
pub mod health;
pub mod live;
pub mod webhook;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health probe (public, used by deploy probes)
        .route("/health", get(health::health))
        // Provider webhook (signature-gated)
        .route("/webhook", post(webhook::ingest))
        // Live view
        .route("/live", get(live::snapshot))
        .route("/live/events", get(live::events))
        // Provisioning + call initiation
        .route("/start", get(calls::start))
        .route("/phone", put(calls::save_phone))
        .route("/call", post(calls::place_call))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
