//! Health probe.

use axum::response::Json;

/// `GET /health` — public, used by deploy probes.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
