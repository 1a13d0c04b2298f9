//! Live view read path: the snapshot endpoint and the SSE push channel.
//!
//! Clients subscribe to `/live/events` for row-level changes and poll
//! `/live` on a coarse (~6 s) timer as fallback; duplicate transcript ids
//! merge client-side by `seq`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use cc_store::{Snapshot, StoreEvent};

use crate::api::error::api_error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    #[serde(rename = "callId")]
    pub call_id: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
struct LiveResponse {
    ok: bool,
    #[serde(flatten)]
    snapshot: Snapshot,
}

/// `GET /live?callId=&slug=` — session state plus the transcript tail.
pub async fn snapshot(
    State(state): State<AppState>,
    Query(query): Query<LiveQuery>,
) -> Response {
    let limit = state.config.live.clamped_transcript_limit();
    let Some(snapshot) = state.store.get_snapshot(&query.call_id, &query.slug, limit) else {
        return api_error(StatusCode::NOT_FOUND, "unknown call");
    };

    (
        [(axum::http::header::CACHE_CONTROL, "no-store")],
        Json(LiveResponse { ok: true, snapshot }),
    )
        .into_response()
}

/// `GET /live/events?callId=&slug=` — SSE stream of row changes for one
/// call. Closes after the session reaches a terminal status.
pub async fn events(
    State(state): State<AppState>,
    Query(query): Query<LiveQuery>,
) -> Response {
    // Slug check up front; absent rows get a terminal error event.
    if state.store.get_snapshot(&query.call_id, &query.slug, 1).is_none() {
        let stream = futures_util::stream::once(async {
            Ok::<_, std::convert::Infallible>(
                Event::default().event("error").data(r#"{"error":"unknown call"}"#),
            )
        });
        return Sse::new(stream).keep_alive(KeepAlive::default()).into_response();
    }

    let rx = state.store.subscribe(&query.call_id);
    Sse::new(event_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn event_stream(
    mut rx: broadcast::Receiver<StoreEvent>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let terminal = matches!(
                        &event,
                        StoreEvent::Session { session } if session.status.is_terminal()
                    );
                    let name = match &event {
                        StoreEvent::Session { .. } => "session",
                        StoreEvent::Chunk { .. } => "chunk",
                    };
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(Event::default().event(name).data(data));
                    if terminal {
                        // One final session event, then close.
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    let msg = format!("{{\"warning\":\"missed {n} events\"}}");
                    yield Ok(Event::default().event("lagged").data(msg));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
