//! Router-level flows: provisioning, webhook ingest, the advice worker, and
//! the live view, with signature validation exercised separately at the end.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use cc_domain::advice::CoachingAdvice;
use cc_domain::call::{CallStatus, TranscriptChunk};
use cc_domain::config::Config;
use cc_domain::error::Result;
use cc_gateway::api;
use cc_gateway::state::AppState;
use cc_model::{AdviceModel, ModelError};
use cc_telephony::{Dialer, PlacedCall};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fakes + harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct NoModel;

#[async_trait]
impl AdviceModel for NoModel {
    fn is_configured(&self) -> bool {
        false
    }

    async fn score(
        &self,
        _transcript: &[TranscriptChunk],
        _previous: Option<&CoachingAdvice>,
    ) -> std::result::Result<CoachingAdvice, ModelError> {
        unreachable!("model is unconfigured in these tests")
    }
}

struct FakeDialer;

#[async_trait]
impl Dialer for FakeDialer {
    fn is_configured(&self) -> bool {
        true
    }

    async fn place_monitor_call(&self, _to: &str, _webhook_url: &str) -> Result<PlacedCall> {
        Ok(PlacedCall {
            call_id: "CA-test-1".into(),
            status: CallStatus::Queued,
        })
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.provider.skip_signature_validation = true;
    config
}

fn harness(config: Config) -> (Router, AppState) {
    let state = AppState::build(Arc::new(config), Arc::new(NoModel), Arc::new(FakeDialer)).unwrap();
    (api::router().with_state(state.clone()), state)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn form_webhook(slug: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/webhook?slug={slug}"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn live(app: &Router, call_id: &str, slug: &str) -> (StatusCode, serde_json::Value) {
    send(
        app,
        Request::builder()
            .uri(format!("/live?callId={call_id}&slug={slug}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// Poll the snapshot until `check` passes or the deadline hits.
async fn poll_live(
    app: &Router,
    call_id: &str,
    slug: &str,
    check: impl Fn(&serde_json::Value) -> bool,
) -> serde_json::Value {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let (status, body) = live(app, call_id, slug).await;
        if status == StatusCode::OK && check(&body) {
            return body;
        }
        assert!(
            Instant::now() < deadline,
            "snapshot never satisfied the condition; last: {body}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Flows
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn provisioning_and_first_transcripts_lift_the_score() {
    let (app, _state) = harness(test_config());

    // GET /start redirects to the case page.
    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/start").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = resp.headers()[header::LOCATION].to_str().unwrap().to_string();
    let slug = location.strip_prefix("/t/").unwrap().to_string();

    // Register the protected number.
    let (status, body) = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri("/phone")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(
                r#"{{"slug":"{slug}","phoneNumber":"+14155552671"}}"#
            )))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ok"], true);

    // Trigger the monitor call.
    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/call")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(r#"{{"slug":"{slug}"}}"#)))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let call_id = body["callId"].as_str().unwrap().to_string();

    // Provider reports the call live, then streams transcripts.
    let (status, _) = send(
        &app,
        form_webhook(&slug, &format!("CallSid={call_id}&CallStatus=in-progress")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for (i, text) in [
        "you%20need%20to%20buy%20gift%20cards%20today",
        "now%20read%20me%20the%20OTP%20from%20your%20phone",
        "I%20will%20call%20your%20official%20number%20directly",
    ]
    .iter()
    .enumerate()
    {
        let track = if i == 2 { "inbound_track" } else { "outbound_track" };
        let (status, _) = send(
            &app,
            form_webhook(
                &slug,
                &format!(
                    "CallSid={call_id}&TranscriptionText={text}&IsFinal=true\
                     &Track={track}&TranscriptionSid=GT1&SequenceId={i}"
                ),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let snapshot = poll_live(&app, &call_id, &slug, |s| {
        s["transcript"].as_array().map(|t| t.len()).unwrap_or(0) >= 2
            && s["advice"]["riskScore"].as_u64().unwrap_or(0) >= 40
    })
    .await;

    assert_eq!(snapshot["status"], "in-progress");
    assert_eq!(snapshot["ok"], true);
    assert!(snapshot["advice"]["riskLevel"] == "medium" || snapshot["advice"]["riskLevel"] == "high");
}

#[tokio::test]
async fn terminal_transition_propagates_to_the_view() {
    let (app, _state) = harness(test_config());

    send(&app, form_webhook("case-t", "CallSid=CA7&CallStatus=in-progress")).await;
    send(&app, form_webhook("case-t", "CallSid=CA7&CallStatus=completed")).await;

    let (status, body) = live(&app, "CA7", "case-t").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ended");

    // A later status event cannot reopen the call.
    send(&app, form_webhook("case-t", "CallSid=CA7&CallStatus=in-progress")).await;
    let (_, body) = live(&app, "CA7", "case-t").await;
    assert_eq!(body["status"], "ended");
}

#[tokio::test]
async fn duplicate_transcript_events_store_one_chunk() {
    let (app, _state) = harness(test_config());

    let payload = "CallSid=CA8&TranscriptionText=wire%20transfer&IsFinal=true\
                   &TranscriptionSid=GT9&SequenceId=3";
    send(&app, form_webhook("case-d", payload)).await;
    send(&app, form_webhook("case-d", payload)).await;

    let snapshot = poll_live(&app, "CA8", "case-d", |s| {
        !s["transcript"].as_array().map(Vec::is_empty).unwrap_or(true)
    })
    .await;
    assert_eq!(snapshot["transcript"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn heuristic_floor_without_a_model() {
    let (app, _state) = harness(test_config());

    send(
        &app,
        form_webhook(
            "case-h",
            "CallSid=CA9&TranscriptionText=wire%20transfer%20urgent%20immediately&IsFinal=true",
        ),
    )
    .await;

    let snapshot = poll_live(&app, "CA9", "case-h", |s| {
        s["advice"]["riskScore"].as_u64().unwrap_or(0) >= 40
    })
    .await;

    assert_eq!(snapshot["advice"]["riskLevel"], "medium");
    let feedback = snapshot["advice"]["feedback"].as_str().unwrap().to_lowercase();
    assert!(feedback.contains("verify"), "{feedback}");
    let what_to_do = snapshot["advice"]["whatToDo"].as_str().unwrap().to_lowercase();
    for banned in ["share your code", "give your password", "read out your account"] {
        assert!(!what_to_do.contains(banned), "{what_to_do}");
    }
    assert_eq!(snapshot["lastError"], serde_json::Value::Null);
}

#[tokio::test]
async fn unknown_call_or_wrong_slug_is_404() {
    let (app, _state) = harness(test_config());
    let (status, _) = live(&app, "CA-none", "case-x").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, form_webhook("case-y", "CallSid=CA10&CallStatus=ringing")).await;
    let (status, _) = live(&app, "CA10", "case-other").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_without_call_id_is_acknowledged() {
    let (app, _state) = harness(test_config());
    let (status, body) = send(&app, form_webhook("case-z", "TranscriptionText=hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn webhook_without_any_slug_is_rejected() {
    let (app, _state) = harness(test_config());
    let req = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("CallSid=CA11"))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Signature enforcement
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn signed_webhooks_are_enforced_when_enabled() {
    let mut config = Config::default();
    config.provider.account_id = Some("AC1".into());
    config.provider.auth_token = Some("secret-token".into());
    let (app, _state) = harness(config);

    let pairs = vec![
        ("CallSid".to_string(), "CA12".to_string()),
        ("CallStatus".to_string(), "ringing".to_string()),
    ];
    let body = "CallSid=CA12&CallStatus=ringing";
    let url = "http://coach.test/webhook?slug=case-s";

    // Unsigned: rejected.
    let req = Request::builder()
        .method("POST")
        .uri("/webhook?slug=case-s")
        .header(header::HOST, "coach.test")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Signed against the received URL: accepted.
    let sig = cc_telephony::signature::sign_form("secret-token", url, &pairs);
    let req = Request::builder()
        .method("POST")
        .uri("/webhook?slug=case-s")
        .header(header::HOST, "coach.test")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-twilio-signature", sig)
        .body(Body::from(body))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    // Signed against some other URL: rejected.
    let bad = cc_telephony::signature::sign_form(
        "secret-token",
        "http://evil.test/webhook?slug=case-s",
        &pairs,
    );
    let req = Request::builder()
        .method("POST")
        .uri("/webhook?slug=case-s")
        .header(header::HOST, "coach.test")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-twilio-signature", bad)
        .body(Body::from(body))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn foreign_account_events_are_rejected() {
    let mut config = test_config();
    config.provider.account_id = Some("AC1".into());
    let (app, _state) = harness(config);

    let (status, _) = send(
        &app,
        form_webhook("case-a", "CallSid=CA13&AccountSid=AC-other"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
