//! Integration tests for the ConversationalTax API.
//!
//! Each test builds its own router over an in-memory database and a scripted
//! intent detector, then drives it with `oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use convtax_api::create_router;
use convtax_api::handlers::{HealthResponse, HistoryResponse, NotificationsResponse, TextResponse};
use convtax_api::state::AppState;
use convtax_chat::{END_DATE_ERROR, START_DATE_ERROR};
use convtax_core::config::ConvTaxConfig;
use convtax_core::types::{EndDate, Notification, NOT_SPECIFIED};
use convtax_nlu::{AudioEncoding, DetectCall, DetectIntentResponse, ScriptedDetector};
use convtax_storage::{ContractRepository, Database, UserRepository};

// =============================================================================
// Helpers
// =============================================================================

const BOUNDARY: &str = "convtax-test-boundary";

/// Fresh state over an in-memory DB, with the detector exposed for scripting.
fn make_state() -> (AppState, Arc<ScriptedDetector>) {
    let detector = Arc::new(ScriptedDetector::new());
    let state = AppState::new(
        ConvTaxConfig::default(),
        Database::in_memory().unwrap(),
        detector.clone(),
    );
    (state, detector)
}

fn post_json(uri: &str, json: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

/// Multipart request with one part per `(field, filename, bytes)`.
fn post_multipart(uri: &str, parts: &[(&str, &str, Vec<u8>)]) -> Request<Body> {
    let mut body = Vec::new();
    for (field, filename, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: audio/x-amr\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

/// Read full response body bytes.
async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn history_of(state: &AppState, user_id: &str) -> HistoryResponse {
    let resp = create_router(state.clone())
        .oneshot(get(&format!("/lang/history?u_id={}", user_id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (state, _) = make_state();
    let resp = create_router(state).oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert!(!health.version.is_empty());
}

// =============================================================================
// POST /lang/text
// =============================================================================

#[tokio::test]
async fn test_text_returns_agent_reply_and_logs_once() {
    let (state, detector) = make_state();
    detector.push(DetectIntentResponse::recognized(
        "Hallo",
        "projects/test-c7ec0/agent/intents/welcome",
        "Default Welcome Intent",
        "Hallo! Wie kann ich dir helfen?",
    ));

    let resp = create_router(state.clone())
        .oneshot(post_json("/lang/text?u_id=user-1", json!({ "textInput": "Hallo" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: TextResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.text, "Hallo! Wie kann ich dir helfen?");

    match &detector.calls()[0] {
        DetectCall::Text { text, user_id } => {
            assert_eq!(text, "Hallo");
            assert_eq!(user_id, "user-1");
        }
        other => panic!("unexpected call: {other:?}"),
    }

    let history = history_of(&state, "user-1").await;
    assert_eq!(history.entries.len(), 1);
    assert_eq!(
        history.entries[0].intent_name,
        "projects/test-c7ec0/agent/intents/welcome"
    );
}

#[tokio::test]
async fn test_text_without_intent_logs_placeholder() {
    let (state, detector) = make_state();
    detector.push(
        serde_json::from_value(json!({ "queryResult": { "queryText": "blub" } })).unwrap(),
    );

    let resp = create_router(state.clone())
        .oneshot(post_json("/lang/text?u_id=u", json!({ "textInput": "blub" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let history = history_of(&state, "u").await;
    assert_eq!(history.entries.len(), 1);
    assert_eq!(history.entries[0].intent_name, NOT_SPECIFIED);
}

#[tokio::test]
async fn test_text_missing_user_is_bad_request() {
    let (state, detector) = make_state();
    let resp = create_router(state)
        .oneshot(post_json("/lang/text", json!({ "textInput": "Hallo" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body["error"], "bad_request");
    assert_eq!(detector.call_count(), 0);
}

#[tokio::test]
async fn test_text_nlu_failure_is_internal_error() {
    let (state, _detector) = make_state();
    // Nothing scripted: the detector reports an exhausted queue.
    let resp = create_router(state)
        .oneshot(post_json("/lang/text?u_id=u", json!({ "textInput": "Hallo" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body["error"], "internal_error");
}

#[tokio::test]
async fn test_create_contract_then_unlimited_end_date() {
    let (state, detector) = make_state();
    let intents = state.config.intents.clone();

    detector.push(DetectIntentResponse::recognized(
        "Ich habe einen neuen Job",
        &intents.create_contract,
        "contract.create",
        "Super, ich lege einen Vertrag an.",
    ));
    let resp = create_router(state.clone())
        .oneshot(post_json(
            "/lang/text?u_id=u1",
            json!({ "textInput": "Ich habe einen neuen Job" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert!(UserRepository::new(state.database.clone()).exists("u1").unwrap());
    let contracts = ContractRepository::new(state.database.clone());
    let contract_id = contracts.list_for_user("u1").unwrap()[0].id.clone();

    for _ in 0..2 {
        detector.push(
            DetectIntentResponse::recognized(
                "unbefristet",
                &intents.set_end_date_unlimited,
                "contract.end",
                "Alles klar, unbefristet.",
            )
            .with_parameters(json!({ "EmploymentContract": contract_id })),
        );
        let resp = create_router(state.clone())
            .oneshot(post_json("/lang/text?u_id=u1", json!({ "textInput": "unbefristet" })))
            .await
            .unwrap();
        let body: TextResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(body.text, "Alles klar, unbefristet.");
    }

    let contract = contracts.find_by_id(&contract_id).unwrap().unwrap();
    assert_eq!(contract.end_date, Some(EndDate::unlimited()));
    assert_eq!(history_of(&state, "u1").await.entries.len(), 3);
}

#[tokio::test]
async fn test_date_edit_failures_return_fixed_messages() {
    let (state, detector) = make_state();
    let intents = state.config.intents.clone();

    detector.push(
        DetectIntentResponse::recognized("ab März", &intents.set_start_date, "s", "ok")
            .with_parameters(json!({ "EmploymentContract": "missing", "StartDateAsDate": "2019-03-01" })),
    );
    detector.push(
        DetectIntentResponse::recognized("unbefristet", &intents.set_end_date_unlimited, "e", "ok")
            .with_parameters(json!({ "EmploymentContract": "missing" })),
    );

    let mut replies = Vec::new();
    for text in ["ab März", "unbefristet"] {
        let resp = create_router(state.clone())
            .oneshot(post_json("/lang/text?u_id=u1", json!({ "textInput": text })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: TextResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        replies.push(body.text);
    }

    assert_eq!(replies, vec![START_DATE_ERROR.to_string(), END_DATE_ERROR.to_string()]);
    assert_eq!(history_of(&state, "u1").await.entries.len(), 2);
}

#[tokio::test]
async fn test_help_without_history_returns_fallback() {
    let (state, detector) = make_state();
    let intents = state.config.intents.clone();
    detector.push(DetectIntentResponse::recognized("Hilfe", &intents.help, "help", "agent"));

    let resp = create_router(state.clone())
        .oneshot(post_json("/lang/text?u_id=u1", json!({ "textInput": "Hilfe" })))
        .await
        .unwrap();
    let body: TextResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.text, state.config.explanations.no_history);
}

async fn say(state: &AppState, user_id: &str, text: &str) -> String {
    let resp = create_router(state.clone())
        .oneshot(post_json(
            &format!("/lang/text?u_id={}", user_id),
            json!({ "textInput": text }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: TextResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    body.text
}

#[tokio::test]
async fn test_help_after_empty_recording_explains_previous_intent() {
    let (state, detector) = make_state();
    let intents = state.config.intents.clone();

    detector.push(DetectIntentResponse::recognized(
        "neuer Job",
        &intents.create_contract,
        "contract.create",
        "Angelegt.",
    ));
    detector.push(DetectIntentResponse::default());
    detector.push(DetectIntentResponse::recognized("Hilfe", &intents.help, "help", "agent"));

    say(&state, "u1", "neuer Job").await;
    assert_eq!(say(&state, "u1", "").await, "");
    let reply = say(&state, "u1", "Hilfe").await;

    assert_eq!(reply, state.config.explanations.help[&intents.create_contract]);
    assert_eq!(history_of(&state, "u1").await.entries.len(), 3);
}

#[tokio::test]
async fn test_context_without_history_returns_fallback() {
    let (state, detector) = make_state();
    let intents = state.config.intents.clone();
    detector.push(DetectIntentResponse::recognized("Hilfe", &intents.help, "help", "agent"));
    detector.push(DetectIntentResponse::recognized("Warum?", &intents.context, "context", "agent"));

    say(&state, "u1", "Hilfe").await;
    let reply = say(&state, "u1", "Warum?").await;
    assert_eq!(reply, state.config.explanations.no_history);
}

// =============================================================================
// POST /lang/audio_upload
// =============================================================================

#[tokio::test]
async fn test_audio_upload_android() {
    let (state, detector) = make_state();
    detector.push(DetectIntentResponse::recognized(
        "neuer Vertrag",
        "projects/test-c7ec0/agent/intents/other",
        "other",
        "Verstanden.",
    ));

    let resp = create_router(state.clone())
        .oneshot(post_multipart(
            "/lang/audio_upload?u_id=u1&platform=android",
            &[("file", "recording.amr", vec![0, 1, 2])],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: TextResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.text, "Verstanden.");

    match &detector.calls()[0] {
        DetectCall::Audio {
            settings,
            base64_audio,
            user_id,
        } => {
            assert_eq!(settings.encoding, AudioEncoding::AmrWb);
            assert_eq!(settings.sample_rate_hertz, 16_000);
            assert_eq!(base64_audio, "AAEC");
            assert_eq!(user_id, "u1");
        }
        other => panic!("unexpected call: {other:?}"),
    }
    assert_eq!(history_of(&state, "u1").await.entries.len(), 1);
}

#[tokio::test]
async fn test_audio_upload_ios_uses_linear16() {
    let (state, detector) = make_state();
    detector.push(DetectIntentResponse::recognized("x", "i", "d", "f"));

    let resp = create_router(state)
        .oneshot(post_multipart(
            "/lang/audio_upload?u_id=u1&platform=ios",
            &[("file", "recording.wav", b"RIFF".to_vec())],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    match &detector.calls()[0] {
        DetectCall::Audio { settings, .. } => {
            assert_eq!(settings.encoding, AudioEncoding::Linear16)
        }
        other => panic!("unexpected call: {other:?}"),
    }
}

#[tokio::test]
async fn test_audio_upload_unknown_platform_never_reaches_nlu() {
    for platform in ["windows", "Android", ""] {
        let (state, detector) = make_state();
        let resp = create_router(state.clone())
            .oneshot(post_multipart(
                &format!("/lang/audio_upload?u_id=u1&platform={}", platform),
                &[("file", "recording.amr", vec![1, 2, 3])],
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "platform {platform:?}");
        assert_eq!(detector.call_count(), 0);
        assert!(history_of(&state, "u1").await.entries.is_empty());
    }
}

#[tokio::test]
async fn test_audio_upload_without_file_is_bad_request() {
    let (state, detector) = make_state();

    let no_parts = create_router(state.clone())
        .oneshot(post_multipart("/lang/audio_upload?u_id=u1&platform=android", &[]))
        .await
        .unwrap();
    assert_eq!(no_parts.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body_bytes(no_parts).await).unwrap();
    assert_eq!(body["message"], "No audio file was uploaded");

    let wrong_field = create_router(state.clone())
        .oneshot(post_multipart(
            "/lang/audio_upload?u_id=u1&platform=android",
            &[("audio", "recording.amr", vec![1])],
        ))
        .await
        .unwrap();
    assert_eq!(wrong_field.status(), StatusCode::BAD_REQUEST);

    let empty_file = create_router(state.clone())
        .oneshot(post_multipart(
            "/lang/audio_upload?u_id=u1&platform=android",
            &[("file", "recording.amr", Vec::new())],
        ))
        .await
        .unwrap();
    assert_eq!(empty_file.status(), StatusCode::BAD_REQUEST);

    let not_multipart = create_router(state)
        .oneshot(
            Request::post("/lang/audio_upload?u_id=u1&platform=android")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(not_multipart.status(), StatusCode::BAD_REQUEST);

    assert_eq!(detector.call_count(), 0);
}

// =============================================================================
// GET /lang/history
// =============================================================================

#[tokio::test]
async fn test_history_most_recent_first_with_limit() {
    let (state, detector) = make_state();
    for text in ["eins", "zwei", "drei"] {
        detector.push(DetectIntentResponse::recognized(text, "i", "d", text));
        let resp = create_router(state.clone())
            .oneshot(post_json("/lang/text?u_id=u1", json!({ "textInput": text })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = create_router(state.clone())
        .oneshot(get("/lang/history?u_id=u1&limit=2"))
        .await
        .unwrap();
    let history: HistoryResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    let queries: Vec<&str> = history.entries.iter().map(|e| e.query_text.as_str()).collect();
    assert_eq!(queries, vec!["drei", "zwei"]);

    let other = history_of(&state, "someone-else").await;
    assert!(other.entries.is_empty());
}

#[tokio::test]
async fn test_history_requires_user() {
    let (state, _) = make_state();
    let resp = create_router(state).oneshot(get("/lang/history")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// /lang/notifications
// =============================================================================

#[tokio::test]
async fn test_notifications_create_and_list() {
    let (state, _) = make_state();

    for title in ["Frist", "Erinnerung"] {
        let resp = create_router(state.clone())
            .oneshot(post_json(
                "/lang/notifications?u_id=u1",
                json!({ "title": title, "description": "Steuererklärung abgeben" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Notification = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(created.user_id, "u1");
        assert_eq!(created.title, title);
    }

    let resp = create_router(state.clone())
        .oneshot(get("/lang/notifications?u_id=u1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let listed: NotificationsResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    let titles: Vec<&str> = listed.notifications.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Erinnerung", "Frist"]);

    let resp = create_router(state)
        .oneshot(get("/lang/notifications?u_id=u2"))
        .await
        .unwrap();
    let listed: NotificationsResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert!(listed.notifications.is_empty());
}

#[tokio::test]
async fn test_notifications_validation() {
    let (state, _) = make_state();

    let resp = create_router(state.clone())
        .oneshot(get("/lang/notifications"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = create_router(state)
        .oneshot(post_json("/lang/notifications?u_id=u1", json!({ "title": "  " })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
