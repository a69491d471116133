// File: tests/service.rs
// End-to-end tests for the chat HTTP API.
//
// Drives the axum router with tower::ServiceExt::oneshot over an in-memory
// model; no sockets or model files needed.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chat_core::ChatEngine;
use chat_core::core::context::Context;
use chat_core::core::tokenizer::Tokenizer;
use chat_core::core::types::QaPair;
use chat_core::generator::GenerationParams;
use chat_core::service::{self, AppState, DONE};
use chat_core::store::{FrequencyStore, MemoryStore};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

// ──────────── Test Infrastructure ────────────

fn test_app(answers: &[&str]) -> Router {
    let pairs: Vec<QaPair> = answers
        .iter()
        .map(|a| QaPair::new("질문", a).unwrap())
        .collect();
    let params = GenerationParams {
        max_len: 30,
        temperature: 0.8,
        seed: Some(11),
    };
    let engine = ChatEngine::in_memory(&pairs, 3, params).unwrap();
    let state = Arc::new(AppState {
        engine,
        token_delay: Duration::ZERO,
        stream_timeout: None,
    });
    service::router(state)
}

/// A unigram model where `네` is always followed by `네`, so generation only
/// stops at `max_len` (or earlier, when the service cuts it off).
fn looping_app(max_len: usize, token_delay: Duration, stream_timeout: Option<Duration>) -> Router {
    let mut store = MemoryStore::new(1);
    store.upsert_increment(&Context::new(["네"]), "네").unwrap();
    let params = GenerationParams {
        max_len,
        temperature: 0.8,
        seed: Some(3),
    };
    let engine = ChatEngine::new(Arc::new(store), Tokenizer::default(), params);
    let state = Arc::new(AppState {
        engine,
        token_delay,
        stream_timeout,
    });
    service::router(state)
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Data payloads of every SSE event in the body, in order.
fn sse_data(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter_map(|event| {
            event
                .lines()
                .find_map(|line| line.strip_prefix("data:"))
                .map(|d| d.trim_start().to_string())
        })
        .collect()
}

async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

// ──────────── Tests ────────────

#[tokio::test]
async fn stream_carries_cumulative_text_then_done() {
    let app = test_app(&["안녕. 반가워요!"]);
    // message=안녕
    let response = get(app, "/chat?message=%EC%95%88%EB%85%95").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = sse_data(&body_string(response).await);
    assert_eq!(
        events,
        vec!["안녕", "안녕.", "안녕. 반가워요", "안녕. 반가워요!", DONE]
    );
}

#[tokio::test]
async fn unknown_seed_ends_gracefully() {
    let app = test_app(&["좋아요."]);
    // message=안녕 is not in this model
    let response = get(app, "/chat?message=%EC%95%88%EB%85%95").await;
    assert_eq!(response.status(), StatusCode::OK);
    let events = sse_data(&body_string(response).await);
    assert_eq!(events, vec!["안녕", DONE]);
}

#[tokio::test]
async fn empty_message_uses_a_known_opener() {
    let app = test_app(&["좋아요."]);
    let response = get(app, "/chat?message=").await;
    let events = sse_data(&body_string(response).await);
    assert_eq!(events, vec!["좋아요", "좋아요.", DONE]);
}

#[tokio::test]
async fn zero_max_len_streams_only_done() {
    let app = test_app(&["좋아요."]);
    let response = get(app, "/chat?message=%EC%A2%8B%EC%95%84%EC%9A%94&max_len=0").await;
    let events = sse_data(&body_string(response).await);
    assert_eq!(events, vec![DONE]);
}

#[tokio::test]
async fn invalid_temperature_is_rejected_up_front() {
    let app = test_app(&["좋아요."]);
    for t in ["0", "-1"] {
        let response = get(app.clone(), &format!("/chat?message=x&temperature={t}")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["error"]["type"], "invalid_request_error");
    }
}

#[tokio::test]
async fn post_returns_whole_reply() {
    let app = test_app(&["안녕. 반가워요!"]);
    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"message": "안녕"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["reply"], "안녕. 반가워요!");
    assert_eq!(json["finish_reason"], "eos");
}

#[tokio::test]
async fn post_with_bad_temperature_is_400() {
    let app = test_app(&["좋아요."]);
    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"message": "좋아요", "temperature": 0.0}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stream_timeout_cuts_generation_short_and_still_ends_with_done() {
    let max_len = 10_000;
    let app = looping_app(
        max_len,
        Duration::from_millis(1),
        Some(Duration::from_millis(30)),
    );
    // message=네
    let response = get(app, "/chat?message=%EB%84%A4").await;
    assert_eq!(response.status(), StatusCode::OK);
    let events = sse_data(&body_string(response).await);

    assert!(events.len() >= 2);
    assert!(events.len() < max_len, "stream ran to max_len: {}", events.len());
    assert_eq!(events[0], "네");
    assert_eq!(events.last().map(String::as_str), Some(DONE));
}

#[tokio::test]
async fn post_runs_to_max_len_on_a_looping_model() {
    let app = looping_app(200, Duration::ZERO, None);
    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"message": "네", "max_len": 50}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["finish_reason"], "max_length");
    assert_eq!(json["reply"].as_str().unwrap().split(' ').count(), 50);
}

#[tokio::test]
async fn health_reports_model_shape() {
    let app = test_app(&["좋아요."]);
    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["order"], 3);
    // (B,B,B) (B,B,좋아요) (B,좋아요,.)
    assert_eq!(json["contexts"], 3);
}

#[tokio::test]
async fn concurrent_streams_share_one_model() {
    let app = test_app(&["안녕. 반가워요!"]);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let response = get(app, "/chat?message=%EC%95%88%EB%85%95").await;
            sse_data(&body_string(response).await)
        }));
    }
    for handle in handles {
        let events = handle.await.unwrap();
        assert_eq!(events.last().map(String::as_str), Some(DONE));
        assert_eq!(events[events.len() - 2], "안녕. 반가워요!");
    }
}
