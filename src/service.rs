// File: src/service.rs
// HTTP surface: a server-sent-events chat stream plus a plain JSON reply.
//
// `GET /chat?message=...` streams `data:` events, each carrying the full
// reply text so far, and ends with a `[DONE]` event. Events are paced by a
// fixed delay. `POST /chat` returns the whole reply at once.

use crate::config::EngineConfig;
use crate::core::engine::ChatEngine;
use crate::core::tokenizer::Detokenizer;
use crate::generator::{FinishReason, GenerationParams};
use crate::sampling::validate_temperature;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

/// Data of the final event of every stream.
pub const DONE: &str = "[DONE]";

/// Shared state passed to handlers. The engine's store is read-only, so no
/// locking is needed between concurrent requests.
pub struct AppState {
    pub engine: ChatEngine,
    pub token_delay: Duration,
    pub stream_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(engine: ChatEngine, config: &EngineConfig) -> Self {
        Self {
            engine,
            token_delay: config.token_delay(),
            stream_timeout: config.stream_timeout(),
        }
    }

    fn params(&self, temperature: Option<f64>, max_len: Option<usize>) -> GenerationParams {
        let mut params = self.engine.params();
        if let Some(t) = temperature {
            params.temperature = t;
        }
        if let Some(m) = max_len {
            params.max_len = m;
        }
        params
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    #[serde(default)]
    pub message: String,
    pub temperature: Option<f64>,
    pub max_len: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub finish_reason: Option<FinishReason>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", get(chat_stream).post(chat_reply))
        .route("/health", get(health))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    let kind = if status.is_client_error() {
        "invalid_request_error"
    } else {
        "server_error"
    };
    (
        status,
        Json(serde_json::json!({
            "error": { "message": message.to_string(), "type": kind }
        })),
    )
        .into_response()
}

/// GET /chat
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChatQuery>,
) -> Response {
    let params = state.params(query.temperature, query.max_len);
    if let Err(e) = validate_temperature(params.temperature) {
        return error_response(StatusCode::BAD_REQUEST, e);
    }

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(64);
    tokio::spawn(stream_reply(state, query.message, params, tx));
    Sse::new(ReceiverStream::new(rx)).into_response()
}

async fn stream_reply(
    state: Arc<AppState>,
    message: String,
    params: GenerationParams,
    tx: mpsc::Sender<Result<Event, Infallible>>,
) {
    let deadline = state.stream_timeout.map(|t| Instant::now() + t);

    match state.engine.respond(&message, params) {
        Ok(Some(generator)) => {
            let mut detok = Detokenizer::new();
            for token in generator {
                let text = detok.push(&token).to_string();
                if tx.send(Ok(Event::default().data(text))).await.is_err() {
                    debug!("client went away, stopping generation");
                    return;
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    debug!("stream timeout reached");
                    break;
                }
                sleep(state.token_delay).await;
            }
        }
        Ok(None) => debug!("nothing to seed a reply from"),
        Err(e) => error!("generation failed: {e}"),
    }

    let _ = tx.send(Ok(Event::default().data(DONE))).await;
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub temperature: Option<f64>,
    pub max_len: Option<usize>,
}

/// POST /chat
///
/// The whole generation runs on the blocking pool so a long `max_len` does
/// not hold up an async worker.
pub async fn chat_reply(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    let params = state.params(req.temperature, req.max_len);
    if let Err(e) = validate_temperature(params.temperature) {
        return error_response(StatusCode::BAD_REQUEST, e);
    }

    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.reply(&req.message, params)).await;
    match result {
        Ok(Ok(reply)) => Json(ChatReply {
            reply: reply.text,
            finish_reason: reply.finish_reason,
        })
        .into_response(),
        Ok(Err(e)) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
        Err(e) => {
            error!("reply task failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "reply task failed")
        }
    }
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let store = state.engine.store();
    Json(serde_json::json!({
        "status": "ok",
        "order": store.order(),
        "contexts": store.context_count(),
    }))
}
