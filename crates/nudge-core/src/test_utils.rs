//! Test utilities for nudge-core
//!
//! A mock provider server that emulates the FX quote API, an
//! OpenAI-compatible chat endpoint, the push gateway and the email API on a
//! single local port. Every provider can be switched to a failure status so
//! degraded paths can be exercised end to end.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

#[derive(Default)]
struct MockState {
    fx_bid: String,
    fx_status: Option<u16>,
    chat_reply: String,
    chat_status: Option<u16>,
    rejected_push: HashSet<String>,
    push_requests: Vec<Value>,
    email_status: Option<u16>,
    email_requests: Vec<Value>,
}

type SharedState = Arc<Mutex<MockState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Mock provider server for testing
pub struct MockProviderServer {
    addr: SocketAddr,
    state: SharedState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockProviderServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state: SharedState = Arc::new(Mutex::new(MockState {
            fx_bid: "5.20".to_string(),
            chat_reply: "1. Cut back on delivery apps this month\n2. Move part of your salary to savings on payday".to_string(),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/json/last/:pair", get(handle_fx))
            .route("/v1/chat/completions", post(handle_chat))
            .route("/push", post(handle_push))
            .route("/emails", post(handle_email))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL; also the chat-completions and email API base
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// FX base URL, the pair is appended by the client
    pub fn fx_base_url(&self) -> String {
        format!("{}/json/last", self.url())
    }

    pub fn push_url(&self) -> String {
        format!("{}/push", self.url())
    }

    pub fn set_fx_bid(&self, bid: &str) {
        lock(&self.state).fx_bid = bid.to_string();
    }

    pub fn fail_fx(&self, status: u16) {
        lock(&self.state).fx_status = Some(status);
    }

    pub fn set_chat_reply(&self, reply: &str) {
        lock(&self.state).chat_reply = reply.to_string();
    }

    pub fn fail_chat(&self, status: u16) {
        lock(&self.state).chat_status = Some(status);
    }

    /// Answer 410 Gone for pushes to `endpoint`
    pub fn reject_push_endpoint(&self, endpoint: &str) {
        lock(&self.state).rejected_push.insert(endpoint.to_string());
    }

    pub fn fail_email(&self, status: u16) {
        lock(&self.state).email_status = Some(status);
    }

    /// Push payloads accepted so far
    pub fn push_requests(&self) -> Vec<Value> {
        lock(&self.state).push_requests.clone()
    }

    /// Email payloads accepted so far
    pub fn email_requests(&self) -> Vec<Value> {
        lock(&self.state).email_requests.clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockProviderServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn failure(status: u16) -> Response {
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, Json(json!({"error": "mock failure"}))).into_response()
}

/// FX quote endpoint, keyed by the pair without separators
async fn handle_fx(State(state): State<SharedState>, Path(pair): Path<String>) -> Response {
    let state = lock(&state);
    if let Some(status) = state.fx_status {
        return failure(status);
    }
    let key: String = pair.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    let mut body = serde_json::Map::new();
    body.insert(key, json!({ "code": "USD", "codein": "BRL", "bid": state.fx_bid }));
    Json(Value::Object(body)).into_response()
}

/// OpenAI-compatible chat completions endpoint
async fn handle_chat(State(state): State<SharedState>, Json(_request): Json<Value>) -> Response {
    let state = lock(&state);
    if let Some(status) = state.chat_status {
        return failure(status);
    }
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": state.chat_reply } }]
    }))
    .into_response()
}

/// Push gateway endpoint
async fn handle_push(State(state): State<SharedState>, Json(request): Json<Value>) -> Response {
    let mut state = lock(&state);
    let endpoint = request["endpoint"].as_str().unwrap_or_default();
    if state.rejected_push.contains(endpoint) {
        return failure(410);
    }
    state.push_requests.push(request);
    StatusCode::ACCEPTED.into_response()
}

/// Email API endpoint
async fn handle_email(State(state): State<SharedState>, Json(request): Json<Value>) -> Response {
    let mut state = lock(&state);
    if let Some(status) = state.email_status {
        return failure(status);
    }
    state.email_requests.push(request);
    Json(json!({ "id": format!("mock-{}", state.email_requests.len()) })).into_response()
}
