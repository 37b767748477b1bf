//! Shared utilities for integration tests.
//!
//! Provides an in-process relay serving `/BeforeSuiteState` on a random local
//! port, plus a few scripted misbehaviours.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::{Arc, Mutex};

/// Body served before anything has been published
pub const PENDING_BODY: &str = r#"{"Data":null,"State":1}"#;

/// How the relay answers GET requests
#[derive(Debug, Clone)]
pub enum RelayMode {
    /// Serve the last published record
    Normal,
    /// Answer every GET with this status
    Status(StatusCode),
    /// Answer every GET with 200 and this body
    Body(&'static str),
}

#[derive(Debug, Default)]
struct RelayInner {
    record: Option<Vec<u8>>,
    content_types: Vec<String>,
    posts: usize,
    gets: usize,
}

/// Handle to a running relay
#[derive(Clone)]
pub struct Relay {
    pub base_url: String,
    mode: RelayMode,
    inner: Arc<Mutex<RelayInner>>,
}

impl Relay {
    pub fn posts(&self) -> usize {
        self.inner.lock().unwrap().posts
    }

    pub fn gets(&self) -> usize {
        self.inner.lock().unwrap().gets
    }

    pub fn content_types(&self) -> Vec<String> {
        self.inner.lock().unwrap().content_types.clone()
    }

    pub fn record(&self) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().record.clone()
    }
}

/// Start a relay on 127.0.0.1 with an OS-assigned port
pub async fn spawn_relay(mode: RelayMode) -> Relay {
    let relay = Relay {
        base_url: String::new(),
        mode,
        inner: Arc::new(Mutex::new(RelayInner::default())),
    };

    let app = Router::new()
        .route("/BeforeSuiteState", get(read_state).post(write_state))
        .with_state(relay.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind relay");
    let addr = listener.local_addr().expect("Relay has no local address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Relay stopped");
    });

    Relay {
        base_url: format!("http://{}", addr),
        ..relay
    }
}

/// A base URL nothing is listening on
pub async fn unreachable_host() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind unused-port socket");
    let addr = listener.local_addr().expect("Socket has no local address");
    drop(listener);
    format!("http://{}", addr)
}

async fn read_state(State(relay): State<Relay>) -> Response {
    let record = {
        let mut inner = relay.inner.lock().unwrap();
        inner.gets += 1;
        inner.record.clone()
    };

    match relay.mode {
        RelayMode::Status(status) => status.into_response(),
        RelayMode::Body(body) => json_response(body.as_bytes().to_vec()),
        RelayMode::Normal => json_response(record.unwrap_or_else(|| PENDING_BODY.as_bytes().to_vec())),
    }
}

async fn write_state(State(relay): State<Relay>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let mut inner = relay.inner.lock().unwrap();
    inner.posts += 1;
    if let Some(ct) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        inner.content_types.push(ct.to_string());
    }
    inner.record = Some(body.to_vec());
    StatusCode::OK
}

fn json_response(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}
