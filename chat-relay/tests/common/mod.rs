//! Test helpers: a recording mock upstream and a relay pointed at it.

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use chat_relay::config::{ServerSettings, Settings, UpstreamSettings};
use chat_relay::startup::Application;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const CHAT_STREAM_BODY: &str = "data: {\"type\":\"session_id\",\"session_id\":\"s1\"}\n\n\
data: {\"type\":\"complete\",\"message\":{\"content\":\"hi\"}}\n\n";

/// One request as the upstream saw it.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone, Default)]
pub struct Recorder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl Recorder {
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> CapturedRequest {
        self.requests().last().cloned().expect("upstream saw no request")
    }
}

async fn upstream_handler(
    State(recorder): State<Recorder>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();

    recorder.requests.lock().unwrap().push(CapturedRequest {
        method,
        path_and_query,
        headers,
        body,
    });

    match uri.path() {
        // Chat endpoint that forgets the event-stream content type.
        "/api/v1/chatbot/message" => {
            let chunks = CHAT_STREAM_BODY
                .as_bytes()
                .chunks(7)
                .map(|c| Ok::<_, std::io::Error>(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>();
            (
                [(header::CONTENT_TYPE, "text/plain")],
                Body::from_stream(futures::stream::iter(chunks)),
            )
                .into_response()
        }
        "/events" => (
            [(header::CONTENT_TYPE, "text/event-stream")],
            "data: {\"n\":1}\n\n",
        )
            .into_response(),
        "/plain" => ([(header::CONTENT_TYPE, "text/plain")], "not json").into_response(),
        "/missing" => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "application/json")],
            "{\"detail\":\"Pitch not found\"}",
        )
            .into_response(),
        _ => (
            [(header::CONTENT_TYPE, "application/json")],
            "{\"ok\":true}",
        )
            .into_response(),
    }
}

/// Spawn the mock upstream and return its base URL plus the request recorder.
pub async fn spawn_upstream() -> (String, Recorder) {
    let recorder = Recorder::default();
    let app = Router::new()
        .fallback(upstream_handler)
        .with_state(recorder.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://127.0.0.1:{}/", port), recorder)
}

/// Spawn a relay forwarding to `upstream_base_url`; returns the relay origin.
pub async fn spawn_relay(upstream_base_url: &str) -> String {
    let settings = Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        upstream: UpstreamSettings {
            base_url: upstream_base_url.to_string(),
            stream_path_marker: "chatbot/message".to_string(),
        },
        observability: Default::default(),
    };

    let app = Application::build(settings)
        .await
        .expect("Failed to build relay");
    let port = app.port();

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    format!("http://127.0.0.1:{}", port)
}
