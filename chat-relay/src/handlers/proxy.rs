//! The wildcard relay: forwards `/api/proxy/<path>` to the upstream origin.
//!
//! Replies are either piped through unbuffered (event streams and the chat
//! endpoint) or read fully and re-emitted as JSON. CORS headers are added by
//! [`crate::middleware::cors_headers_middleware`].

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::time::Instant;

use crate::error::RelayError;
use crate::middleware::preflight;
use crate::models::ResponseMode;
use crate::services::{metrics::record_request, ForwardRequest};
use crate::AppState;

/// Route prefix the relay is mounted under.
pub const PROXY_PREFIX: &str = "/api/proxy";

const DEFAULT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

pub async fn relay(State(state): State<AppState>, request: Request) -> Response {
    let started = Instant::now();

    if request.method() == Method::OPTIONS {
        record_request(ResponseMode::Preflight, started.elapsed());
        return preflight();
    }

    let (mode, response) = match forward(&state, request).await {
        Ok(relayed) => relayed,
        Err(e) => (ResponseMode::Failed, e.into_response()),
    };

    record_request(mode, started.elapsed());
    response
}

async fn forward(state: &AppState, request: Request) -> Result<(ResponseMode, Response), RelayError> {
    let (parts, body) = request.into_parts();

    let path = proxied_path(parts.uri.path());
    let body = to_bytes(body, usize::MAX)
        .await
        .map_err(|e| RelayError::InvalidRequest(format!("request body: {}", e)))?;

    let upstream = state
        .upstream
        .forward(ForwardRequest {
            method: parts.method.clone(),
            path,
            query: parts.uri.query(),
            authorization: parts.headers.get(header::AUTHORIZATION),
            body,
        })
        .await?;

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let mode = ResponseMode::classify(state.upstream.is_stream_path(path), content_type.as_deref());

    tracing::info!(
        method = %parts.method,
        path = %path,
        status = upstream.status().as_u16(),
        mode = mode.as_str(),
        "Relayed request"
    );

    let response = match mode {
        ResponseMode::Streaming => stream_through(upstream, content_type)?,
        _ => buffer_as_json(upstream).await?,
    };

    Ok((mode, response))
}

/// Strip the relay prefix, leaving the upstream-relative path.
fn proxied_path(full_path: &str) -> &str {
    full_path
        .strip_prefix(PROXY_PREFIX)
        .unwrap_or(full_path)
        .trim_start_matches('/')
}

fn stream_through(
    upstream: reqwest::Response,
    content_type: Option<String>,
) -> Result<Response, RelayError> {
    let status = upstream.status();
    let content_type = content_type.unwrap_or_else(|| DEFAULT_STREAM_CONTENT_TYPE.to_string());
    let content_type = HeaderValue::from_str(&content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_STREAM_CONTENT_TYPE));

    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(upstream.bytes_stream()))?;

    Ok(response)
}

async fn buffer_as_json(upstream: reqwest::Response) -> Result<Response, RelayError> {
    let status = upstream.status();
    let text = upstream.text().await.map_err(RelayError::UpstreamBody)?;

    // Non-JSON bodies are re-emitted as a JSON string.
    let payload = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

    Ok((status, Json(payload)).into_response())
}
