//! End-to-end chat workflow test harness.
//!
//! Every test context runs its own scripted upstream and a real relay on
//! random local ports, and drives them with the real assistant client stack
//! backed by a file store in a temporary directory.
//!
//! ## Usage
//!
//! ```bash
//! cargo test -p workflow-tests
//! ```

use anyhow::{anyhow, Result};
use assistant_client::config::ApiSettings;
use assistant_client::context::{ConversationContext, FileStore};
use assistant_client::{BearerToken, ChatSession, HttpChatTransport};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chat_relay::config::{ServerSettings, Settings, UpstreamSettings};
use chat_relay::startup::Application;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,workflow_tests=debug,chat_relay=debug,assistant_client=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Upstream chat endpoint path, as the relay forwards it.
pub const CHAT_PATH: &str = "/api/v1/chatbot/message";

/// One scripted answer of the upstream chat endpoint.
#[derive(Debug, Clone)]
pub enum UpstreamReply {
    /// 200 with an event-stream body, delivered in small chunks.
    Stream(String),
    /// Any status with a JSON body, before any streaming.
    Status { status: u16, body: String },
}

/// Build an event-stream body: an optional session event then a complete event.
pub fn chat_stream(session_id: Option<&str>, complete: Value) -> String {
    let mut body = String::new();
    if let Some(id) = session_id {
        body.push_str(&format!(
            "data: {}\n\n",
            serde_json::json!({"type": "session_id", "session_id": id})
        ));
    }
    let mut complete = complete;
    complete["type"] = Value::from("complete");
    body.push_str(&format!("data: {}\n\n", complete));
    body
}

/// A chat request as the upstream received it.
#[derive(Debug, Clone)]
pub struct ObservedRequest {
    pub body: Value,
    pub authorization: Option<String>,
}

#[derive(Clone, Default)]
struct Script {
    replies: Arc<Mutex<VecDeque<UpstreamReply>>>,
    observed: Arc<Mutex<Vec<ObservedRequest>>>,
}

async fn scripted_chat(State(script): State<Script>, headers: HeaderMap, body: Bytes) -> Response {
    script.observed.lock().unwrap().push(ObservedRequest {
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    let reply = script.replies.lock().unwrap().pop_front();
    match reply {
        Some(UpstreamReply::Stream(body)) => {
            let chunks = body
                .into_bytes()
                .chunks(11)
                .map(|c| Ok::<_, std::io::Error>(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>();
            (
                [(header::CONTENT_TYPE, "text/event-stream")],
                Body::from_stream(futures::stream::iter(chunks)),
            )
                .into_response()
        }
        Some(UpstreamReply::Status { status, body }) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "application/json")],
            "{\"detail\":\"No scripted reply\"}",
        )
            .into_response(),
    }
}

/// A mock of the campaign backend's chat endpoint replaying scripted replies.
pub struct ScriptedUpstream {
    /// Origin the relay should forward to.
    pub base_url: String,
    script: Script,
}

impl ScriptedUpstream {
    pub async fn spawn() -> Result<Self> {
        let script = Script::default();
        let app = Router::new()
            .route(CHAT_PATH, post(scripted_chat))
            .with_state(script.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow!("Failed to bind scripted upstream: {}", e))?;
        let port = listener.local_addr()?.port();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}/", port),
            script,
        })
    }

    pub fn enqueue(&self, reply: UpstreamReply) {
        self.script.replies.lock().unwrap().push_back(reply);
    }

    pub fn observed(&self) -> Vec<ObservedRequest> {
        self.script.observed.lock().unwrap().clone()
    }
}

/// Start a relay forwarding to `upstream_base_url`; returns its origin.
pub async fn spawn_relay(upstream_base_url: &str) -> Result<String> {
    let settings = Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        upstream: UpstreamSettings {
            base_url: upstream_base_url.to_string(),
            ..Default::default()
        },
        observability: Default::default(),
    };

    let app = Application::build(settings)
        .await
        .map_err(|e| anyhow!("Failed to build relay: {}", e))?;
    let port = app.port();

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    Ok(format!("http://127.0.0.1:{}", port))
}

/// Context for workflow tests: scripted upstream, relay, and a client
/// session persisting into its own temporary directory.
pub struct WorkflowTestContext {
    pub upstream: ScriptedUpstream,
    pub relay_url: String,
    pub session: ChatSession,
    store_dir: TempDir,
}

impl WorkflowTestContext {
    pub async fn new() -> Result<Self> {
        Self::with_token(None).await
    }

    /// Like [`WorkflowTestContext::new`] with a bearer token on every turn.
    pub async fn with_token(token: Option<&str>) -> Result<Self> {
        init_tracing();

        let upstream = ScriptedUpstream::spawn().await?;
        let relay_url = spawn_relay(&upstream.base_url).await?;
        wait_for_health(&format!("{}/health", relay_url), Duration::from_secs(5)).await?;

        let store_dir = tempfile::tempdir()?;
        let api = ApiSettings {
            base_url: format!("{}/api/proxy", relay_url),
            ..Default::default()
        };

        let session = ChatSession::new(
            Arc::new(HttpChatTransport::new(&api)),
            ConversationContext::load(Arc::new(FileStore::new(store_dir.path()))),
            token.map(BearerToken::new),
        );

        Ok(Self {
            upstream,
            relay_url,
            session,
            store_dir,
        })
    }

    /// Read the persisted conversation back as a fresh process would.
    pub fn reload_context(&self) -> ConversationContext {
        ConversationContext::load(Arc::new(FileStore::new(self.store_dir.path())))
    }
}

/// Poll `url` until it answers 200 OK.
pub async fn wait_for_health(url: &str, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::new();
    let start = std::time::Instant::now();

    loop {
        match client.get(url).timeout(Duration::from_secs(2)).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => tracing::debug!(status = %resp.status(), "Waiting for {}", url),
            Err(e) => tracing::debug!(error = %e, "Waiting for {}", url),
        }

        if start.elapsed() > timeout {
            return Err(anyhow!("Timeout waiting for {}", url));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
