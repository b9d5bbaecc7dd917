use axum::{middleware::from_fn, routing::any, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::handlers::{
    app::health_check,
    metrics::metrics,
    proxy::{relay, PROXY_PREFIX},
};
use crate::middleware::cors_headers_middleware;
use crate::services::UpstreamClient;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let proxy = Router::new()
        .route(&format!("{}/*path", PROXY_PREFIX), any(relay))
        .layer(from_fn(cors_headers_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .merge(proxy)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Bind the listener and assemble the router. Port 0 picks a random port.
    pub async fn build(settings: Settings) -> Result<Self, AppError> {
        crate::services::metrics::init_metrics();

        let upstream = Arc::new(UpstreamClient::new(settings.upstream.clone()));
        tracing::info!(upstream = %upstream.base_url(), "Initialized upstream client");

        let address = format!("{}:{}", settings.server.host, settings.server.port);
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router: build_router(AppState::new(upstream)),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!("chat-relay listening on port {}", self.port);
        axum::serve(self.listener, self.router).await
    }
}
