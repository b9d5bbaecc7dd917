use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::RelayErrorBody;

/// Failures while building, forwarding, or re-emitting a relayed request.
///
/// The rendered response never includes the underlying error text; it is
/// logged here and replaced by a fixed category.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid inbound request: {0}")]
    InvalidRequest(String),

    #[error("Upstream unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("Upstream timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("Failed to read upstream body: {0}")]
    UpstreamBody(#[source] reqwest::Error),

    #[error("Failed to build relay response: {0}")]
    ResponseBuild(#[from] axum::http::Error),
}

impl RelayError {
    /// Classify a reqwest failure raised while sending the upstream request.
    pub fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RelayError::Timeout(err)
        } else if err.is_builder() {
            RelayError::InvalidRequest(err.to_string())
        } else {
            RelayError::Unreachable(err)
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            RelayError::InvalidRequest(_) => "invalid_request",
            RelayError::Unreachable(_) => "upstream_unreachable",
            RelayError::Timeout(_) => "upstream_timeout",
            RelayError::UpstreamBody(_) => "upstream_body",
            RelayError::ResponseBuild(_) => "response_build",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, category = self.category(), "Proxy request failed");

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RelayErrorBody {
                detail: "Proxy request failed",
                error: self.category(),
            }),
        )
            .into_response()
    }
}
