use crate::config::UpstreamSettings;
use crate::error::RelayError;
use axum::body::Bytes;
use axum::http::{header, HeaderValue, Method};
use reqwest::Client;
use service_core::observability::TracedClientExt;

/// An inbound request reduced to what the relay forwards.
#[derive(Debug)]
pub struct ForwardRequest<'a> {
    pub method: Method,
    /// Proxied path without the relay prefix, e.g. `api/v1/pitches`.
    pub path: &'a str,
    /// Raw query string, re-appended unmodified.
    pub query: Option<&'a str>,
    pub authorization: Option<&'a HeaderValue>,
    pub body: Bytes,
}

pub struct UpstreamClient {
    client: Client,
    settings: UpstreamSettings,
}

impl UpstreamClient {
    pub fn new(settings: UpstreamSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    /// Absolute upstream URL for a proxied path and query.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> String {
        let base = self.settings.base_url.trim_end_matches('/');
        let joined = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");

        let mut url = format!("{}/{}", base, joined);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Whether the path alone forces streaming pass-through.
    pub fn is_stream_path(&self, path: &str) -> bool {
        let marker = &self.settings.stream_path_marker;
        !marker.is_empty() && path.contains(marker.as_str())
    }

    /// Send the request upstream with trace context propagation.
    ///
    /// Only `Authorization` is carried over from the inbound request. GET and
    /// DELETE never carry a body; an empty body is treated as absent.
    pub async fn forward(&self, request: ForwardRequest<'_>) -> Result<reqwest::Response, RelayError> {
        let url = self.target_url(request.path, request.query);

        let mut outbound = self
            .client
            .traced_request(request.method.clone(), &url)
            .header(header::CONTENT_TYPE.as_str(), "application/json");

        if let Some(authorization) = request.authorization {
            outbound = outbound.header_value(header::AUTHORIZATION, authorization.clone());
        }

        let carries_body = request.method != Method::GET && request.method != Method::DELETE;
        if carries_body && !request.body.is_empty() {
            outbound = outbound.body(request.body);
        }

        tracing::debug!(method = %request.method, url = %url, "Forwarding request upstream");

        outbound.send().await.map_err(|e| {
            tracing::error!("Failed to forward {} request to {}: {}", request.method, url, e);
            RelayError::from_send(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> UpstreamClient {
        UpstreamClient::new(UpstreamSettings {
            base_url: base_url.to_string(),
            stream_path_marker: "chatbot/message".to_string(),
        })
    }

    #[test]
    fn target_url_rejoins_segments_and_keeps_query() {
        let upstream = client("https://backend.example/ecom/");
        assert_eq!(
            upstream.target_url("foo/bar", Some("x=1&y=%20z")),
            "https://backend.example/ecom/foo/bar?x=1&y=%20z"
        );
    }

    #[test]
    fn target_url_without_trailing_slash_or_query() {
        let upstream = client("http://127.0.0.1:9000");
        assert_eq!(upstream.target_url("/foo//bar", None), "http://127.0.0.1:9000/foo/bar");
        assert_eq!(upstream.target_url("foo", Some("")), "http://127.0.0.1:9000/foo");
    }

    #[test]
    fn stream_path_detection_uses_marker() {
        let upstream = client("http://127.0.0.1:9000");
        assert!(upstream.is_stream_path("api/v1/chatbot/message"));
        assert!(!upstream.is_stream_path("api/v1/chatbot/sessions"));

        let disabled = UpstreamClient::new(UpstreamSettings {
            base_url: "http://127.0.0.1:9000".into(),
            stream_path_marker: String::new(),
        });
        assert!(!disabled.is_stream_path("api/v1/chatbot/message"));
    }
}
