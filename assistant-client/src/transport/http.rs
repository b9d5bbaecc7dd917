//! Chat transport over HTTP, normally pointed at the relay.

use async_trait::async_trait;
use futures::StreamExt;
use service_core::observability::TracedClientExt;

use super::{assemble_reply, BearerToken, ChatError, ChatTransport};
use crate::config::ApiSettings;
use crate::models::{ChatRequest, CompleteEvent};

pub struct HttpChatTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChatTransport {
    pub fn new(settings: &ApiSettings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    pub fn with_client(client: reqwest::Client, settings: &ApiSettings) -> Self {
        Self {
            client,
            endpoint: settings.chat_url(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn send(
        &self,
        request: &ChatRequest,
        credentials: Option<&BearerToken>,
    ) -> Result<CompleteEvent, ChatError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            history_len = request.conversation_history.len(),
            has_session = request.session_id.is_some(),
            "Sending chat turn"
        );

        let mut outbound = self.client.traced_post(&self.endpoint).json(request);
        if let Some(token) = credentials {
            outbound = outbound.bearer_auth(token.expose());
        }

        let response = outbound
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Chat turn rejected before streaming");
            return Err(ChatError::rejected(status.as_u16(), &body));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ChatError::Transport(e.to_string())));

        assemble_reply(body).await
    }
}
