//! Chat transport abstractions and implementations.
//!
//! A transport performs exactly one request/response turn. It never retries
//! and never fabricates chat content on failure.

pub mod error;
pub mod http;
pub mod mock;

pub use error::{ChatError, ErrorKind, GENERIC_FAILURE_MESSAGE};
pub use http::HttpChatTransport;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::fmt;

use crate::models::{ChatRequest, CompleteEvent};
use crate::stream::{EventStreamDecoder, StreamEvent};

/// Bearer credential injected into each request by the caller.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(Secret<String>);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token.into()))
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

/// Trait for one chat turn against the backend.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the turn and resolve to the complete event, with `session_id`
    /// filled from the stream when the complete event omits it.
    async fn send(
        &self,
        request: &ChatRequest,
        credentials: Option<&BearerToken>,
    ) -> Result<CompleteEvent, ChatError>;
}

/// Drive the decoder over a response body and join its events.
///
/// The most recent `session_id` event is tracked; a complete event carrying
/// its own id keeps it.
pub async fn assemble_reply<S, B>(body: S) -> Result<CompleteEvent, ChatError>
where
    S: Stream<Item = Result<B, ChatError>>,
    B: AsRef<[u8]>,
{
    let mut body = std::pin::pin!(body);
    let mut decoder = EventStreamDecoder::new();
    let mut streamed_session: Option<String> = None;
    let mut complete: Option<CompleteEvent> = None;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for event in decoder.push(chunk.as_ref()) {
            match event {
                StreamEvent::SessionId(id) => streamed_session = Some(id),
                StreamEvent::Complete(event) => complete = Some(*event),
            }
        }
    }
    decoder.finish();

    let mut complete = complete.ok_or(ChatError::MissingComplete)?;
    if complete.session_id.as_deref().map_or(true, str::is_empty) {
        complete.session_id = streamed_session;
    }

    Ok(complete)
}
