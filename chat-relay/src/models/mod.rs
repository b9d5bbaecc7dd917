use serde::Serialize;

/// How a relayed exchange was answered; also the `mode` metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Upstream body piped through unbuffered.
    Streaming,
    /// Upstream body read fully and re-emitted as JSON.
    Buffered,
    /// OPTIONS answered locally.
    Preflight,
    /// The relay could not complete the exchange.
    Failed,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Streaming => "streaming",
            ResponseMode::Buffered => "buffered",
            ResponseMode::Preflight => "preflight",
            ResponseMode::Failed => "failed",
        }
    }

    /// Pick the mode for an upstream reply.
    pub fn classify(stream_path: bool, content_type: Option<&str>) -> Self {
        let event_stream = content_type
            .map(|ct| ct.contains("text/event-stream"))
            .unwrap_or(false);

        if stream_path || event_stream {
            ResponseMode::Streaming
        } else {
            ResponseMode::Buffered
        }
    }
}

/// Fixed body returned when the relay itself fails.
#[derive(Debug, Serialize)]
pub struct RelayErrorBody {
    pub detail: &'static str,
    pub error: &'static str,
}
