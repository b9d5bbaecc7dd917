use serde_json::Value;
use thiserror::Error;

/// Shown when a turn fails without a server-supplied explanation.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Sorry, I encountered an error processing your request. Please try again.";

/// Detail used when a rejected request's body is not JSON.
pub const UNREADABLE_REJECTION_DETAIL: &str = "Chatbot request failed";

/// Error type for a chat turn.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Chatbot request rejected with status {status}")]
    Rejected { status: u16, detail: Option<String> },

    #[error("No complete event received from chatbot stream")]
    MissingComplete,
}

/// Coarse failure classes used for logging and notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    ProtocolViolation,
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::Transport(_) => ErrorKind::Transport,
            ChatError::Rejected { .. } | ChatError::MissingComplete => {
                ErrorKind::ProtocolViolation
            }
        }
    }

    /// Server-supplied explanation, if the backend gave one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ChatError::Rejected { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// The text of the single synthetic assistant message for a failed turn.
    pub fn user_message(&self) -> String {
        self.detail()
            .filter(|detail| !detail.is_empty())
            .unwrap_or(GENERIC_FAILURE_MESSAGE)
            .to_string()
    }

    /// Build a rejection from a non-2xx status and its raw body.
    pub fn rejected(status: u16, body: &str) -> Self {
        let detail = match serde_json::from_str::<Value>(body) {
            Ok(value) => match value.get("detail") {
                Some(Value::String(text)) => Some(text.clone()),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            },
            Err(_) => Some(UNREADABLE_REJECTION_DETAIL.to_string()),
        };

        ChatError::Rejected { status, detail }
    }
}
