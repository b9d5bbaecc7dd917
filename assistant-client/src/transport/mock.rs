//! Scripted transport for tests and offline use.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{assemble_reply, BearerToken, ChatError, ChatTransport};
use crate::models::{ChatRequest, CompleteEvent};

/// Canned outcome for one turn.
pub enum MockTurn {
    /// Raw stream body, delivered in the given chunks.
    Stream(Vec<Vec<u8>>),
    /// Non-2xx status with a body, before any streaming.
    Reject { status: u16, body: String },
    /// Connection-level failure.
    Fail(String),
}

impl MockTurn {
    /// A well-formed stream: an optional session event, then a complete event.
    pub fn reply(session_id: Option<&str>, complete: serde_json::Value) -> Self {
        let mut body = String::new();
        if let Some(id) = session_id {
            body.push_str(&format!(
                "data: {}\n\n",
                serde_json::json!({"type": "session_id", "session_id": id})
            ));
        }
        let mut complete = complete;
        complete["type"] = serde_json::Value::from("complete");
        body.push_str(&format!("data: {}\n\n", complete));

        MockTurn::Stream(vec![body.into_bytes()])
    }
}

/// Mock transport replaying scripted turns in order and recording requests.
#[derive(Default)]
pub struct MockChatTransport {
    turns: Mutex<VecDeque<MockTurn>>,
    requests: Mutex<Vec<(ChatRequest, bool)>>,
}

impl MockChatTransport {
    pub fn new(turns: impl IntoIterator<Item = MockTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, turn: MockTurn) {
        lock(&self.turns).push_back(turn);
    }

    /// Requests seen so far, each with whether credentials were supplied.
    pub fn requests(&self) -> Vec<(ChatRequest, bool)> {
        lock(&self.requests).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ChatTransport for MockChatTransport {
    async fn send(
        &self,
        request: &ChatRequest,
        credentials: Option<&BearerToken>,
    ) -> Result<CompleteEvent, ChatError> {
        lock(&self.requests).push((request.clone(), credentials.is_some()));

        let turn = lock(&self.turns)
            .pop_front()
            .ok_or_else(|| ChatError::Transport("Mock transport has no scripted turn".to_string()))?;

        match turn {
            MockTurn::Stream(chunks) => {
                assemble_reply(futures::stream::iter(chunks.into_iter().map(Ok))).await
            }
            MockTurn::Reject { status, body } => Err(ChatError::rejected(status, &body)),
            MockTurn::Fail(reason) => Err(ChatError::Transport(reason)),
        }
    }
}
