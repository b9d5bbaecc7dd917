//! Authoritative conversation log, session id and the context window.

pub mod storage;

pub use storage::{FileStore, LocalStore, MemoryStore, StorageError, StoreOp};

use std::sync::Arc;

use crate::models::{ChatMessage, HistoryEntry};

pub const SESSION_KEY: &str = "ai_chat_session_id";
pub const MESSAGES_KEY: &str = "ai_chat_messages";

/// Number of most recent messages sent upstream as context.
pub const WINDOW_SIZE: usize = 10;

pub struct ConversationContext {
    store: Arc<dyn LocalStore>,
    messages: Vec<ChatMessage>,
    session_id: Option<String>,
    /// Bumped by every reset; a turn started under an older epoch is stale.
    epoch: u64,
}

impl ConversationContext {
    /// Restore the log and session id; anything missing or corrupt is absent.
    pub fn load(store: Arc<dyn LocalStore>) -> Self {
        let session_id = read_key(store.as_ref(), SESSION_KEY).filter(|id| !id.is_empty());

        let messages = read_key(store.as_ref(), MESSAGES_KEY)
            .and_then(|raw| match serde_json::from_str::<Vec<ChatMessage>>(&raw) {
                Ok(messages) => Some(messages),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unparsable stored conversation");
                    None
                }
            })
            .unwrap_or_default();

        tracing::debug!(
            messages = messages.len(),
            has_session = session_id.is_some(),
            "Loaded conversation"
        );

        Self {
            store,
            messages,
            session_id,
            epoch: 0,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Identifies the conversation since the last reset.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Append to the log, then persist the log and session id together.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.persist();
    }

    /// Take `session_id` only when none is held. Returns whether it was
    /// adopted. Persisted with the next append.
    pub fn adopt_session(&mut self, session_id: Option<&str>) -> bool {
        match session_id {
            Some(id) if !id.is_empty() && self.session_id.is_none() => {
                self.session_id = Some(id.to_string());
                true
            }
            _ => false,
        }
    }

    /// The last [`WINDOW_SIZE`] messages projected to role/content/timestamp.
    pub fn window(&self) -> Vec<HistoryEntry> {
        let start = self.messages.len().saturating_sub(WINDOW_SIZE);
        self.messages[start..].iter().map(HistoryEntry::from).collect()
    }

    /// Empty the log and forget the session id, in memory and in storage.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.session_id = None;
        self.epoch = self.epoch.wrapping_add(1);

        if let Err(e) = self.store.apply(vec![
            StoreOp::remove(SESSION_KEY),
            StoreOp::remove(MESSAGES_KEY),
        ]) {
            tracing::warn!(error = %e, "Failed to clear stored conversation");
        }
    }

    fn persist(&self) {
        let messages = match serde_json::to_string(&self.messages) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize conversation");
                return;
            }
        };

        let session = match &self.session_id {
            Some(id) => StoreOp::put(SESSION_KEY, id.clone()),
            None => StoreOp::remove(SESSION_KEY),
        };

        if let Err(e) = self
            .store
            .apply(vec![session, StoreOp::put(MESSAGES_KEY, messages)])
        {
            tracing::warn!(error = %e, "Failed to persist conversation");
        }
    }
}

fn read_key(store: &dyn LocalStore, key: &str) -> Option<String> {
    store.get(key).unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "Failed to read stored value");
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn context() -> (Arc<MemoryStore>, ConversationContext) {
        let store = Arc::new(MemoryStore::new());
        let context = ConversationContext::load(store.clone());
        (store, context)
    }

    #[test]
    fn window_keeps_last_ten_in_order() {
        let (_, mut context) = context();
        for i in 0..15 {
            context.append(ChatMessage::user(format!("m{}", i)));
        }

        let window = context.window();
        assert_eq!(window.len(), WINDOW_SIZE);
        assert_eq!(window[0].content, "m5");
        assert_eq!(window[9].content, "m14");
        assert!(window.iter().all(|entry| entry.role == Role::User));
    }

    #[test]
    fn short_log_window_is_whole_log() {
        let (_, mut context) = context();
        context.append(ChatMessage::user("only"));
        assert_eq!(context.window().len(), 1);
    }

    #[test]
    fn reset_then_append_leaves_single_message_and_no_session() {
        let (store, mut context) = context();
        context.adopt_session(Some("s1"));
        context.append(ChatMessage::user("old"));

        context.reset();
        let message = ChatMessage::user("fresh");
        context.append(message.clone());

        assert_eq!(context.messages(), &[message]);
        assert_eq!(context.session_id(), None);
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);
    }

    #[test]
    fn reset_starts_a_new_epoch() {
        let (_, mut context) = context();
        let before = context.epoch();

        context.append(ChatMessage::user("hello"));
        assert_eq!(context.epoch(), before);

        context.reset();
        assert_ne!(context.epoch(), before);
    }

    #[test]
    fn first_session_wins() {
        let (_, mut context) = context();
        assert!(context.adopt_session(Some("s1")));
        assert!(!context.adopt_session(Some("s2")));
        assert!(!context.adopt_session(None));
        assert_eq!(context.session_id(), Some("s1"));
    }

    #[test]
    fn log_and_session_round_trip_through_store() {
        let (store, mut context) = context();
        context.adopt_session(Some("s1"));
        context.append(ChatMessage::user("hello"));

        let restored = ConversationContext::load(store);
        assert_eq!(restored.session_id(), Some("s1"));
        assert_eq!(restored.messages(), context.messages());
    }

    #[test]
    fn corrupt_stored_log_is_absent() {
        let store = Arc::new(MemoryStore::new());
        store
            .apply(vec![
                StoreOp::put(MESSAGES_KEY, "[{\"broken\""),
                StoreOp::put(SESSION_KEY, "s7"),
            ])
            .unwrap();

        let context = ConversationContext::load(store);
        assert!(context.messages().is_empty());
        assert_eq!(context.session_id(), Some("s7"));
    }
}
