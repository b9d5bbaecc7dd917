//! Chat session state machine shared by every presentation surface.
//!
//! `Idle -> Sending -> (Idle | Error)`. One send may be in flight; further
//! submits are rejected until it resolves. Each accepted submit yields
//! exactly one assistant message, either the reply or a synthetic error.

pub mod controller;
pub mod page;
pub mod widget;

pub use controller::{ChatController, ChatRenderer};
pub use page::{PageRenderer, STARTER_PROMPTS};
pub use widget::WidgetRenderer;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::context::ConversationContext;
use crate::models::{ChatMessage, ChatRequest};
use crate::transport::{BearerToken, ChatTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Sending,
    Error,
}

/// Transient user-facing notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    ToolActionsRan(usize),
    SendFailed,
    Cleared,
}

impl Notice {
    pub fn text(&self) -> String {
        match self {
            Notice::ToolActionsRan(1) => "Ran 1 tool action".to_string(),
            Notice::ToolActionsRan(n) => format!("Ran {} tool actions", n),
            Notice::SendFailed => "Failed to send message".to_string(),
            Notice::Cleared => "Chat cleared".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MessageAppended(ChatMessage),
    StateChanged(ChatState),
    Notice(Notice),
}

/// Receives session events after state has been updated.
pub trait ChatObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Replied(ChatMessage),
    Failed(ChatMessage),
    Rejected(RejectReason),
    /// The conversation was cleared while the turn was in flight; its reply
    /// (or failure) was dropped.
    Discarded,
}

struct Inner {
    transport: Arc<dyn ChatTransport>,
    credentials: Option<BearerToken>,
    context: Mutex<ConversationContext>,
    state: Mutex<ChatState>,
    observers: Mutex<Vec<Arc<dyn ChatObserver>>>,
}

/// Cheaply cloneable handle; clones share one conversation.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ChatSession {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        context: ConversationContext,
        credentials: Option<BearerToken>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                credentials,
                context: Mutex::new(context),
                state: Mutex::new(ChatState::Idle),
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn ChatObserver>) {
        lock(&self.inner.observers).push(observer);
    }

    pub fn state(&self) -> ChatState {
        *lock(&self.inner.state)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.inner.context).messages().to_vec()
    }

    pub fn session_id(&self) -> Option<String> {
        lock(&self.inner.context).session_id().map(str::to_string)
    }

    /// Run one turn for `text`.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SubmitOutcome::Rejected(RejectReason::Empty);
        }

        {
            let mut state = lock(&self.inner.state);
            if *state == ChatState::Sending {
                tracing::debug!("Rejecting submit while a send is in flight");
                return SubmitOutcome::Rejected(RejectReason::Busy);
            }
            *state = ChatState::Sending;
        }
        self.notify(&SessionEvent::StateChanged(ChatState::Sending));

        // The window excludes the message being sent; it travels in `message`.
        let user_message = ChatMessage::user(text);
        let (request, epoch) = {
            let mut context = lock(&self.inner.context);
            let request = ChatRequest {
                message: text.to_string(),
                session_id: context.session_id().map(str::to_string),
                conversation_history: context.window(),
            };
            context.append(user_message.clone());
            (request, context.epoch())
        };
        self.notify(&SessionEvent::MessageAppended(user_message));

        let result = self
            .inner
            .transport
            .send(&request, self.inner.credentials.as_ref())
            .await;

        let mut context = lock(&self.inner.context);
        if context.epoch() != epoch {
            drop(context);
            tracing::info!(
                succeeded = result.is_ok(),
                "Dropping turn result for a cleared conversation"
            );
            self.finish(ChatState::Idle);
            return SubmitOutcome::Discarded;
        }

        match result {
            Ok(reply) => {
                let message = ChatMessage::from_complete(&reply);
                if context.adopt_session(reply.session_id.as_deref()) {
                    tracing::info!(session_id = ?reply.session_id, "Adopted chat session");
                }
                context.append(message.clone());
                drop(context);
                self.finish(ChatState::Idle);
                self.notify(&SessionEvent::MessageAppended(message.clone()));

                let actions = message.action_count();
                if actions > 0 {
                    self.notify(&SessionEvent::Notice(Notice::ToolActionsRan(actions)));
                }
                SubmitOutcome::Replied(message)
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind(), "Chat turn failed");

                let message = ChatMessage::assistant_error(e.user_message());
                context.append(message.clone());
                drop(context);
                self.finish(ChatState::Error);
                self.notify(&SessionEvent::MessageAppended(message.clone()));
                self.notify(&SessionEvent::Notice(Notice::SendFailed));
                SubmitOutcome::Failed(message)
            }
        }
    }

    /// Drop the log and session id. No confirmation step.
    pub fn clear(&self) {
        lock(&self.inner.context).reset();

        let became_idle = {
            let mut state = lock(&self.inner.state);
            let changed = *state == ChatState::Error;
            if changed {
                *state = ChatState::Idle;
            }
            changed
        };
        if became_idle {
            self.notify(&SessionEvent::StateChanged(ChatState::Idle));
        }
        self.notify(&SessionEvent::Notice(Notice::Cleared));
    }

    fn finish(&self, state: ChatState) {
        *lock(&self.inner.state) = state;
        self.notify(&SessionEvent::StateChanged(state));
    }

    fn notify(&self, event: &SessionEvent) {
        let observers = lock(&self.inner.observers).clone();
        for observer in observers {
            observer.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{LocalStore, MemoryStore, MESSAGES_KEY, SESSION_KEY};
    use crate::models::Role;
    use crate::transport::mock::{MockChatTransport, MockTurn};
    use crate::transport::GENERIC_FAILURE_MESSAGE;
    use serde_json::json;

    #[derive(Default)]
    struct Recording(Mutex<Vec<SessionEvent>>);

    impl ChatObserver for Recording {
        fn on_event(&self, event: &SessionEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn session(turns: Vec<MockTurn>) -> (ChatSession, Arc<MockChatTransport>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockChatTransport::new(turns));
        let session = ChatSession::new(
            transport.clone(),
            ConversationContext::load(store.clone()),
            Some(BearerToken::new("token")),
        );
        (session, transport, store)
    }

    fn pitch_reply() -> MockTurn {
        MockTurn::reply(
            Some("s1"),
            json!({
                "message": {"content": "Here is a pitch...", "timestamp": "2024-05-01T10:00:00Z"},
                "actions_executed": [{"tool": "generate_pitch", "args": {}}]
            }),
        )
    }

    #[tokio::test]
    async fn successful_turn_appends_both_messages_and_adopts_session() {
        let (session, transport, store) = session(vec![pitch_reply()]);
        let recording = Arc::new(Recording::default());
        session.subscribe(recording.clone());

        let outcome = session.submit("  Generate a PR pitch for our launch ").await;

        assert!(matches!(outcome, SubmitOutcome::Replied(_)));
        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "Generate a PR pitch for our launch");
        assert_eq!(messages[1].action_count(), 1);
        assert_eq!(session.session_id().as_deref(), Some("s1"));
        assert_eq!(session.state(), ChatState::Idle);

        assert_eq!(store.get(SESSION_KEY).unwrap().as_deref(), Some("s1"));
        let stored: Vec<ChatMessage> =
            serde_json::from_str(&store.get(MESSAGES_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, messages);

        let (request, had_credentials) = &transport.requests()[0];
        assert!(request.session_id.is_none());
        assert!(request.conversation_history.is_empty());
        assert!(had_credentials);

        let events = recording.0.lock().unwrap();
        assert_eq!(events[0], SessionEvent::StateChanged(ChatState::Sending));
        assert!(events.contains(&SessionEvent::Notice(Notice::ToolActionsRan(1))));
    }

    #[tokio::test]
    async fn second_turn_carries_session_and_prior_window() {
        let (session, transport, _) = session(vec![
            pitch_reply(),
            MockTurn::reply(Some("s2"), json!({"message": {"content": "Done"}})),
        ]);

        session.submit("first").await;
        session.submit("second").await;

        let (request, _) = &transport.requests()[1];
        assert_eq!(request.session_id.as_deref(), Some("s1"));
        assert_eq!(request.conversation_history.len(), 2);
        assert_eq!(request.message, "second");
        // First session wins across turns.
        assert_eq!(session.session_id().as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn rejected_turn_appends_one_error_with_detail() {
        let (session, _, store) = session(vec![MockTurn::Reject {
            status: 500,
            body: r#"{"detail":"Upstream exploded"}"#.to_string(),
        }]);

        let outcome = session.submit("hello").await;

        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Upstream exploded");
        assert_eq!(session.session_id(), None);
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);
        assert_eq!(session.state(), ChatState::Error);
    }

    #[tokio::test]
    async fn missing_complete_yields_exactly_one_generic_error() {
        let (session, _, _) = session(vec![MockTurn::Stream(vec![
            b"data: {\"type\":\"session_id\",\"session_id\":\"s1\"}\n\n".to_vec(),
        ])]);

        session.submit("hello").await;

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, GENERIC_FAILURE_MESSAGE);
        assert_eq!(session.session_id(), None);
    }

    #[tokio::test]
    async fn reply_with_unexpected_extras_still_reaches_the_log() {
        let (session, _, _) = session(vec![MockTurn::reply(
            Some("s1"),
            json!({
                "message": {"content": "Here is a pitch..."},
                "tips": [{"text": "Lead with data"}],
                "actions_executed": [{"name": "generate_pitch"}],
                "suggestions": [{"title": "Refine", "action": "Refine it", "priority": 1}],
                "performance_info": {"credits_used": "2"}
            }),
        )]);

        let outcome = session.submit("Generate a PR pitch for our launch").await;

        assert!(matches!(outcome, SubmitOutcome::Replied(_)));
        let messages = session.messages();
        assert_eq!(messages[1].content, "Here is a pitch...");
        assert_eq!(messages[1].action_count(), 0);
        assert_eq!(session.session_id().as_deref(), Some("s1"));
        assert_eq!(session.state(), ChatState::Idle);
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_side_effects() {
        let (session, transport, _) = session(vec![]);

        let outcome = session.submit("   \n").await;

        assert_eq!(outcome, SubmitOutcome::Rejected(RejectReason::Empty));
        assert!(session.messages().is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn overlapping_send_is_rejected() {
        let (session, _, _) = session(vec![]);
        *lock(&session.inner.state) = ChatState::Sending;

        let outcome = session.submit("hello").await;
        assert_eq!(outcome, SubmitOutcome::Rejected(RejectReason::Busy));
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn clear_drops_log_and_session() {
        let (session, _, store) = session(vec![pitch_reply()]);
        session.submit("hello").await;

        session.clear();

        assert!(session.messages().is_empty());
        assert_eq!(session.session_id(), None);
        assert_eq!(store.get(MESSAGES_KEY).unwrap(), None);
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);
    }

    /// Holds every turn until `release` is notified.
    struct GatedTransport {
        inner: MockChatTransport,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    impl GatedTransport {
        fn new(turns: Vec<MockTurn>) -> Self {
            Self {
                inner: MockChatTransport::new(turns),
                entered: tokio::sync::Notify::new(),
                release: tokio::sync::Notify::new(),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatTransport for GatedTransport {
        async fn send(
            &self,
            request: &ChatRequest,
            credentials: Option<&BearerToken>,
        ) -> Result<crate::models::CompleteEvent, crate::transport::ChatError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.send(request, credentials).await
        }
    }

    async fn clear_during_turn(
        turn: MockTurn,
    ) -> (ChatSession, Arc<GatedTransport>, Arc<MemoryStore>, SubmitOutcome) {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(GatedTransport::new(vec![turn]));
        let session = ChatSession::new(
            transport.clone(),
            ConversationContext::load(store.clone()),
            None,
        );

        let (outcome, ()) = tokio::join!(session.submit("hello"), async {
            transport.entered.notified().await;
            assert_eq!(session.state(), ChatState::Sending);
            session.clear();
            transport.release.notify_one();
        });

        (session, transport, store, outcome)
    }

    #[tokio::test]
    async fn reply_arriving_after_clear_is_dropped() {
        let (session, transport, store, outcome) = clear_during_turn(MockTurn::reply(
            Some("old"),
            json!({"message": {"content": "late"}}),
        ))
        .await;

        assert_eq!(outcome, SubmitOutcome::Discarded);
        assert!(session.messages().is_empty());
        assert_eq!(session.session_id(), None);
        assert_eq!(session.state(), ChatState::Idle);
        assert_eq!(store.get(MESSAGES_KEY).unwrap(), None);
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);

        // The next turn starts a fresh conversation.
        transport.inner.push(MockTurn::reply(
            Some("new"),
            json!({"message": {"content": "fresh"}}),
        ));
        transport.release.notify_one();
        session.submit("again").await;

        let (request, _) = &transport.inner.requests()[1];
        assert!(request.session_id.is_none());
        assert!(request.conversation_history.is_empty());
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[0].content, "again");
        assert_eq!(session.session_id().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn failure_arriving_after_clear_adds_no_error_message() {
        let (session, _, _, outcome) =
            clear_during_turn(MockTurn::Fail("connection reset".to_string())).await;

        assert_eq!(outcome, SubmitOutcome::Discarded);
        assert!(session.messages().is_empty());
        assert_eq!(session.state(), ChatState::Idle);
    }

    #[tokio::test]
    async fn clones_share_one_conversation() {
        let (session, _, _) = session(vec![pitch_reply()]);
        let other = session.clone();

        session.submit("hello").await;

        assert_eq!(other.messages().len(), 2);
        assert_eq!(other.session_id().as_deref(), Some("s1"));
    }
}
