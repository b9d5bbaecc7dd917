use std::sync::Arc;

use super::{ChatObserver, ChatSession, SubmitOutcome};
use crate::models::Affordance;

/// A presentation surface for a [`ChatSession`].
pub trait ChatRenderer: ChatObserver {
    /// Called before every submit from this surface.
    fn before_submit(&self) {}
}

/// Binds one renderer to a shared session. Widget and page controllers over
/// the same session see the same log and session id.
pub struct ChatController<R: ChatRenderer + 'static> {
    session: ChatSession,
    renderer: Arc<R>,
}

impl<R: ChatRenderer + 'static> ChatController<R> {
    pub fn new(session: ChatSession, renderer: R) -> Self {
        let renderer = Arc::new(renderer);
        session.subscribe(renderer.clone());
        Self { session, renderer }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub async fn send(&self, text: &str) -> SubmitOutcome {
        self.renderer.before_submit();
        self.session.submit(text).await
    }

    /// Submit the affordance's prompt as a new user message.
    pub async fn activate(&self, affordance: &Affordance) -> SubmitOutcome {
        self.send(affordance.prompt()).await
    }

    pub fn clear(&self) {
        self.session.clear();
    }
}
