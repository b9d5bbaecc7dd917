//! Floating chat widget: open/minimised state and the unread badge.

use std::sync::Mutex;

use super::{ChatObserver, ChatRenderer, ChatState, Notice, SessionEvent};
use crate::models::Role;

const BADGE_CAP: usize = 99;

#[derive(Debug, Default)]
struct WidgetState {
    open: bool,
    minimized: bool,
    unread: usize,
    thinking: bool,
    contextual_prompts: Vec<String>,
    notices: Vec<Notice>,
}

#[derive(Debug, Default)]
pub struct WidgetRenderer {
    state: Mutex<WidgetState>,
}

impl WidgetRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, WidgetState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn open(&self) {
        let mut state = self.state();
        state.open = true;
        state.minimized = false;
        state.unread = 0;
    }

    pub fn close(&self) {
        self.state().open = false;
    }

    pub fn toggle(&self) {
        if self.is_open() {
            self.close();
        } else {
            self.open();
        }
    }

    pub fn set_minimized(&self, minimized: bool) {
        self.state().minimized = minimized;
    }

    pub fn is_open(&self) -> bool {
        self.state().open
    }

    pub fn is_minimized(&self) -> bool {
        self.state().minimized
    }

    pub fn is_thinking(&self) -> bool {
        self.state().thinking
    }

    pub fn unread_count(&self) -> usize {
        self.state().unread
    }

    /// Badge text for the closed widget, `None` when nothing is unread.
    pub fn badge_label(&self) -> Option<String> {
        match self.unread_count() {
            0 => None,
            n if n > BADGE_CAP => Some(format!("{}+", BADGE_CAP)),
            n => Some(n.to_string()),
        }
    }

    /// Prompts supplied by the hosting page, offered while the log is empty.
    pub fn set_contextual_prompts(&self, prompts: Vec<String>) {
        self.state().contextual_prompts = prompts;
    }

    pub fn contextual_prompts(&self) -> Vec<String> {
        self.state().contextual_prompts.clone()
    }

    /// Notices received since the last call.
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.state().notices)
    }
}

impl ChatObserver for WidgetRenderer {
    fn on_event(&self, event: &SessionEvent) {
        let mut state = self.state();
        match event {
            SessionEvent::StateChanged(chat_state) => {
                state.thinking = *chat_state == ChatState::Sending;
            }
            SessionEvent::MessageAppended(message) => {
                if message.role == Role::Assistant && !state.open {
                    state.unread += 1;
                }
            }
            SessionEvent::Notice(notice) => {
                if *notice == Notice::Cleared {
                    state.unread = 0;
                }
                state.notices.push(notice.clone());
            }
        }
    }
}

impl ChatRenderer for WidgetRenderer {
    /// A host-initiated send opens the widget first.
    fn before_submit(&self) {
        self.open();
    }
}
