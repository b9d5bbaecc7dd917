//! Full-page chat surface rendered as plain text.

use std::io::Write;
use std::sync::Mutex;

use super::{ChatObserver, ChatRenderer, ChatState, SessionEvent};
use crate::models::{Affordance, ChatMessage, Role};

pub const STARTER_PROMPTS: [&str; 4] = [
    "Generate a PR pitch for our latest product launch",
    "Analyze the performance of recent email campaigns",
    "Create a journalist outreach strategy for tech media",
    "Draft a press release template for partnerships",
];

pub fn starter_affordances() -> Vec<Affordance> {
    STARTER_PROMPTS
        .iter()
        .map(|prompt| Affordance::Suggestion {
            title: prompt.to_string(),
            action: prompt.to_string(),
        })
        .collect()
}

struct PageState<W> {
    out: W,
    /// Numbered choices currently on screen.
    choices: Vec<Affordance>,
}

pub struct PageRenderer<W: Write + Send> {
    state: Mutex<PageState<W>>,
}

impl<W: Write + Send> PageRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(PageState {
                out,
                choices: Vec::new(),
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PageState<W>> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Replay an existing log, or list the starter prompts when it is empty.
    pub fn render_history(&self, messages: &[ChatMessage]) {
        let mut state = self.state();
        if messages.is_empty() {
            write_starters(&mut state);
            return;
        }
        for message in messages {
            write_message(&mut state, message);
        }
    }

    /// The choice numbered `n` (1-based) on screen.
    pub fn choice(&self, n: usize) -> Option<Affordance> {
        n.checked_sub(1)
            .and_then(|index| self.state().choices.get(index).cloned())
    }

    pub fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(|p| p.into_inner())
            .out
    }
}

fn emit<W: Write>(out: &mut W, line: std::fmt::Arguments<'_>) {
    if let Err(e) = out.write_fmt(line).and_then(|_| out.write_all(b"\n")) {
        tracing::debug!(error = %e, "Failed to write chat output");
    }
}

fn write_starters<W: Write>(state: &mut PageState<W>) {
    emit(&mut state.out, format_args!("How can I help with your PR campaign today?"));
    state.choices = starter_affordances();
    for (i, choice) in state.choices.iter().enumerate() {
        emit(&mut state.out, format_args!("  /{} {}", i + 1, choice.label()));
    }
}

fn write_message<W: Write>(state: &mut PageState<W>, message: &ChatMessage) {
    match message.role {
        Role::User => emit(&mut state.out, format_args!("you> {}", message.content)),
        Role::Assistant => {
            emit(&mut state.out, format_args!("assistant> {}", message.content));

            for action in message.actions.iter().flatten() {
                emit(
                    &mut state.out,
                    format_args!("  [{}] {}", action.status, action.tool),
                );
            }

            state.choices = message.affordances();
            for (i, choice) in state.choices.iter().enumerate() {
                let kind = match choice {
                    Affordance::Suggestion { .. } => "suggestion",
                    Affordance::NextStep(_) => "next step",
                    Affordance::Tip(_) => "tip",
                };
                emit(
                    &mut state.out,
                    format_args!("  /{} {}: {}", i + 1, kind, choice.label()),
                );
            }
        }
    }
}

impl<W: Write + Send> ChatObserver for PageRenderer<W> {
    fn on_event(&self, event: &SessionEvent) {
        let mut state = self.state();
        match event {
            SessionEvent::StateChanged(ChatState::Sending) => {
                emit(&mut state.out, format_args!("thinking…"));
            }
            SessionEvent::StateChanged(_) => {}
            // The user typed their own line; only replies are echoed.
            SessionEvent::MessageAppended(message) if message.role == Role::User => {}
            SessionEvent::MessageAppended(message) => write_message(&mut state, message),
            SessionEvent::Notice(notice) => {
                emit(&mut state.out, format_args!("* {}", notice.text()));
                if *notice == super::Notice::Cleared {
                    write_starters(&mut state);
                }
            }
        }
        if let Err(e) = state.out.flush() {
            tracing::debug!(error = %e, "Failed to flush chat output");
        }
    }
}

impl<W: Write + Send> ChatRenderer for PageRenderer<W> {}
