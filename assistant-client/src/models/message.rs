//! Conversation log entries and the affordances rendered under them.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::wire::CompleteEvent;

/// Maximum affordances of each kind exposed under one assistant message.
pub const MAX_SUGGESTIONS: usize = 3;
pub const MAX_NEXT_STEPS: usize = 3;
pub const MAX_TIPS: usize = 2;

/// Status recorded on every tool invocation reported by the backend.
const TOOL_STATUS_COMPLETED: &str = "completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation log. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: String,

    /// Side effects the backend performed while producing this reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<ToolInvocation>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SuggestionBundle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
    pub status: String,
}

/// Advisory follow-ups attached to an assistant reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionBundle {
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_used: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_scores: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub description: String,
    pub action: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Map a backend priority label; anything unrecognised is `Medium`.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw {
            Some("high") => Priority::High,
            Some("low") => Priority::Low,
            _ => Priority::Medium,
        }
    }
}

/// A log entry projected to the fields sent upstream as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            timestamp: message.timestamp.clone(),
        }
    }
}

/// Something the user can activate under an assistant message. Activation
/// submits [`Affordance::prompt`] as a new user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Affordance {
    Suggestion { title: String, action: String },
    NextStep(String),
    Tip(String),
}

impl Affordance {
    pub fn label(&self) -> &str {
        match self {
            Affordance::Suggestion { title, .. } => title,
            Affordance::NextStep(text) | Affordance::Tip(text) => text,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            Affordance::Suggestion { action, .. } => action,
            Affordance::NextStep(text) | Affordance::Tip(text) => text,
        }
    }
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            timestamp: now_timestamp(),
            actions: None,
            metadata: None,
        }
    }

    /// A locally synthesised assistant message reporting a failed turn.
    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: now_timestamp(),
            actions: None,
            metadata: None,
        }
    }

    /// Build the assistant entry for a fully decoded complete event.
    pub fn from_complete(event: &CompleteEvent) -> Self {
        let timestamp = event
            .message
            .timestamp
            .clone()
            .filter(|ts| !ts.is_empty());

        let actions = event
            .actions_executed
            .iter()
            .map(|call| ToolInvocation {
                tool: call.tool.clone(),
                arguments: call.args.clone(),
                status: TOOL_STATUS_COMPLETED.to_string(),
            })
            .collect();

        let suggestions = event
            .suggestions
            .iter()
            .map(|s| Suggestion {
                title: s.title.clone(),
                description: s.description.clone(),
                action: s.action.clone(),
                priority: Priority::normalize(s.priority.as_deref()),
            })
            .collect();

        let performance = event.performance_info.as_ref();

        Self {
            id: timestamp
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            role: Role::Assistant,
            content: event.message.content.clone(),
            timestamp: timestamp.unwrap_or_else(now_timestamp),
            actions: Some(actions),
            metadata: Some(SuggestionBundle {
                suggestions,
                next_steps: event
                    .next_steps
                    .iter()
                    .filter_map(|step| step.title())
                    .map(str::to_string)
                    .collect(),
                tips: event.tips.clone().unwrap_or_default(),
                credits_used: performance.and_then(|p| p.credits_used),
                quality_scores: performance.and_then(|p| p.quality_scores.clone()),
            }),
        }
    }

    pub fn action_count(&self) -> usize {
        self.actions.as_ref().map_or(0, Vec::len)
    }

    /// Suggestions, next steps and tips in display order, capped per kind.
    pub fn affordances(&self) -> Vec<Affordance> {
        let Some(bundle) = &self.metadata else {
            return Vec::new();
        };

        let suggestions = bundle
            .suggestions
            .iter()
            .take(MAX_SUGGESTIONS)
            .map(|s| Affordance::Suggestion {
                title: s.title.clone(),
                action: s.action.clone(),
            });
        let next_steps = bundle
            .next_steps
            .iter()
            .take(MAX_NEXT_STEPS)
            .cloned()
            .map(Affordance::NextStep);
        let tips = bundle
            .tips
            .iter()
            .take(MAX_TIPS)
            .cloned()
            .map(Affordance::Tip);

        suggestions.chain(next_steps).chain(tips).collect()
    }
}
