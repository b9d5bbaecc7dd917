//! Request and stream payloads exchanged with the chatbot endpoint.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::message::HistoryEntry;

/// Body of `POST /api/v1/chatbot/message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Serialised as `null` until the backend has issued a session.
    pub session_id: Option<String>,
    pub conversation_history: Vec<HistoryEntry>,
}

/// The terminal record of a turn, carrying the full assistant reply.
///
/// Only `message.content` is decoded strictly. Auxiliary fields of an
/// unexpected shape decode as absent, and list items that don't fit are
/// skipped, so a reply is never lost to a malformed suggestion or tip.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompleteEvent {
    #[serde(default, deserialize_with = "lenient")]
    pub session_id: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub message: ReplyMessage,

    #[serde(default, deserialize_with = "lenient_list")]
    pub actions_executed: Vec<ToolCall>,

    #[serde(default, deserialize_with = "lenient_list")]
    pub suggestions: Vec<WireSuggestion>,

    #[serde(default, deserialize_with = "lenient_list")]
    pub next_steps: Vec<NextStep>,

    #[serde(default, deserialize_with = "lenient_optional_list")]
    pub tips: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient")]
    pub performance_info: Option<PerformanceInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReplyMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireSuggestion {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub action: String,
    /// Non-string priorities decode as absent and later normalize to medium.
    #[serde(default, deserialize_with = "lenient")]
    pub priority: Option<String>,
}

/// Next steps arrive either as plain text or as `{title, description, icon}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NextStep {
    Text(String),
    Detailed {
        #[serde(default)]
        title: Option<String>,
    },
    Other(Value),
}

impl NextStep {
    pub fn title(&self) -> Option<&str> {
        match self {
            NextStep::Text(text) => Some(text),
            NextStep::Detailed { title } => title.as_deref(),
            NextStep::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PerformanceInfo {
    #[serde(default, deserialize_with = "lenient_number")]
    pub credits_used: Option<f64>,
    #[serde(default, deserialize_with = "lenient_optional_list")]
    pub quality_scores: Option<Vec<f64>>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub response_time: Option<f64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn decode_or_skip<T: DeserializeOwned>(value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unexpected field shape in complete event");
            None
        }
    }
}

/// Any value that doesn't fit `T` decodes as `None`.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        value => decode_or_skip(value),
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient::<D, String>(deserializer)?.unwrap_or_default())
}

/// Numbers, or strings holding a number.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_optional_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(items.into_iter().filter_map(decode_or_skip).collect()),
        Value::Null => None,
        other => {
            tracing::debug!(value = %other, "Ignoring non-list field in complete event");
            None
        }
    })
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(lenient_optional_list(deserializer)?.unwrap_or_default())
}
