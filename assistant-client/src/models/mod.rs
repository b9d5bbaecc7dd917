pub mod message;
pub mod wire;

pub use message::{
    Affordance, ChatMessage, HistoryEntry, Priority, Role, Suggestion, SuggestionBundle,
    ToolInvocation,
};
pub use wire::{ChatRequest, CompleteEvent, NextStep, ReplyMessage, ToolCall};
