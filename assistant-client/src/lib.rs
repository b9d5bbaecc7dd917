//! Client side of the campaign assistant: stream decoding, the chat
//! transport, the persisted conversation and the session controllers that
//! presentation surfaces drive.

pub mod config;
pub mod context;
pub mod models;
pub mod session;
pub mod stream;
pub mod transport;

pub use context::ConversationContext;
pub use session::{ChatController, ChatSession};
pub use transport::{BearerToken, ChatTransport, HttpChatTransport};
