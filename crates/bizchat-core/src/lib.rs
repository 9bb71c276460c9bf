//! # bizchat-core
//!
//! Conversation orchestration: prompt construction, reply generation with
//! its fallbacks, the conversation lifecycle and per-session serialization.
//!
//! [`ChatService`] is the entry point used by the HTTP layer.

mod error;
mod fallback;
mod locks;
mod prompt;
mod responder;
mod service;
mod store;
mod views;

pub use error::ChatError;
pub use fallback::keyword_fallback;
pub use locks::SessionLocks;
pub use prompt::{build_system_prompt, build_welcome_message};
pub use responder::{
    build_instruction, build_retry_instruction, is_generic_reply, Reply, ReplySource,
    ResponderSettings, ResponseGenerator,
};
pub use service::{ChatService, ServiceSettings};
pub use store::ConversationStore;
pub use views::{
    ChatReply, ChatbotInfo, ConversationPage, ConversationView, EmbedCode, FeedbackInput,
    IncomingMessage, ListQuery, Pagination, ProfileInput, PublicProfile, SessionView,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
