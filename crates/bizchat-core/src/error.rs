use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Chatbot not found")]
    ChatbotNotFound,

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("This chatbot is currently inactive")]
    Inactive,

    #[error("You are not authorized to access this chatbot")]
    Forbidden,

    #[error("Store error: {0}")]
    Store(#[from] bizchat_db::StoreError),

    #[error("Turn task failed: {0}")]
    Task(String),
}
