use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use bizchat_db::{
    BusinessProfile, Conversation, ConversationFilter, ConversationStatus, ConversationSummary,
    Database, Feedback, Message, MessageRole, StoreError,
};

use crate::prompt::{build_system_prompt, build_welcome_message};

/// Conversation lifecycle on top of the database: creation with a system
/// prompt and welcome message, appends, and the inactivity rule.
///
/// Callers serialize writes per session (see `SessionLocks`); the database
/// keeps each individual write atomic.
pub struct ConversationStore {
    db: Arc<Database>,
    idle_timeout: chrono::Duration,
}

impl ConversationStore {
    pub fn new(db: Arc<Database>, idle_timeout: Duration) -> Self {
        let idle_timeout = chrono::Duration::from_std(idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));
        Self { db, idle_timeout }
    }

    /// Load the conversation for `(profile, session_id)` or create it.
    ///
    /// A missing session id gets a fresh UUID. New conversations start with
    /// the system prompt and a welcome message. Returns `true` when created.
    pub fn find_or_create(
        &self,
        profile: &BusinessProfile,
        session_id: Option<&str>,
    ) -> Result<(Conversation, bool), StoreError> {
        let now = Utc::now();
        let session_id = match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };

        if let Some(existing) = self.get_at(&profile.id, &session_id, now)? {
            return Ok((existing, false));
        }

        let mut conversation = Conversation::new(&profile.id, &session_id, now);
        conversation.messages.push(Message::new(
            MessageRole::System,
            build_system_prompt(profile),
            now,
        ));
        conversation.messages.push(Message::new(
            MessageRole::Assistant,
            build_welcome_message(profile),
            now,
        ));

        if self.db.conversations().create(&conversation)? {
            debug!(chatbot_id = %profile.id, session_id = %session_id, "Conversation created");
            return Ok((conversation, true));
        }

        // Lost a creation race; the other writer's row is the conversation.
        match self.get_at(&profile.id, &session_id, now)? {
            Some(existing) => Ok((existing, false)),
            None => Err(StoreError::ConversationNotFound {
                chatbot_id: profile.id.clone(),
                session_id,
            }),
        }
    }

    /// Append a message with a server timestamp and mirror the change on
    /// `conversation`.
    pub fn append_message(
        &self,
        conversation: &mut Conversation,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, StoreError> {
        let outcome = self.db.conversations().append_message(
            &conversation.chatbot_id,
            &conversation.session_id,
            role,
            content,
            Utc::now(),
            self.idle_timeout,
        )?;

        if outcome.previous_status != outcome.status {
            debug!(
                session_id = %conversation.session_id,
                from = %outcome.previous_status,
                to = %outcome.status,
                "Conversation status changed"
            );
        }

        conversation.status = outcome.status;
        conversation.last_activity_at = outcome.message.timestamp;
        conversation.messages.push(outcome.message.clone());
        Ok(outcome.message)
    }

    /// Persist status, metadata, contact info, tags and feedback.
    pub fn save(&self, conversation: &Conversation) -> Result<bool, StoreError> {
        self.db.conversations().save(conversation)
    }

    pub fn get(
        &self,
        chatbot_id: &str,
        session_id: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        self.get_at(chatbot_id, session_id, Utc::now())
    }

    /// Summaries for one chatbot plus the total matching the filter.
    pub fn list(
        &self,
        chatbot_id: &str,
        filter: &ConversationFilter,
    ) -> Result<(Vec<ConversationSummary>, u64), StoreError> {
        self.expire_idle(chatbot_id, Utc::now())?;
        let conversations = self.db.conversations();
        let summaries = conversations.list(chatbot_id, filter)?;
        let total = conversations.count(chatbot_id, filter.status)?;
        Ok((summaries, total))
    }

    pub fn archive(&self, chatbot_id: &str, session_id: &str) -> Result<bool, StoreError> {
        self.db
            .conversations()
            .set_status(chatbot_id, session_id, ConversationStatus::Archived)
    }

    /// Record (or replace) visitor feedback. `None` when the conversation
    /// does not exist.
    pub fn submit_feedback(
        &self,
        chatbot_id: &str,
        session_id: &str,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Option<Feedback>, StoreError> {
        let feedback = Feedback {
            rating,
            comment,
            submitted_at: Utc::now(),
        };
        let found = self
            .db
            .conversations()
            .set_feedback(chatbot_id, session_id, &feedback)?;
        Ok(found.then_some(feedback))
    }

    fn get_at(
        &self,
        chatbot_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Conversation>, StoreError> {
        self.expire_idle(chatbot_id, now)?;
        self.db.conversations().get(chatbot_id, session_id)
    }

    fn expire_idle(&self, chatbot_id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let expired = self
            .db
            .conversations()
            .expire_idle(chatbot_id, now - self.idle_timeout)?;
        if expired > 0 {
            debug!(chatbot_id, expired, "Idle conversations completed");
        }
        Ok(())
    }
}
