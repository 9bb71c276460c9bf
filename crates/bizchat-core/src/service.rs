use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use bizchat_db::{
    BusinessProfile, ConversationFilter, Database, Feedback, MessageRole, StoreError, UsageStats,
};
use bizchat_llm::TextGenerator;
use bizchat_logging::{Logger, TurnEvent};

use crate::error::ChatError;
use crate::locks::SessionLocks;
use crate::responder::{ResponderSettings, ResponseGenerator};
use crate::store::ConversationStore;
use crate::views::{
    ChatReply, ChatbotInfo, ConversationPage, ConversationView, EmbedCode, FeedbackInput,
    IncomingMessage, ListQuery, Pagination, ProfileInput, PublicProfile, SessionView,
};

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub responder: ResponderSettings,
    /// Active conversations idle longer than this become completed
    pub idle_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            responder: ResponderSettings::default(),
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Entry point for every chatbot and conversation operation.
pub struct ChatService {
    db: Arc<Database>,
    store: ConversationStore,
    responder: ResponseGenerator,
    locks: SessionLocks,
    logger: Arc<Logger>,
}

impl ChatService {
    pub fn new(
        db: Arc<Database>,
        generator: Arc<dyn TextGenerator>,
        settings: ServiceSettings,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            store: ConversationStore::new(db.clone(), settings.idle_timeout),
            responder: ResponseGenerator::new(generator, settings.responder),
            locks: SessionLocks::new(),
            db,
            logger,
        }
    }

    pub fn generator_name(&self) -> &str {
        self.responder.generator_name()
    }

    // Profiles

    pub fn create_profile(
        &self,
        owner_id: &str,
        input: ProfileInput,
    ) -> Result<BusinessProfile, ChatError> {
        let profile = input.into_profile(owner_id)?;
        self.db.profiles().insert(&profile)?;

        info!(chatbot_id = %profile.id, owner_id, "Chatbot created");
        self.logger.log(&TurnEvent::ProfileCreated {
            chatbot_id: profile.id.clone(),
            business_name: profile.business_name.clone(),
        });
        Ok(profile)
    }

    pub fn list_profiles(&self, owner_id: &str) -> Result<Vec<BusinessProfile>, ChatError> {
        Ok(self.db.profiles().list_for_owner(owner_id)?)
    }

    /// Owner view of a profile, with usage statistics recomputed first.
    pub fn get_profile(&self, owner_id: &str, id: &str) -> Result<BusinessProfile, ChatError> {
        let mut profile = self.owned_profile(owner_id, id)?;
        if let Some(stats) = self.refresh_stats(id) {
            profile.stats = stats;
        }
        Ok(profile)
    }

    pub fn update_profile(
        &self,
        owner_id: &str,
        id: &str,
        input: ProfileInput,
    ) -> Result<BusinessProfile, ChatError> {
        let mut profile = self.owned_profile(owner_id, id)?;
        input.apply(&mut profile)?;
        if !self.db.profiles().update(&profile)? {
            return Err(ChatError::ChatbotNotFound);
        }
        debug!(chatbot_id = id, "Chatbot updated");
        Ok(profile)
    }

    /// Delete a profile together with all of its conversations.
    pub fn delete_profile(&self, owner_id: &str, id: &str) -> Result<(), ChatError> {
        self.owned_profile(owner_id, id)?;
        if !self.db.profiles().delete(id)? {
            return Err(ChatError::ChatbotNotFound);
        }
        info!(chatbot_id = id, "Chatbot deleted");
        self.logger.log(&TurnEvent::ProfileDeleted {
            chatbot_id: id.to_string(),
        });
        Ok(())
    }

    pub fn public_profile(&self, id: &str) -> Result<PublicProfile, ChatError> {
        let profile = self.find_profile(id)?;
        Ok(PublicProfile::from(&profile))
    }

    pub fn embed_code(&self, id: &str, base_url: &str) -> Result<EmbedCode, ChatError> {
        let profile = self.find_profile(id)?;
        Ok(EmbedCode::new(&profile.id, base_url))
    }

    // Conversations

    /// Handle one visitor message end to end and return the assistant reply.
    ///
    /// The turn runs on its own task so that a dropped HTTP connection does
    /// not abort generation or persistence halfway.
    pub async fn process_message(
        self: &Arc<Self>,
        chatbot_id: &str,
        request: IncomingMessage,
    ) -> Result<ChatReply, ChatError> {
        let message = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ChatError::InvalidInput("Message content is required".to_string()))?
            .to_string();

        let service = Arc::clone(self);
        let chatbot_id = chatbot_id.to_string();
        tokio::spawn(async move { service.run_turn(&chatbot_id, message, request).await })
            .await
            .map_err(|e| ChatError::Task(e.to_string()))?
    }

    async fn run_turn(
        &self,
        chatbot_id: &str,
        message: String,
        request: IncomingMessage,
    ) -> Result<ChatReply, ChatError> {
        let started = Instant::now();
        let profile = self.active_profile(chatbot_id)?;

        let session_id = match request.session_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };

        let guard = self.locks.acquire(chatbot_id, &session_id).await;

        let (mut conversation, is_new) = self.store.find_or_create(&profile, Some(&session_id))?;
        if is_new {
            self.logger.log(&TurnEvent::ConversationStarted {
                chatbot_id: chatbot_id.to_string(),
                session_id: session_id.clone(),
            });

            let mut changed = false;
            if let Some(metadata) = request.metadata.filter(|m| m.is_object()) {
                conversation.metadata = metadata;
                changed = true;
            }
            if let Some(customer_info) = request.customer_info {
                conversation.customer_info = customer_info;
                changed = true;
            }
            if changed {
                self.store.save(&conversation)?;
            }
        }

        let history = conversation.messages.clone();
        self.store.append_message(&mut conversation, MessageRole::User, &message)?;

        let reply = self.responder.generate(&message, &profile, &history).await;
        for (attempt, failure) in reply.failures.iter().enumerate() {
            self.logger.log(&TurnEvent::GenerationFailed {
                chatbot_id: chatbot_id.to_string(),
                session_id: session_id.clone(),
                attempt: attempt as u8 + 1,
                error: failure.clone(),
            });
        }

        if let Err(e) = self
            .store
            .append_message(&mut conversation, MessageRole::Assistant, &reply.text)
        {
            error!(
                chatbot_id,
                session_id = %session_id,
                error = %e,
                "Failed to store assistant reply"
            );
            self.logger.log(&TurnEvent::PersistenceFailed {
                chatbot_id: chatbot_id.to_string(),
                session_id: Some(session_id.clone()),
                error: e.to_string(),
            });
        }

        drop(guard);
        self.refresh_stats(chatbot_id);

        self.logger.log(&TurnEvent::TurnCompleted {
            chatbot_id: chatbot_id.to_string(),
            session_id: session_id.clone(),
            source: reply.source.to_string(),
            reply_chars: reply.text.chars().count(),
            duration_ms: started.elapsed().as_millis() as u64,
        });

        Ok(ChatReply {
            message: reply.text,
            conversation_id: session_id,
            source: reply.source,
        })
    }

    /// Open a widget session, creating it (with a welcome message) if needed.
    pub async fn get_or_create_session(
        &self,
        chatbot_id: &str,
        session_id: Option<&str>,
    ) -> Result<SessionView, ChatError> {
        let profile = self.active_profile(chatbot_id)?;
        let session_id = match session_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };

        let (conversation, is_new) = {
            let _guard = self.locks.acquire(chatbot_id, &session_id).await;
            self.store.find_or_create(&profile, Some(&session_id))?
        };

        if is_new {
            self.logger.log(&TurnEvent::ConversationStarted {
                chatbot_id: chatbot_id.to_string(),
                session_id: session_id.clone(),
            });
            self.refresh_stats(chatbot_id);
        }

        Ok(SessionView {
            session_id: conversation.session_id.clone(),
            is_new,
            messages: conversation
                .visible_messages()
                .into_iter()
                .cloned()
                .collect(),
            chatbot_info: ChatbotInfo {
                name: profile.business_name,
                description: profile.description,
                hours: profile.hours,
                services: profile.services,
            },
        })
    }

    pub fn list_conversations(
        &self,
        owner_id: &str,
        chatbot_id: &str,
        query: &ListQuery,
    ) -> Result<ConversationPage, ChatError> {
        self.owned_profile(owner_id, chatbot_id)?;
        let (page, limit, status) = query.resolve()?;

        let filter = ConversationFilter {
            status,
            limit: Some(limit as usize),
            offset: Some(((page - 1) as usize) * limit as usize),
        };
        let (conversations, total) = self.store.list(chatbot_id, &filter)?;

        Ok(ConversationPage {
            conversations,
            pagination: Pagination::new(total, page, limit),
        })
    }

    pub fn get_conversation(
        &self,
        owner_id: &str,
        chatbot_id: &str,
        session_id: &str,
    ) -> Result<ConversationView, ChatError> {
        self.owned_profile(owner_id, chatbot_id)?;
        let conversation = self
            .store
            .get(chatbot_id, session_id)?
            .ok_or(ChatError::ConversationNotFound)?;
        Ok(ConversationView::from(conversation))
    }

    /// Mark a conversation archived. Archived conversations never change
    /// status again.
    pub async fn archive_conversation(
        &self,
        owner_id: &str,
        chatbot_id: &str,
        session_id: &str,
    ) -> Result<ConversationView, ChatError> {
        self.owned_profile(owner_id, chatbot_id)?;
        let _guard = self.locks.acquire(chatbot_id, session_id).await;
        if !self.store.archive(chatbot_id, session_id)? {
            return Err(ChatError::ConversationNotFound);
        }
        let conversation = self
            .store
            .get(chatbot_id, session_id)?
            .ok_or(ChatError::ConversationNotFound)?;
        Ok(ConversationView::from(conversation))
    }

    pub fn submit_feedback(
        &self,
        chatbot_id: &str,
        session_id: &str,
        input: FeedbackInput,
    ) -> Result<Feedback, ChatError> {
        let rating = input.validated_rating()?;
        let comment = input
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let feedback = self
            .store
            .submit_feedback(chatbot_id, session_id, rating, comment)?
            .ok_or(ChatError::ConversationNotFound)?;

        self.logger.log(&TurnEvent::FeedbackReceived {
            chatbot_id: chatbot_id.to_string(),
            session_id: session_id.to_string(),
            rating,
        });
        Ok(feedback)
    }

    /// Recompute and store usage statistics. Failures are logged and
    /// swallowed.
    pub fn refresh_stats(&self, chatbot_id: &str) -> Option<UsageStats> {
        match self.try_refresh_stats(chatbot_id) {
            Ok(stats) => Some(stats),
            Err(e) => {
                error!(chatbot_id, error = %e, "Failed to refresh usage statistics");
                self.logger.log(&TurnEvent::PersistenceFailed {
                    chatbot_id: chatbot_id.to_string(),
                    session_id: None,
                    error: e.to_string(),
                });
                None
            }
        }
    }

    fn try_refresh_stats(&self, chatbot_id: &str) -> Result<UsageStats, StoreError> {
        // Each call takes the connection lock on its own.
        let stats = self.db.profiles().compute_stats(chatbot_id)?;
        self.db.profiles().update_stats(chatbot_id, &stats)?;
        Ok(stats)
    }

    fn find_profile(&self, id: &str) -> Result<BusinessProfile, ChatError> {
        self.db
            .profiles()
            .get(id)?
            .ok_or(ChatError::ChatbotNotFound)
    }

    fn active_profile(&self, id: &str) -> Result<BusinessProfile, ChatError> {
        let profile = self.find_profile(id)?;
        if !profile.active {
            return Err(ChatError::Inactive);
        }
        Ok(profile)
    }

    fn owned_profile(&self, owner_id: &str, id: &str) -> Result<BusinessProfile, ChatError> {
        let profile = self.find_profile(id)?;
        if !profile.is_owned_by(owner_id) {
            return Err(ChatError::Forbidden);
        }
        Ok(profile)
    }
}
