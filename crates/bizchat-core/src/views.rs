//! Request and response shapes exchanged with the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bizchat_db::{
    BusinessProfile, CommunicationStyle, Conversation, ConversationStatus, ConversationSummary,
    CustomerInfo, Feedback, Industry, KnowledgeFocus, Message, Personality, DEFAULT_HOURS,
};

use crate::error::ChatError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Profile fields supplied by an owner. Every field is optional so the same
/// shape serves creation and partial updates.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    pub industry: Option<Industry>,
    pub business_name: Option<String>,
    #[serde(alias = "businessDescription")]
    pub description: Option<String>,
    #[serde(alias = "businessHours")]
    pub hours: Option<String>,
    #[serde(alias = "businessLocation")]
    pub location: Option<String>,
    #[serde(alias = "businessWebsite")]
    pub website: Option<String>,
    pub services: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
    #[serde(alias = "aiPersonality")]
    pub personality: Option<Personality>,
    pub communication_style: Option<CommunicationStyle>,
    pub knowledge_focus: Option<KnowledgeFocus>,
    pub custom_prompt: Option<String>,
    pub active: Option<bool>,
}

impl ProfileInput {
    /// Build a new profile; business name and industry are required.
    pub fn into_profile(self, owner_id: &str) -> Result<BusinessProfile, ChatError> {
        let name = self
            .business_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let (Some(name), Some(industry)) = (name, self.industry) else {
            return Err(ChatError::InvalidInput(
                "Missing required fields: industry and businessName are required".to_string(),
            ));
        };

        let mut profile = BusinessProfile::new(owner_id, industry, name);
        self.apply(&mut profile)?;
        Ok(profile)
    }

    /// Overwrite the fields that are present.
    pub fn apply(self, profile: &mut BusinessProfile) -> Result<(), ChatError> {
        if let Some(name) = self.business_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ChatError::InvalidInput(
                    "businessName cannot be empty".to_string(),
                ));
            }
            profile.business_name = name.to_string();
        }
        if let Some(industry) = self.industry {
            profile.industry = industry;
        }
        if let Some(description) = self.description {
            profile.description = description.trim().to_string();
        }
        if let Some(hours) = self.hours {
            profile.hours = match hours.trim() {
                "" => DEFAULT_HOURS.to_string(),
                hours => hours.to_string(),
            };
        }
        if let Some(location) = self.location {
            profile.location = non_blank(location);
        }
        if let Some(website) = self.website {
            profile.website = non_blank(website);
        }
        if let Some(services) = self.services {
            profile.services = clean_list(services);
        }
        if let Some(features) = self.features {
            profile.features = clean_list(features);
        }
        if let Some(personality) = self.personality {
            profile.personality = personality;
        }
        if let Some(style) = self.communication_style {
            profile.communication_style = style;
        }
        if let Some(focus) = self.knowledge_focus {
            profile.knowledge_focus = focus;
        }
        if let Some(prompt) = self.custom_prompt {
            profile.custom_prompt = non_blank(prompt);
        }
        if let Some(active) = self.active {
            profile.active = active;
        }
        profile.updated_at = Utc::now();
        Ok(())
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values.into_iter().filter_map(non_blank).collect()
}

/// What the embeddable widget may know about a chatbot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub business_name: String,
    pub description: String,
    pub hours: String,
    pub location: Option<String>,
    pub services: Vec<String>,
    pub features: Vec<String>,
    pub industry: Industry,
}

impl From<&BusinessProfile> for PublicProfile {
    fn from(profile: &BusinessProfile) -> Self {
        Self {
            id: profile.id.clone(),
            business_name: profile.business_name.clone(),
            description: profile.description.clone(),
            hours: profile.hours.clone(),
            location: profile.location.clone(),
            services: profile.services.clone(),
            features: profile.features.clone(),
            industry: profile.industry,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedCode {
    pub embed_code: String,
    pub chatbot_id: String,
    pub widget_url: String,
}

impl EmbedCode {
    pub fn new(chatbot_id: &str, base_url: &str) -> Self {
        let widget_url = format!("{}/widget.js", base_url.trim_end_matches('/'));
        Self {
            embed_code: format!(
                r#"<script src="{}" data-chatbot-id="{}"></script>"#,
                widget_url, chatbot_id
            ),
            chatbot_id: chatbot_id.to_string(),
            widget_url,
        }
    }
}

/// A visitor message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub message: Option<String>,
    pub session_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub customer_info: Option<CustomerInfo>,
}

impl IncomingMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub message: String,
    pub conversation_id: String,
    #[serde(skip)]
    pub source: crate::ReplySource,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotInfo {
    pub name: String,
    pub description: String,
    pub hours: String,
    pub services: Vec<String>,
}

/// Result of opening (or resuming) a widget session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub is_new: bool,
    pub messages: Vec<Message>,
    pub chatbot_info: ChatbotInfo,
}

/// Query string of the conversation listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

impl ListQuery {
    /// Validated `(page, limit, status)`.
    pub fn resolve(&self) -> Result<(u32, u32, Option<ConversationStatus>), ChatError> {
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(ChatError::InvalidInput("page must be at least 1".to_string()));
        }
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ChatError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse().map_err(ChatError::InvalidInput)?),
        };
        Ok((page, limit, status))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

impl Pagination {
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        Self {
            total,
            page,
            limit,
            pages: total.div_ceil(limit as u64),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationPage {
    pub conversations: Vec<ConversationSummary>,
    pub pagination: Pagination,
}

/// A conversation as shown to its owner: system entries removed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub chatbot_id: String,
    pub session_id: String,
    pub status: ConversationStatus,
    pub messages: Vec<Message>,
    pub metadata: serde_json::Value,
    pub customer_info: CustomerInfo,
    pub tags: Vec<String>,
    pub feedback: Option<Feedback>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationView {
    fn from(conversation: Conversation) -> Self {
        let messages = conversation
            .visible_messages()
            .into_iter()
            .cloned()
            .collect();
        Self {
            chatbot_id: conversation.chatbot_id,
            session_id: conversation.session_id,
            status: conversation.status,
            messages,
            metadata: conversation.metadata,
            customer_info: conversation.customer_info,
            tags: conversation.tags,
            feedback: conversation.feedback,
            created_at: conversation.created_at,
            last_activity_at: conversation.last_activity_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackInput {
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

impl FeedbackInput {
    pub fn validated_rating(&self) -> Result<u8, ChatError> {
        match self.rating {
            Some(rating @ 1..=5) => Ok(rating as u8),
            _ => Err(ChatError::InvalidInput(
                "Rating is required and must be between 1 and 5".to_string(),
            )),
        }
    }
}
