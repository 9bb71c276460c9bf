//! Persisted model: business profiles, conversations and their messages.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Hours used when a profile is created without any.
pub const DEFAULT_HOURS: &str = "Monday-Friday: 9:00 AM - 5:00 PM";

/// Business category a chatbot is configured for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Industry {
    Dental,
    RealEstate,
    Restaurant,
    Fitness,
    Salon,
    Law,
    Ecommerce,
    Hotel,
    Healthcare,
    Education,
    #[default]
    #[serde(other)]
    Other,
}

impl Industry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Industry::Dental => "dental",
            Industry::RealEstate => "realEstate",
            Industry::Restaurant => "restaurant",
            Industry::Fitness => "fitness",
            Industry::Salon => "salon",
            Industry::Law => "law",
            Industry::Ecommerce => "ecommerce",
            Industry::Hotel => "hotel",
            Industry::Healthcare => "healthcare",
            Industry::Education => "education",
            Industry::Other => "other",
        }
    }

    /// Human noun phrase used in prompts ("dental practice", "law firm").
    pub fn label(&self) -> &'static str {
        match self {
            Industry::Dental => "dental practice",
            Industry::RealEstate => "real estate agency",
            Industry::Restaurant => "restaurant",
            Industry::Fitness => "fitness studio",
            Industry::Salon => "hair salon",
            Industry::Law => "law firm",
            Industry::Ecommerce => "e-commerce store",
            Industry::Hotel => "hotel",
            Industry::Healthcare => "healthcare provider",
            Industry::Education => "educational institution",
            Industry::Other => "business",
        }
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Industry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dental" => Ok(Industry::Dental),
            "realEstate" | "real_estate" | "real-estate" => Ok(Industry::RealEstate),
            "restaurant" => Ok(Industry::Restaurant),
            "fitness" => Ok(Industry::Fitness),
            "salon" => Ok(Industry::Salon),
            "law" => Ok(Industry::Law),
            "ecommerce" => Ok(Industry::Ecommerce),
            "hotel" => Ok(Industry::Hotel),
            "healthcare" => Ok(Industry::Healthcare),
            "education" => Ok(Industry::Education),
            "other" => Ok(Industry::Other),
            _ => Err(format!("Unknown industry: {}", s)),
        }
    }
}

/// Tone the assistant answers in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Professional,
    Casual,
    Enthusiastic,
    #[default]
    #[serde(other)]
    Friendly,
}

impl Personality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Friendly => "friendly",
            Personality::Professional => "professional",
            Personality::Casual => "casual",
            Personality::Enthusiastic => "enthusiastic",
        }
    }

    pub fn phrase(&self) -> &'static str {
        match self {
            Personality::Friendly => "friendly and helpful manner",
            Personality::Professional => "professional and formal tone",
            Personality::Casual => "casual and conversational style",
            Personality::Enthusiastic => "enthusiastic and energetic voice",
        }
    }
}

impl FromStr for Personality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "friendly" => Ok(Personality::Friendly),
            "professional" => Ok(Personality::Professional),
            "casual" => Ok(Personality::Casual),
            "enthusiastic" => Ok(Personality::Enthusiastic),
            _ => Err(format!("Unknown personality: {}", s)),
        }
    }
}

/// What kind of knowledge the assistant should lean on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeFocus {
    Business,
    Industry,
    Sales,
    #[default]
    #[serde(other)]
    Balanced,
}

impl KnowledgeFocus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeFocus::Balanced => "balanced",
            KnowledgeFocus::Business => "business",
            KnowledgeFocus::Industry => "industry",
            KnowledgeFocus::Sales => "sales",
        }
    }

    /// Extra instruction for the focus; balanced adds nothing.
    pub fn instruction(&self) -> Option<&'static str> {
        match self {
            KnowledgeFocus::Balanced => None,
            KnowledgeFocus::Business => Some(
                "Focus primarily on information about the business, its services, and operations.",
            ),
            KnowledgeFocus::Industry => Some(
                "Share educational information about the industry and best practices when relevant.",
            ),
            KnowledgeFocus::Sales => Some(
                "Emphasize the benefits of services and gently encourage potential customers to make appointments or purchases.",
            ),
        }
    }
}

impl FromStr for KnowledgeFocus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "balanced" => Ok(KnowledgeFocus::Balanced),
            "business" => Ok(KnowledgeFocus::Business),
            "industry" => Ok(KnowledgeFocus::Industry),
            "sales" => Ok(KnowledgeFocus::Sales),
            _ => Err(format!("Unknown knowledge focus: {}", s)),
        }
    }
}

/// Communication-style switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunicationStyle {
    pub concise: bool,
    pub questions: bool,
    pub informative: bool,
    pub empathetic: bool,
}

impl Default for CommunicationStyle {
    fn default() -> Self {
        Self {
            concise: true,
            questions: true,
            informative: false,
            empathetic: true,
        }
    }
}

/// Advisory usage counters, recomputed opportunistically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub total_conversations: u64,
    pub total_messages: u64,
    pub last_active_at: Option<DateTime<Utc>>,
}

/// A business's chatbot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProfile {
    pub id: String,
    pub owner_id: String,
    pub industry: Industry,
    pub business_name: String,
    pub description: String,
    pub hours: String,
    pub location: Option<String>,
    pub website: Option<String>,
    pub services: Vec<String>,
    pub features: Vec<String>,
    pub personality: Personality,
    pub communication_style: CommunicationStyle,
    pub knowledge_focus: KnowledgeFocus,
    pub custom_prompt: Option<String>,
    pub active: bool,
    pub stats: UsageStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BusinessProfile {
    /// New active profile with a fresh id and default settings.
    pub fn new(
        owner_id: impl Into<String>,
        industry: Industry,
        business_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            industry,
            business_name: business_name.into(),
            description: String::new(),
            hours: DEFAULT_HOURS.to_string(),
            location: None,
            website: None,
            services: Vec::new(),
            features: Vec::new(),
            personality: Personality::default(),
            communication_style: CommunicationStyle::default(),
            knowledge_focus: KnowledgeFocus::default(),
            custom_prompt: None,
            active: true,
            stats: UsageStats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The custom prompt, when it holds anything besides whitespace.
    pub fn custom_prompt_override(&self) -> Option<&str> {
        self.custom_prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            _ => Err(format!("Unknown message role: {}", s)),
        }
    }
}

/// A single entry in a conversation's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }
}

/// Lifecycle state of a conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Archived => "archived",
        }
    }

    /// Apply the inactivity rule: an active conversation idle for longer than
    /// `idle_timeout` becomes completed. Other states are left alone.
    pub fn expire_if_idle(
        self,
        last_activity_at: DateTime<Utc>,
        now: DateTime<Utc>,
        idle_timeout: Duration,
    ) -> Self {
        match self {
            ConversationStatus::Active if now - last_activity_at > idle_timeout => {
                ConversationStatus::Completed
            }
            other => other,
        }
    }

    /// Status after a new message lands. Archived is terminal.
    pub fn on_new_message(self) -> Self {
        match self {
            ConversationStatus::Archived => ConversationStatus::Archived,
            _ => ConversationStatus::Active,
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ConversationStatus::Active),
            "completed" => Ok(ConversationStatus::Completed),
            "archived" => Ok(ConversationStatus::Archived),
            _ => Err(format!("Unknown conversation status: {}", s)),
        }
    }
}

/// Optional visitor contact details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Visitor rating of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub rating: u8,
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// A visitor session with one chatbot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
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

impl Conversation {
    pub fn new(
        chatbot_id: impl Into<String>,
        session_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            chatbot_id: chatbot_id.into(),
            session_id: session_id.into(),
            status: ConversationStatus::Active,
            messages: Vec::new(),
            metadata: serde_json::Value::Object(Default::default()),
            customer_info: CustomerInfo::default(),
            tags: Vec::new(),
            feedback: None,
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Messages a visitor may see (everything but system entries).
    pub fn visible_messages(&self) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .collect()
    }

    /// The stored system prompt, if the log starts with one.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
    }
}

/// List view of a conversation, without message bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub chatbot_id: String,
    pub session_id: String,
    pub status: ConversationStatus,
    pub message_count: u64,
    pub customer_info: CustomerInfo,
    pub tags: Vec<String>,
    pub feedback: Option<Feedback>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// Filter options for listing conversations of one chatbot.
#[derive(Debug, Default, Clone)]
pub struct ConversationFilter {
    pub status: Option<ConversationStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}
