use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::GeneratedText;

/// The canned reply models fall back to when they have nothing specific to
/// say. It is used as a stop sequence and rejected by the reply guard.
pub const GENERIC_REPLY: &str = "Thank you for your message. How else can I assist you today?";

/// Errors that can occur while generating text
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Prompt was blocked: {0}")]
    Blocked(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Generator not configured: {0}")]
    NotConfigured(String),
}

/// Sampling parameters sent with every request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
            stop_sequences: vec![GENERIC_REPLY.to_string()],
        }
    }
}

/// Who authored a prior turn, from the model's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Model => "model",
        }
    }
}

/// One prior exchange sent along as context
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// A single generation request
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// The final user-role content
    pub prompt: String,
    pub system_instruction: Option<String>,
    /// Earlier turns, oldest first
    pub history: Vec<Turn>,
    pub config: GenerationConfig,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }
}

/// Supported generator backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorType {
    Gemini,
    Offline,
}

impl std::fmt::Display for GeneratorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorType::Gemini => write!(f, "gemini"),
            GeneratorType::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for GeneratorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(GeneratorType::Gemini),
            "offline" | "none" => Ok(GeneratorType::Offline),
            _ => Err(format!("Unknown generator type: {}", s)),
        }
    }
}

/// The core abstraction for text generation backends
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable name of the backend
    fn name(&self) -> &str;

    fn generator_type(&self) -> GeneratorType;

    /// Produce one reply for the request
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedText, GenerationError>;

    /// Whether the backend can be called at all
    fn is_configured(&self) -> bool {
        true
    }
}
