use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use bizchat_db::{BusinessProfile, Message, MessageRole};
use bizchat_llm::{
    GenerationConfig, GenerationError, GenerationRequest, TextGenerator, Turn, TurnRole,
    GENERIC_REPLY,
};

use crate::fallback::keyword_fallback;

/// Where a reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    /// First model answer passed the guard
    Model,
    /// The directive retry passed the guard
    Retry,
    /// Keyword fallback
    Fallback,
}

impl ReplySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplySource::Model => "model",
            ReplySource::Retry => "retry",
            ReplySource::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ReplySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reply that is always safe to show a visitor
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
    /// One entry per failed or rejected attempt, in order
    pub failures: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResponderSettings {
    pub generation: GenerationConfig,
    /// Upper bound for a single generation call
    pub timeout: Duration,
    /// Prior turns sent along with the request
    pub history_window: usize,
    /// Trimmed replies shorter than this are rejected
    pub min_reply_chars: usize,
}

impl Default for ResponderSettings {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            timeout: Duration::from_secs(20),
            history_window: 10,
            min_reply_chars: 2,
        }
    }
}

/// Whether a model reply is too empty or canned to show.
pub fn is_generic_reply(text: &str, min_chars: usize) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case(GENERIC_REPLY)
        || trimmed.chars().count() < min_chars
}

enum Attempt {
    Accepted(String),
    Rejected(String),
    Failed(GenerationError),
}

/// Produces replies: model call, guard, one directive retry, keyword fallback.
pub struct ResponseGenerator {
    generator: Arc<dyn TextGenerator>,
    settings: ResponderSettings,
}

impl ResponseGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: ResponderSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Answer `user_message` for `profile`. `history` holds the conversation
    /// as it was before this message; it may be empty.
    pub async fn generate(
        &self,
        user_message: &str,
        profile: &BusinessProfile,
        history: &[Message],
    ) -> Reply {
        let mut failures = Vec::new();

        let first = self.build_request(build_instruction(user_message, profile), history);
        match self.attempt(&first).await {
            Attempt::Accepted(text) => {
                return Reply {
                    text,
                    source: ReplySource::Model,
                    failures,
                }
            }
            Attempt::Failed(err) => {
                warn!(
                    error = %err,
                    generator = self.generator.name(),
                    "Generation failed, using fallback"
                );
                failures.push(err.to_string());
                return self.fallback(user_message, profile, failures);
            }
            Attempt::Rejected(text) => {
                debug!(reply = %text, "Generic reply rejected, retrying");
                failures.push(format!("generic reply rejected: {:?}", text));
            }
        }

        let retry = self.build_request(build_retry_instruction(user_message, profile), history);
        match self.attempt(&retry).await {
            Attempt::Accepted(text) => Reply {
                text,
                source: ReplySource::Retry,
                failures,
            },
            Attempt::Failed(err) => {
                warn!(
                    error = %err,
                    generator = self.generator.name(),
                    "Retry failed, using fallback"
                );
                failures.push(err.to_string());
                self.fallback(user_message, profile, failures)
            }
            Attempt::Rejected(text) => {
                warn!(reply = %text, "Retry was generic too, using fallback");
                failures.push(format!("generic reply rejected: {:?}", text));
                self.fallback(user_message, profile, failures)
            }
        }
    }

    async fn attempt(&self, request: &GenerationRequest) -> Attempt {
        let result = tokio::time::timeout(self.settings.timeout, self.generator.generate(request))
            .await
            .unwrap_or(Err(GenerationError::Timeout(self.settings.timeout)));

        match result {
            Ok(output) if is_generic_reply(&output.text, self.settings.min_reply_chars) => {
                Attempt::Rejected(output.text)
            }
            Ok(output) => Attempt::Accepted(output.text),
            Err(err) => Attempt::Failed(err),
        }
    }

    fn fallback(
        &self,
        user_message: &str,
        profile: &BusinessProfile,
        failures: Vec<String>,
    ) -> Reply {
        Reply {
            text: keyword_fallback(user_message, profile),
            source: ReplySource::Fallback,
            failures,
        }
    }

    fn build_request(&self, prompt: String, history: &[Message]) -> GenerationRequest {
        let mut request =
            GenerationRequest::new(prompt).with_config(self.settings.generation.clone());

        if let Some(system) = history
            .first()
            .filter(|m| m.role == MessageRole::System)
        {
            request = request.with_system_instruction(system.content.clone());
        }

        let turns: Vec<Turn> = history
            .iter()
            .filter_map(|m| match m.role {
                MessageRole::User => Some(Turn::user(m.content.clone())),
                MessageRole::Assistant => Some(Turn::model(m.content.clone())),
                MessageRole::System => None,
            })
            .collect();
        let skip = turns.len().saturating_sub(self.settings.history_window);

        // Multi-turn requests must open with a user turn.
        request.with_history(
            turns
                .into_iter()
                .skip(skip)
                .skip_while(|turn| turn.role == TurnRole::Model)
                .collect(),
        )
    }
}

fn business_facts(profile: &BusinessProfile) -> String {
    let services = if profile.services.is_empty() {
        "Not specified".to_string()
    } else {
        profile.services.join(", ")
    };
    let description = match profile.description.trim() {
        "" => "Not provided",
        description => description,
    };

    format!(
        "Business name: {}\nBusiness type: {}\nServices: {}\nBusiness hours: {}\nBusiness description: {}\n",
        profile.business_name,
        profile.industry.label(),
        services,
        profile.hours,
        description
    )
}

/// The first-attempt instruction block.
pub fn build_instruction(user_message: &str, profile: &BusinessProfile) -> String {
    format!(
        "You are an AI assistant for a {label} called {name}.\n\
         {facts}\n\
         USER QUERY: \"{message}\"\n\n\
         IMPORTANT INSTRUCTIONS:\n\
         1. Respond directly to the user's query.\n\
         2. Include specific information about {name} in your response.\n\
         3. Reference the services or business hours if relevant.\n\
         4. DO NOT respond with the generic phrase \"{generic}\"\n\
         5. Never return an empty reply.\n\
         6. Be helpful, conversational, and natural.\n\n\
         YOUR SPECIFIC RESPONSE:",
        label = profile.industry.label(),
        name = profile.business_name,
        facts = business_facts(profile),
        message = user_message,
        generic = GENERIC_REPLY,
    )
}

/// A stricter instruction used after a generic first answer.
pub fn build_retry_instruction(user_message: &str, profile: &BusinessProfile) -> String {
    format!(
        "A customer of {name} ({label}) asked: \"{message}\"\n\n\
         {facts}\n\
         Your previous answer was too generic. Answer this exact question in one to three \
         sentences, using the business facts above by name. Do not say \"{generic}\". \
         Do not leave the answer empty.",
        name = profile.business_name,
        label = profile.industry.label(),
        message = user_message,
        facts = business_facts(profile),
        generic = GENERIC_REPLY,
    )
}
