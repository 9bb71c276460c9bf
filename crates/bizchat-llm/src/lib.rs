mod gemini;
mod offline;
mod output;
mod traits;

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub use gemini::{GeminiGenerator, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use offline::OfflineGenerator;
pub use output::GeneratedText;
pub use traits::{
    GenerationConfig, GenerationError, GenerationRequest, GeneratorType, TextGenerator, Turn,
    TurnRole, GENERIC_REPLY,
};

/// Settings needed to build a generator
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub generator_type: GeneratorType,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// HTTP client timeout
    pub timeout: Duration,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            generator_type: GeneratorType::Gemini,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Create a generator by type.
///
/// A Gemini generator without an API key degrades to the offline generator.
pub fn create_generator(
    settings: &GeneratorSettings,
) -> Result<Arc<dyn TextGenerator>, GenerationError> {
    match settings.generator_type {
        GeneratorType::Gemini => {
            match settings.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
                Some(key) => Ok(Arc::new(GeminiGenerator::new(
                    key,
                    settings.model.clone(),
                    &settings.base_url,
                    settings.timeout,
                )?)),
                None => {
                    warn!("No Gemini API key configured, replies will use keyword fallbacks");
                    Ok(Arc::new(OfflineGenerator::new()))
                }
            }
        }
        GeneratorType::Offline => Ok(Arc::new(OfflineGenerator::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_degrades_to_offline() {
        let generator = create_generator(&GeneratorSettings::default()).unwrap();
        assert_eq!(generator.generator_type(), GeneratorType::Offline);

        let blank = GeneratorSettings {
            api_key: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            create_generator(&blank).unwrap().generator_type(),
            GeneratorType::Offline
        );
    }

    #[test]
    fn test_key_builds_gemini() {
        let settings = GeneratorSettings {
            api_key: Some("abc123".to_string()),
            ..Default::default()
        };
        let generator = create_generator(&settings).unwrap();
        assert_eq!(generator.generator_type(), GeneratorType::Gemini);
        assert!(generator.is_configured());
    }
}
