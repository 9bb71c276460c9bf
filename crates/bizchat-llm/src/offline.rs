use async_trait::async_trait;

use crate::{GeneratedText, GenerationError, GenerationRequest, GeneratorType, TextGenerator};

/// Generator used when no provider credentials are configured.
/// Every call fails, so callers always take their fallback path.
#[derive(Debug, Default)]
pub struct OfflineGenerator;

impl OfflineGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextGenerator for OfflineGenerator {
    fn name(&self) -> &str {
        "Offline"
    }

    fn generator_type(&self) -> GeneratorType {
        GeneratorType::Offline
    }

    async fn generate(
        &self,
        _request: &GenerationRequest,
    ) -> Result<GeneratedText, GenerationError> {
        Err(GenerationError::NotConfigured(
            "no API key configured".to_string(),
        ))
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_always_errors() {
        let generator = OfflineGenerator::new();
        let err = generator
            .generate(&GenerationRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured(_)));
        assert!(!generator.is_configured());
    }
}
