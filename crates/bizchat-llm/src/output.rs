use std::time::Duration;

/// Text returned by a generator
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedText {
    pub text: String,
    /// Why the model stopped, when the backend reports it
    pub finish_reason: Option<String>,
    /// Wall time of the call
    pub duration: Duration,
}

impl GeneratedText {
    pub fn new(text: impl Into<String>, duration: Duration) -> Self {
        Self {
            text: text.into(),
            finish_reason: None,
            duration,
        }
    }

    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }
}
