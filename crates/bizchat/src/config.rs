//! Server configuration for bizchat.
//!
//! Loaded from `bizchat.toml` (or the file given with `--config`), then
//! overridden by `GEMINI_API_KEY` / `GEMINI_MODEL` and command-line flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bizchat_core::{ResponderSettings, ServiceSettings};
use bizchat_llm::{
    GenerationConfig, GeneratorSettings, GeneratorType, DEFAULT_BASE_URL, DEFAULT_MODEL,
};
use bizchat_logging::LogFormat;

/// The config file name
pub const CONFIG_FILE_NAME: &str = "bizchat.toml";

const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub generation: GenerationSection,
    pub conversation: ConversationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL used in embed snippets; defaults to `http://{host}:{port}`
    pub public_base_url: Option<String>,
    /// Trusted header carrying the authenticated owner id
    pub owner_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            public_base_url: None,
            owner_header: "x-owner-id".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}", self.bind_addr()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(bizchat_db::Database::default_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GenerationSection {
    /// `gemini` or `offline`
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub history_window: usize,
    pub min_reply_chars: usize,
}

impl Default for GenerationSection {
    fn default() -> Self {
        let sampling = GenerationConfig::default();
        let responder = ResponderSettings::default();
        Self {
            provider: GeneratorType::Gemini.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: sampling.temperature,
            top_k: sampling.top_k,
            top_p: sampling.top_p,
            max_output_tokens: sampling.max_output_tokens,
            timeout: responder.timeout,
            history_window: responder.history_window,
            min_reply_chars: responder.min_reply_chars,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConversationConfig {
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            idle_timeout: ServiceSettings::default().idle_timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// JSON-lines audit file for chat events
    pub file: Option<PathBuf>,
    /// Directory for the daily rolling diagnostic log
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
            dir: None,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `bizchat.toml` in the
    /// current directory is used when present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply `GEMINI_API_KEY` and `GEMINI_MODEL` through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.generation.api_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_MODEL").filter(|m| !m.trim().is_empty()) {
            self.generation.model = model;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.generator_type()?;
        if self.generation.history_window == 0 {
            anyhow::bail!("generation.history_window must be at least 1");
        }
        if self.generation.timeout.is_zero() {
            anyhow::bail!("generation.timeout must be greater than zero");
        }
        if self.server.owner_header.trim().is_empty() {
            anyhow::bail!("server.owner_header cannot be empty");
        }
        Ok(())
    }

    pub fn generator_type(&self) -> Result<GeneratorType> {
        self.generation
            .provider
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
    }

    pub fn generator_settings(&self) -> Result<GeneratorSettings> {
        Ok(GeneratorSettings {
            generator_type: self.generator_type()?,
            api_key: self.generation.api_key.clone(),
            model: self.generation.model.clone(),
            base_url: self.generation.base_url.clone(),
            timeout: self.generation.timeout,
        })
    }

    pub fn service_settings(&self) -> ServiceSettings {
        let generation = &self.generation;
        ServiceSettings {
            responder: ResponderSettings {
                generation: GenerationConfig {
                    temperature: generation.temperature,
                    top_k: generation.top_k,
                    top_p: generation.top_p,
                    max_output_tokens: generation.max_output_tokens,
                    ..GenerationConfig::default()
                },
                timeout: generation.timeout,
                history_window: generation.history_window,
                min_reply_chars: generation.min_reply_chars,
            },
            idle_timeout: self.conversation.idle_timeout,
        }
    }

    /// Copy safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.generation.api_key.is_some() {
            config.generation.api_key = Some(REDACTED.to_string());
        }
        config
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}
