use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured events for chatbot activity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TurnEvent {
    ServerStarted {
        addr: String,
        generator: String,
    },
    ProfileCreated {
        chatbot_id: String,
        business_name: String,
    },
    ProfileDeleted {
        chatbot_id: String,
    },
    ConversationStarted {
        chatbot_id: String,
        session_id: String,
    },
    /// A generation attempt failed or was rejected; the turn moves on
    GenerationFailed {
        chatbot_id: String,
        session_id: String,
        attempt: u8,
        error: String,
    },
    TurnCompleted {
        chatbot_id: String,
        session_id: String,
        source: String,
        reply_chars: usize,
        duration_ms: u64,
    },
    FeedbackReceived {
        chatbot_id: String,
        session_id: String,
        rating: u8,
    },
    PersistenceFailed {
        chatbot_id: String,
        session_id: Option<String>,
        error: String,
    },
    ServerStopped,
}

impl TurnEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Compact => write!(f, "compact"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Event logger - writes to stderr and optionally to a JSON lines audit file
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger that also appends every event to `log_path`
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &TurnEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let _ = writeln!(file, "{}", event.with_timestamp());
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &TurnEvent) {
        let _ = writeln!(std::io::stderr(), "{}", event.with_timestamp());
    }

    fn log_pretty(&self, event: &TurnEvent) {
        let mut stderr = std::io::stderr();
        match event {
            TurnEvent::ServerStarted { addr, generator } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} {}",
                    "▶".bright_blue(),
                    "bizchat".bold().bright_white(),
                    format!("listening on http://{}", addr).dimmed()
                );
                let _ = writeln!(stderr, "  {} {}", "Generator:".dimmed(), generator);
                let _ = writeln!(stderr);
            }
            TurnEvent::ProfileCreated {
                chatbot_id,
                business_name,
            } => {
                let _ = writeln!(
                    stderr,
                    "{} Chatbot created: {} {}",
                    "+".bright_green(),
                    business_name.bold(),
                    Self::short_id(chatbot_id).dimmed()
                );
            }
            TurnEvent::ProfileDeleted { chatbot_id } => {
                let _ = writeln!(
                    stderr,
                    "{} Chatbot deleted {}",
                    "-".bright_red(),
                    Self::short_id(chatbot_id).dimmed()
                );
            }
            TurnEvent::ConversationStarted {
                chatbot_id,
                session_id,
            } => {
                let _ = writeln!(
                    stderr,
                    "{} New conversation {}/{}",
                    "●".bright_cyan(),
                    Self::short_id(chatbot_id).dimmed(),
                    Self::short_id(session_id)
                );
            }
            TurnEvent::GenerationFailed {
                session_id,
                attempt,
                error,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} Attempt {} for {} failed: {}",
                    "⚠".bright_yellow(),
                    attempt,
                    Self::short_id(session_id),
                    error.yellow()
                );
            }
            TurnEvent::TurnCompleted {
                session_id,
                source,
                reply_chars,
                duration_ms,
                ..
            } => {
                let styled_source = match source.as_str() {
                    "model" => source.bright_green(),
                    "retry" => source.bright_yellow(),
                    _ => source.bright_magenta(),
                };
                let _ = writeln!(
                    stderr,
                    "  {} {} replied via {} ({} chars, {}ms)",
                    "✓".bright_green(),
                    Self::short_id(session_id),
                    styled_source,
                    reply_chars,
                    duration_ms
                );
            }
            TurnEvent::FeedbackReceived {
                session_id, rating, ..
            } => {
                let stars = "★".repeat(*rating as usize);
                let _ = writeln!(
                    stderr,
                    "  {} Feedback for {}: {}",
                    "✎".bright_blue(),
                    Self::short_id(session_id),
                    stars.bright_yellow()
                );
            }
            TurnEvent::PersistenceFailed {
                chatbot_id, error, ..
            } => {
                let _ = writeln!(
                    stderr,
                    "{} Store error for {}: {}",
                    "✗".bright_red(),
                    Self::short_id(chatbot_id),
                    error.bright_red()
                );
            }
            TurnEvent::ServerStopped => {
                let _ = writeln!(stderr, "{} {}", "■".bright_blue(), "Server stopped".dimmed());
            }
        }
    }

    fn log_compact(&self, event: &TurnEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            TurnEvent::ServerStarted { addr, generator } => {
                format!("[{}] server:start {} gen={}", timestamp, addr, generator)
            }
            TurnEvent::ProfileCreated { chatbot_id, .. } => {
                format!("[{}] bot:create {}", timestamp, chatbot_id)
            }
            TurnEvent::ProfileDeleted { chatbot_id } => {
                format!("[{}] bot:delete {}", timestamp, chatbot_id)
            }
            TurnEvent::ConversationStarted {
                chatbot_id,
                session_id,
            } => format!("[{}] conv:new {}/{}", timestamp, chatbot_id, session_id),
            TurnEvent::GenerationFailed {
                session_id,
                attempt,
                error,
                ..
            } => format!(
                "[{}] gen:fail:{} {} {}",
                timestamp, attempt, session_id, error
            ),
            TurnEvent::TurnCompleted {
                session_id,
                source,
                reply_chars,
                duration_ms,
                ..
            } => format!(
                "[{}] turn:done {} src={} {}c {}ms",
                timestamp, session_id, source, reply_chars, duration_ms
            ),
            TurnEvent::FeedbackReceived {
                session_id, rating, ..
            } => format!("[{}] feedback {} {}", timestamp, session_id, rating),
            TurnEvent::PersistenceFailed {
                chatbot_id, error, ..
            } => format!("[{}] store:error {} {}", timestamp, chatbot_id, error),
            TurnEvent::ServerStopped => format!("[{}] server:stop", timestamp),
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// First 8 characters of an id, enough to tell sessions apart in a terminal
    fn short_id(id: &str) -> &str {
        match id.char_indices().nth(8) {
            Some((idx, _)) => &id[..idx],
            None => id,
        }
    }
}
