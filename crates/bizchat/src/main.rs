mod api;
mod config;
mod serve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use bizchat_logging::{init_tracing, LogFormat};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "bizchat",
    about = "Multi-tenant business chatbot server",
    version,
    author
)]
struct Cli {
    /// Path to the config file (default: ./bizchat.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// SQLite database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormatChoice>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Print the effective configuration with secrets redacted
    CheckConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::CheckConfig => {
            print!("{}", config.redacted().to_toml()?);
            Ok(())
        }
        Command::Serve => {
            let _guard = init_tracing(
                &config.logging.level,
                config.logging.format,
                config.logging.dir.as_deref(),
            )
            .context("Failed to initialize logging")?;
            serve::handle_serve_command(config).await
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref db) = cli.db {
        config.database.path = Some(db.clone());
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }

    Ok(config)
}
