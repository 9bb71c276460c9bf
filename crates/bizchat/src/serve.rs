use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use bizchat_core::ChatService;
use bizchat_db::Database;
use bizchat_llm::create_generator;
use bizchat_logging::{Logger, TurnEvent};

use crate::api::{self, AppState};
use crate::config::Config;

pub async fn handle_serve_command(config: Config) -> Result<()> {
    let db_path = config.database.resolved_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let db = Arc::new(
        Database::open_at(&db_path)
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?,
    );

    let generator = create_generator(&config.generator_settings()?)
        .context("Failed to create text generator")?;

    let logger = match &config.logging.file {
        Some(path) => Logger::with_file(config.logging.format, path)
            .with_context(|| format!("Failed to open event log {}", path.display()))?,
        None => Logger::new(config.logging.format),
    };
    let logger = Arc::new(logger);

    let service = Arc::new(ChatService::new(
        db,
        generator,
        config.service_settings(),
        logger.clone(),
    ));

    let router = api::create_router(AppState {
        service: service.clone(),
        public_base_url: config.server.public_base_url(),
        owner_header: config.server.owner_header.to_lowercase(),
    });

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;

    info!(addr = %addr, db = %db_path.display(), "Server listening");
    logger.log(&TurnEvent::ServerStarted {
        addr: addr.clone(),
        generator: service.generator_name().to_string(),
    });
    eprintln!("  {} Press {} to stop", "->".dimmed(), "Ctrl+C".bold());

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    logger.log(&TurnEvent::ServerStopped);
    result.context("API server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    eprintln!("\nShutting down...");
}
