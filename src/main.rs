mod api;
mod config;
mod models;
mod providers;
mod services;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use api::{create_router, AppState};
use config::{Command, Config, ServeArgs};
use providers::OllamaProvider;
use services::{import::import_histories, Database, HistoriesFile, LegacyHistory, RelayService};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_relay=debug,tower_http=info")),
        )
        .init();

    let config = Config::parse();
    let db = Database::open(&config.database).await?;

    match config.command() {
        Command::Serve(args) => serve(db, args).await,
        Command::ImportHistories { file } => {
            let imported = import_histories(&db, &HistoriesFile::new(file)).await?;
            println!("Imported {} chats", imported);
            Ok(())
        }
    }
}

async fn serve(db: Database, args: ServeArgs) -> Result<()> {
    let provider = OllamaProvider::new(args.upstream_url.as_str());
    tracing::info!("Relaying to {}", provider.chat_url());

    let relay = RelayService::new(Arc::new(provider), args.default_model);
    tracing::info!("Default model: {}", relay.default_model());

    let state = AppState::new(db, LegacyHistory::new(args.history_file), relay);
    let app = create_router(state, &args.index_page);

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    tracing::info!("Listening on http://{}", args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
