//! Application entry point and server initialization
//!
//! This module contains the main function that:
//! - Loads environment configuration
//! - Opens the database and restores the form store
//! - Starts the HTTP server with graceful shutdown support

use std::sync::Arc;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use formgen::config::AppConfig;
use formgen::database::{init_db, RedbStorage};
use formgen::error::AppError;
use formgen::route::create_app;
use formgen::state::AppState;
use formgen::store::FormStore;
use formgen::upstream::WorkflowClient;

/// Application entry point
///
/// # Environment Variables
///
/// See [`AppConfig`]; the most important are:
/// - `PORT` - Server port number (default: 8080)
/// - `DATABASE_URL` - Path to database file (default: "data.db")
/// - `WORKFLOW_API_KEY` - Key for the form generation workflow
#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("formgen=debug,tower_http=debug")),
        )
        .init();

    let config = AppConfig::from_env();
    if config.workflow_api_key.is_none() {
        tracing::warn!("WORKFLOW_API_KEY is not set, form generation is disabled");
    }

    let db = init_db(&config.database_url)?;
    let storage = Arc::new(RedbStorage::new(Arc::new(db)));
    let store = FormStore::open(storage, &config.public_base_url)?;
    let generator = Arc::new(WorkflowClient::new(
        &config.workflow_api_url,
        config.workflow_api_key.clone(),
    ));

    let addr = format!("0.0.0.0:{}", config.port);
    let database_url = config.database_url.clone();
    let app = create_app(AppState::new(store, generator, config)).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, database = %database_url, "server listening");

    // The server keeps running until it receives SIGTERM or SIGINT
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves when SIGINT (Ctrl+C) or, on Unix, SIGTERM is received
///
/// Open connections are allowed to complete so no snapshot write is cut off.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, stopping server");
}
