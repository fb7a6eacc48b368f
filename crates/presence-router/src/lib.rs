//! Presence Router
//!
//! HTTP surface for proof-of-presence attendance: `POST /presence/evaluate`,
//! `POST /presence/commit`, read-only ledger and geofence lookups, and a
//! health check. Wires configuration, the SQLite ledger, the geofence
//! registry, the presence service and the session sweeper together.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod registry;

use std::sync::Arc;

use config::RouterConfig;
use handlers::{create_router, AppState};
use presence_ledger::{LedgerError, SqliteLedger};
use presence_session::{OutcomeTokens, PresenceService, SessionSweeper};
use registry::GeofenceRegistry;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Router error
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Ledger could not be opened
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Build the application state described by `config`
pub fn build_state(config: &RouterConfig) -> Result<AppState, RouterError> {
    config.validate()?;

    let ledger = Arc::new(SqliteLedger::new(&config.database_path)?);
    let registry = GeofenceRegistry::from_config(&config.courses)?;
    let service = PresenceService::new(
        ledger,
        registry,
        OutcomeTokens::new(&config.token_secret),
        config.service_config()?,
    );

    Ok(AppState {
        service: Arc::new(service),
    })
}

/// Start the presence HTTP server
///
/// Loads the ledger and geofences, starts the session sweeper, and serves
/// until Ctrl+C.
pub async fn start_server(config: RouterConfig) -> Result<(), RouterError> {
    // Initialize tracing; RUST_LOG overrides the default level
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    info!("Starting presence router");
    info!("Bind address: {}", config.bind_addr());
    info!("Ledger: {}", config.database_path);
    info!("Outcome validity: {} seconds", config.outcome.validity_secs);
    info!("Configured courses: {}", config.courses.len());

    let state = build_state(&config)?;

    let sweeper = SessionSweeper::new(
        state.service.sessions(),
        state.service.clock(),
        config.sweeper_config(),
    );
    tokio::spawn(async move { sweeper.run().await });

    let app = create_router(state);

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Router listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received, stopping router");
        })
        .await
        .map_err(|e| RouterError::Server(e.to_string()))?;

    Ok(())
}
