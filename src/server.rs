//! Server startup and shutdown logic.
//!
//! `run_server` turns a loaded [`Config`] into a running HTTP server:
//! - CORS policy construction and validation
//! - Application state creation
//! - Router creation with the policy layered over every path
//! - Server binding and graceful shutdown

use crate::config::Config;
use crate::cors::CorsPolicy;
use crate::error::{AppError, AppResult};
use crate::routes;
use crate::state::AppState;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Name the service reports on `/health`
pub const SERVICE_NAME: &str = "order-web";

/// Run the web server with the given configuration.
///
/// `app_routes` are the business endpoints to serve under the CORS policy;
/// pass `Router::new()` to serve only the health endpoint.
///
/// # Errors
///
/// This function will return an error if:
/// - The CORS configuration contains an invalid origin, method or header
/// - Server binding fails
/// - Server runtime error occurs
pub async fn run_server(config: Config, addr: String, app_routes: Router) -> AppResult<()> {
    info!(environment = ?config.app_env, "Starting {}...", SERVICE_NAME);

    let policy = CorsPolicy::from_config(&config.cors)?;
    if config.app_env.is_production() && policy.allows_any_origin() {
        warn!(
            credentials = policy.allow_credentials(),
            "CORS allows every origin in production"
        );
    }

    let state = Arc::new(AppState::new(SERVICE_NAME, config.app_env));
    let app = routes::create_router(state, app_routes, &policy);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to address {}: {}", addr, e)))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(create_shutdown_signal())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create a future that resolves when a shutdown signal is received.
///
/// On Unix-like systems, this listens for both Ctrl+C (SIGINT) and SIGTERM.
/// On other platforms, it only listens for Ctrl+C.
///
/// # Panics
///
/// Panics if signal handler installation fails, since graceful shutdown is
/// impossible without it.
async fn create_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    info!("Shutdown signal received");
}
