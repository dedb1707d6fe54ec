use crate::config::AppEnv;
use chrono::{DateTime, Utc};

/// Application state shared across all HTTP handlers.
///
/// Wrapped in `Arc` and handed to handlers through Axum's State extraction.
/// The CORS policy is deliberately not part of it: it is consumed once when
/// the router is built and lives inside the CORS layer afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Name reported by the health endpoint
    pub service_name: String,

    /// Environment the process was started in
    pub app_env: AppEnv,

    /// When the process started serving
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(service_name: impl Into<String>, app_env: AppEnv) -> Self {
        Self {
            service_name: service_name.into(),
            app_env,
            started_at: Utc::now(),
        }
    }
}
