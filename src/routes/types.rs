use crate::config::AppEnv;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub service: String,
    pub environment: AppEnv,
    pub uptime_seconds: i64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
