use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;

mod cors;
mod server;

pub use cors::{CorsConfig, DEFAULT_ALLOWED_ORIGINS};
pub use server::ServerConfig;

/// Deployment environment the service runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(AppError::Configuration(format!(
                "Invalid APP_ENV: {}",
                other
            ))),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app_env: AppEnv,
    pub cors: CorsConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Missing keys fall back to their defaults; present keys must parse.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_host = lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let server_port = lookup("SERVER_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .map_err(|_| AppError::Configuration("Invalid SERVER_PORT".to_string()))?;

        let app_env = AppEnv::parse(
            &lookup("APP_ENV").unwrap_or_else(|| "development".to_string()),
        )?;

        // CORS config
        let allowed_origins = parse_list(
            &lookup("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string()),
        );
        let allowed_methods =
            parse_list(&lookup("CORS_ALLOWED_METHODS").unwrap_or_else(|| "*".to_string()));
        let allowed_headers =
            parse_list(&lookup("CORS_ALLOWED_HEADERS").unwrap_or_else(|| "*".to_string()));
        let allow_credentials = lookup("CORS_ALLOW_CREDENTIALS")
            .unwrap_or_else(|| "true".to_string())
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration("Invalid CORS_ALLOW_CREDENTIALS".to_string()))?;
        let max_age_seconds = lookup("CORS_MAX_AGE_SECONDS")
            .unwrap_or_else(|| "3600".to_string())
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration("Invalid CORS_MAX_AGE_SECONDS".to_string()))?;

        let config = Config {
            server: ServerConfig {
                host: server_host,
                port: server_port,
            },
            app_env,
            cors: CorsConfig {
                allowed_origins,
                allowed_methods,
                allowed_headers,
                allow_credentials,
                max_age_seconds,
            },
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> AppResult<()> {
        if self.server.host.trim().is_empty() {
            return Err(AppError::Configuration(
                "SERVER_HOST must not be empty".to_string(),
            ));
        }

        self.cors.validate().map_err(AppError::Configuration)?;

        Ok(())
    }
}

/// Split a comma-separated setting, collapsing any list containing `*` to the wildcard
fn parse_list(value: &str) -> Vec<String> {
    let items: Vec<String> = value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if items.iter().any(|s| s == "*") {
        vec!["*".to_string()]
    } else {
        items
    }
}
