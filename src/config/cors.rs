use serde::Deserialize;

/// Default browser origins of the order frontend during local development.
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Origin patterns allowed to make cross-origin requests (use ["*"] for all origins)
    pub allowed_origins: Vec<String>,

    /// HTTP methods permitted cross-origin (["*"] permits any)
    pub allowed_methods: Vec<String>,

    /// Request headers permitted cross-origin (["*"] permits any)
    pub allowed_headers: Vec<String>,

    /// Whether credentialed cross-origin requests are permitted
    pub allow_credentials: bool,

    /// How long a browser may cache a preflight response
    pub max_age_seconds: u64,
}

impl CorsConfig {
    /// Validate CORS configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.allowed_origins.is_empty() {
            return Err("CORS_ALLOWED_ORIGINS must list at least one origin".to_string());
        }

        if self.allowed_methods.is_empty() {
            return Err("CORS_ALLOWED_METHODS must list at least one method".to_string());
        }

        if self.allowed_headers.is_empty() {
            return Err("CORS_ALLOWED_HEADERS must list at least one header".to_string());
        }

        if self.max_age_seconds == 0 {
            return Err("CORS_MAX_AGE_SECONDS must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Whether the origin list is the single catch-all wildcard
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .split(',')
                .map(|s| s.to_string())
                .collect(),
            allowed_methods: vec!["*".to_string()],
            allowed_headers: vec!["*".to_string()],
            allow_credentials: true,
            max_age_seconds: 3600,
        }
    }
}
