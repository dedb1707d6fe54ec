use crate::error::AppError;
use axum::http::Uri;

/// Fallback for paths no route claims
pub async fn not_found(uri: Uri) -> AppError {
    AppError::RouteNotFound(uri.path().to_string())
}
