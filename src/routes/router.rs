use crate::cors::{apply_cors, build_cors_middleware, CorsPolicy};
use crate::middleware_impls::request_id_middleware;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::health;
use super::helpers;
use super::AppState;

/// Create application router.
///
/// `app_routes` carries the business endpoints mounted by the caller; it
/// must not define its own fallback. The CORS middleware is applied last so
/// it wraps everything, including the health route and unmatched paths.
pub fn create_router(state: Arc<AppState>, app_routes: Router, policy: &CorsPolicy) -> Router {
    let http_layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware));

    Router::new()
        .route("/health", get(health::health_check))
        .fallback(helpers::not_found)
        .with_state(state)
        .merge(app_routes)
        .layer(http_layers)
        .layer(middleware::from_fn_with_state(
            build_cors_middleware(policy),
            apply_cors,
        ))
}
