//! Integration tests for the global CORS policy.
//!
//! Requests are driven through the full router with `oneshot`, so the
//! assertions cover the wire-level headers a browser would see.

use axum::body::Body;
use axum::extract::Path;
use axum::http::{Method, Request, Response, StatusCode};
use axum::routing::{any, get};
use axum::Router;
use http_body_util::BodyExt;
use order_web::config::{AppEnv, CorsConfig};
use order_web::cors::CorsPolicy;
use order_web::routes::create_router;
use order_web::state::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

const ORIGIN: &str = "https://example.com";

/// Router with stand-in order endpoints that count how often they are reached
fn app(policy: &CorsPolicy, hits: Arc<AtomicUsize>) -> Router {
    let list_hits = hits.clone();
    let item_hits = hits;

    let orders = Router::new()
        .route(
            "/orders",
            any(move || {
                let hits = list_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "orders"
                }
            }),
        )
        .route(
            "/orders/{id}",
            get(move |Path(id): Path<String>| {
                let hits = item_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    format!("order {}", id)
                }
            }),
        );

    let state = Arc::new(AppState::new("order-web", AppEnv::Development));
    create_router(state, orders, policy)
}

fn preflight(path: &str, origin: &str, method: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri(path)
        .header("origin", origin)
        .header("access-control-request-method", method)
        .body(Body::empty())
        .unwrap()
}

fn cross_origin_get(path: &str, origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(path)
        .header("origin", origin)
        .body(Body::empty())
        .unwrap()
}

fn header<'a, B>(response: &'a Response<B>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

fn assert_no_cors_headers<B>(response: &Response<B>) {
    for name in response.headers().keys() {
        assert!(
            !name.as_str().starts_with("access-control-"),
            "unexpected {}",
            name
        );
        assert_ne!(name.as_str(), "vary");
    }
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

mod permissive_policy {
    use super::*;

    #[tokio::test]
    async fn test_preflight_for_orders_is_answered_directly() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(&CorsPolicy::permissive_development(), hits.clone());

        let response = app
            .oneshot(preflight("/orders", ORIGIN, "POST"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "access-control-allow-origin"), Some(ORIGIN));
        assert_eq!(header(&response, "access-control-allow-credentials"), Some("true"));
        assert!(header(&response, "access-control-allow-methods")
            .unwrap()
            .contains("POST"));
        assert_eq!(header(&response, "access-control-max-age"), Some("3600"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_preflight_echoes_any_origin() {
        let policy = CorsPolicy::permissive_development();
        let origins = [
            "https://example.com",
            "http://localhost:3000",
            "https://shop.other-domain.io:8443",
            "null",
        ];

        for origin in origins {
            let response = app(&policy, Arc::new(AtomicUsize::new(0)))
                .oneshot(preflight("/orders", origin, "GET"))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(header(&response, "access-control-allow-origin"), Some(origin));
            assert_eq!(
                header(&response, "access-control-allow-credentials"),
                Some("true")
            );
        }
    }

    #[tokio::test]
    async fn test_preflight_permits_any_method() {
        let policy = CorsPolicy::permissive_development();

        for method in ["GET", "POST", "PUT", "PATCH", "DELETE", "PURGE"] {
            let response = app(&policy, Arc::new(AtomicUsize::new(0)))
                .oneshot(preflight("/orders", ORIGIN, method))
                .await
                .unwrap();

            let allowed = header(&response, "access-control-allow-methods").unwrap();
            assert!(allowed.contains(method), "{} not in {}", method, allowed);
        }
    }

    #[tokio::test]
    async fn test_preflight_permits_any_header() {
        let policy = CorsPolicy::permissive_development();
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/orders")
            .header("origin", ORIGIN)
            .header("access-control-request-method", "POST")
            .header(
                "access-control-request-headers",
                "content-type,authorization,x-custom-header",
            )
            .body(Body::empty())
            .unwrap();

        let response = app(&policy, Arc::new(AtomicUsize::new(0)))
            .oneshot(request)
            .await
            .unwrap();

        let allowed = header(&response, "access-control-allow-headers")
            .unwrap()
            .to_ascii_lowercase();
        for name in ["content-type", "authorization", "x-custom-header"] {
            assert!(allowed.contains(name), "{} not in {}", name, allowed);
        }
    }

    #[tokio::test]
    async fn test_cross_origin_get_reaches_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(&CorsPolicy::permissive_development(), hits.clone());

        let response = app
            .oneshot(cross_origin_get("/orders/123", ORIGIN))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "access-control-allow-origin"), Some(ORIGIN));
        assert_eq!(header(&response, "access-control-allow-credentials"), Some("true"));
        assert!(header(&response, "access-control-max-age").is_none());

        let exposed = header(&response, "access-control-expose-headers")
            .unwrap()
            .to_ascii_lowercase();
        for name in [
            "access-control-allow-origin",
            "access-control-allow-methods",
            "access-control-allow-headers",
            "access-control-max-age",
            "access-control-allow-credentials",
        ] {
            assert!(exposed.contains(name), "{} not in {}", name, exposed);
        }

        assert_eq!(body_text(response).await, "order 123");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_same_policy_on_every_path() {
        let policy = CorsPolicy::permissive_development();

        for path in ["/orders", "/orders/123", "/health", "/not-a-route"] {
            let response = app(&policy, Arc::new(AtomicUsize::new(0)))
                .oneshot(preflight(path, ORIGIN, "POST"))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK, "path {}", path);
            assert_eq!(header(&response, "access-control-allow-origin"), Some(ORIGIN));
            assert_eq!(header(&response, "access-control-max-age"), Some("3600"));
        }
    }

    #[tokio::test]
    async fn test_non_cors_get_is_untouched() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(&CorsPolicy::permissive_development(), hits.clone());

        let request = Request::builder()
            .uri("/orders")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_no_cors_headers(&response);
        assert_eq!(body_text(response).await, "orders");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_plain_options_reaches_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(&CorsPolicy::permissive_development(), hits.clone());

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/orders")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_no_cors_headers(&response);
        assert_eq!(body_text(response).await, "orders");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_options_without_request_method_is_an_actual_request() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(&CorsPolicy::permissive_development(), hits.clone());

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/orders")
            .header("origin", ORIGIN)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "access-control-allow-origin"), Some(ORIGIN));
        assert_eq!(header(&response, "access-control-allow-credentials"), Some("true"));
        assert!(header(&response, "access-control-max-age").is_none());
        assert_eq!(body_text(response).await, "orders");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_same_origin_request_is_untouched() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = app(&CorsPolicy::permissive_development(), hits.clone());

        let request = Request::builder()
            .uri("/orders")
            .header("host", "orders.local:8080")
            .header("origin", "http://orders.local:8080")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_no_cors_headers(&response);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_path_still_carries_cors_headers() {
        let response = app(&CorsPolicy::permissive_development(), Arc::new(AtomicUsize::new(0)))
            .oneshot(cross_origin_get("/missing", ORIGIN))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(header(&response, "access-control-allow-origin"), Some(ORIGIN));

        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], "NOT_FOUND");
    }
}

mod configured_policy {
    use super::*;

    fn policy_for(origins: &[&str]) -> CorsPolicy {
        CorsPolicy::from_config(&CorsConfig {
            allowed_origins: origins.iter().map(|s| s.to_string()).collect(),
            ..CorsConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_default_allow_list_admits_local_frontend() {
        let policy = CorsPolicy::from_config(&CorsConfig::default()).unwrap();

        let response = app(&policy, Arc::new(AtomicUsize::new(0)))
            .oneshot(preflight("/orders", "http://localhost:3000", "POST"))
            .await
            .unwrap();

        assert_eq!(
            header(&response, "access-control-allow-origin"),
            Some("http://localhost:3000")
        );
        assert_eq!(header(&response, "access-control-allow-credentials"), Some("true"));
    }

    #[tokio::test]
    async fn test_disallowed_origin_is_forwarded_without_allow_origin() {
        let hits = Arc::new(AtomicUsize::new(0));
        let policy = CorsPolicy::from_config(&CorsConfig::default()).unwrap();

        let response = app(&policy, hits.clone())
            .oneshot(cross_origin_get("/orders", "https://evil.example"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(header(&response, "access-control-allow-origin").is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subdomain_pattern() {
        let policy = policy_for(&["https://*.example.com"]);

        let allowed = app(&policy, Arc::new(AtomicUsize::new(0)))
            .oneshot(preflight("/orders", "https://shop.example.com", "PUT"))
            .await
            .unwrap();
        assert_eq!(
            header(&allowed, "access-control-allow-origin"),
            Some("https://shop.example.com")
        );

        let apex = app(&policy, Arc::new(AtomicUsize::new(0)))
            .oneshot(preflight("/orders", "https://example.com", "PUT"))
            .await
            .unwrap();
        assert!(header(&apex, "access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_explicit_method_list() {
        let policy = CorsPolicy::from_config(&CorsConfig {
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            ..CorsConfig::default()
        })
        .unwrap();

        let response = app(&policy, Arc::new(AtomicUsize::new(0)))
            .oneshot(preflight("/orders", "http://localhost:5173", "DELETE"))
            .await
            .unwrap();

        let allowed = header(&response, "access-control-allow-methods").unwrap();
        assert!(allowed.contains("GET"));
        assert!(allowed.contains("POST"));
        assert!(!allowed.contains("DELETE"));
    }

    #[tokio::test]
    async fn test_wildcard_without_credentials_answers_star() {
        let policy = CorsPolicy::from_config(&CorsConfig {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
            ..CorsConfig::default()
        })
        .unwrap();

        let response = app(&policy, Arc::new(AtomicUsize::new(0)))
            .oneshot(cross_origin_get("/orders", ORIGIN))
            .await
            .unwrap();

        assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
        assert!(header(&response, "access-control-allow-credentials").is_none());
    }

    #[tokio::test]
    async fn test_custom_max_age() {
        let policy = CorsPolicy::from_config(&CorsConfig {
            max_age_seconds: 600,
            ..CorsConfig::default()
        })
        .unwrap();

        let response = app(&policy, Arc::new(AtomicUsize::new(0)))
            .oneshot(preflight("/orders", "http://localhost:3000", "GET"))
            .await
            .unwrap();

        assert_eq!(header(&response, "access-control-max-age"), Some("600"));
    }
}
