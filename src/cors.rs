//! Global CORS policy for the order service.
//!
//! The policy is built once at startup and turned into a single
//! [`CorsMiddleware`] that wraps the whole router, so it applies identically
//! to every path (`/**`). It never rejects a request: origins that do not
//! match simply receive no `Access-Control-Allow-Origin` header and the
//! browser withholds the response.
//!
//! Header computation is delegated to tower-http's [`CorsLayer`]. The
//! middleware only decides which requests reach it:
//! - no `Origin`, or an `Origin` equal to the request's `Host`: forwarded untouched
//! - `OPTIONS` with `Origin` and `Access-Control-Request-Method`: answered as a preflight
//! - anything else with an `Origin`: forwarded, CORS headers added to the response
//!
//! `*` combined with credentials is not a legal CORS answer, so wildcard
//! origins, methods and headers are answered by echoing what the request
//! asked for.

use crate::config::CorsConfig;
use crate::error::{AppError, AppResult};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::header::{ACCESS_CONTROL_REQUEST_METHOD, HOST, ORIGIN, VARY};
use http::{request::Parts, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::convert::Infallible;
use std::time::Duration;
use tower::{service_fn, Layer, ServiceExt};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer, ExposeHeaders};
use url::Url;

/// Path pattern the policy is registered against
pub const ALL_PATHS: &str = "/**";

/// Preflight cache duration used unless configured otherwise
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 3600;

/// Response headers browsers may read from cross-origin responses
pub const EXPOSED_HEADERS: [&str; 5] = [
    "Access-Control-Allow-Origin",
    "Access-Control-Allow-Methods",
    "Access-Control-Allow-Headers",
    "Access-Control-Max-Age",
    "Access-Control-Allow-Credentials",
];

const WILDCARD: &str = "*";

/// A single entry of the origin allow-list.
///
/// - `*` matches every origin.
/// - A pattern with `*` elsewhere (`https://*.example.com`, `http://localhost:*`)
///   matches one or more characters other than `/` in that position.
/// - Anything else is an exact `scheme://host[:port]` origin.
#[derive(Debug, Clone)]
pub struct OriginPattern {
    source: String,
    matcher: OriginMatcher,
}

#[derive(Debug, Clone)]
enum OriginMatcher {
    Any,
    Exact(String),
    Wildcard(Regex),
}

impl OriginPattern {
    pub fn parse(pattern: &str) -> AppResult<Self> {
        let source = pattern.trim();
        if source.is_empty() {
            return Err(AppError::InvalidOrigin("empty origin pattern".to_string()));
        }

        let matcher = if source == WILDCARD {
            OriginMatcher::Any
        } else if source.contains('*') {
            OriginMatcher::Wildcard(compile_wildcard(source)?)
        } else {
            OriginMatcher::Exact(normalize_exact(source)?)
        };

        Ok(Self {
            source: source.to_string(),
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_any(&self) -> bool {
        matches!(self.matcher, OriginMatcher::Any)
    }

    /// Check a request `Origin` header value against this pattern
    pub fn matches(&self, origin: &str) -> bool {
        match &self.matcher {
            OriginMatcher::Any => true,
            OriginMatcher::Exact(expected) => origin.eq_ignore_ascii_case(expected),
            OriginMatcher::Wildcard(re) => re.is_match(origin),
        }
    }
}

impl PartialEq for OriginPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source.eq_ignore_ascii_case(&other.source)
    }
}

impl Serialize for OriginPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

fn compile_wildcard(pattern: &str) -> AppResult<Regex> {
    if !pattern.contains("://") || pattern.starts_with('*') {
        return Err(AppError::InvalidOrigin(format!(
            "{}: wildcard patterns need an explicit scheme",
            pattern
        )));
    }

    let authority = pattern.splitn(2, "://").nth(1).unwrap_or_default();
    if authority.is_empty() || authority.contains('/') {
        return Err(AppError::InvalidOrigin(format!(
            "{}: expected scheme://host[:port] without a path",
            pattern
        )));
    }

    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[^/]+");

    Regex::new(&format!("(?i)^{}$", body))
        .map_err(|e| AppError::InvalidOrigin(format!("{}: {}", pattern, e)))
}

fn normalize_exact(origin: &str) -> AppResult<String> {
    let url = Url::parse(origin)
        .map_err(|e| AppError::InvalidOrigin(format!("{}: {}", origin, e)))?;

    let bare = url.origin().is_tuple()
        && url.host_str().is_some()
        && url.username().is_empty()
        && url.password().is_none()
        && url.path() == "/"
        && url.query().is_none()
        && url.fragment().is_none();

    if !bare {
        return Err(AppError::InvalidOrigin(format!(
            "{}: expected scheme://host[:port]",
            origin
        )));
    }

    Ok(url.origin().ascii_serialization())
}

/// The CORS rule set applied to every request.
///
/// Immutable once built; share it freely across request tasks.
#[derive(Debug, Clone, Serialize)]
pub struct CorsPolicy {
    allow_credentials: bool,
    allowed_origin_patterns: Vec<OriginPattern>,
    allowed_headers: Vec<String>,
    allowed_methods: Vec<String>,
    exposed_headers: Vec<String>,
    max_age_seconds: u64,
    path_pattern: &'static str,
}

impl CorsPolicy {
    /// Any origin, any method, any header, with credentials.
    ///
    /// Only meant for local development; see [`CorsPolicy::warnings`].
    pub fn permissive_development() -> Self {
        Self {
            allow_credentials: true,
            allowed_origin_patterns: vec![OriginPattern {
                source: WILDCARD.to_string(),
                matcher: OriginMatcher::Any,
            }],
            allowed_headers: vec![WILDCARD.to_string()],
            allowed_methods: vec![WILDCARD.to_string()],
            exposed_headers: EXPOSED_HEADERS.iter().map(|h| h.to_string()).collect(),
            max_age_seconds: DEFAULT_MAX_AGE_SECONDS,
            path_pattern: ALL_PATHS,
        }
    }

    /// Build the policy from loaded configuration, validating every entry
    pub fn from_config(config: &CorsConfig) -> AppResult<Self> {
        config.validate().map_err(AppError::Configuration)?;

        let mut allowed_origin_patterns: Vec<OriginPattern> = Vec::new();
        if config.allows_any_origin() {
            allowed_origin_patterns.push(OriginPattern::parse(WILDCARD)?);
        } else {
            for raw in &config.allowed_origins {
                let pattern = OriginPattern::parse(raw)?;
                if !allowed_origin_patterns.contains(&pattern) {
                    allowed_origin_patterns.push(pattern);
                }
            }
        }

        let allowed_methods = normalize_list(&config.allowed_methods, |m| {
            let upper = m.to_ascii_uppercase();
            Method::from_bytes(upper.as_bytes())
                .map(|_| upper)
                .map_err(|_| AppError::Configuration(format!("Invalid CORS method: {}", m)))
        })?;

        let allowed_headers = normalize_list(&config.allowed_headers, |h| {
            HeaderName::from_bytes(h.as_bytes())
                .map(|name| name.as_str().to_string())
                .map_err(|_| AppError::Configuration(format!("Invalid CORS header: {}", h)))
        })?;

        Ok(Self {
            allow_credentials: config.allow_credentials,
            allowed_origin_patterns,
            allowed_headers,
            allowed_methods,
            exposed_headers: EXPOSED_HEADERS.iter().map(|h| h.to_string()).collect(),
            max_age_seconds: config.max_age_seconds,
            path_pattern: ALL_PATHS,
        })
    }

    pub fn allow_credentials(&self) -> bool {
        self.allow_credentials
    }

    pub fn allowed_origin_patterns(&self) -> &[OriginPattern] {
        &self.allowed_origin_patterns
    }

    pub fn allowed_headers(&self) -> &[String] {
        &self.allowed_headers
    }

    pub fn allowed_methods(&self) -> &[String] {
        &self.allowed_methods
    }

    pub fn exposed_headers(&self) -> &[String] {
        &self.exposed_headers
    }

    pub fn max_age_seconds(&self) -> u64 {
        self.max_age_seconds
    }

    pub fn path_pattern(&self) -> &str {
        self.path_pattern
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origin_patterns.iter().any(OriginPattern::is_any)
    }

    /// Whether a request `Origin` value would be granted access
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.allowed_origin_patterns.iter().any(|p| p.matches(origin))
    }

    /// Configuration hazards worth surfacing at startup. Never fatal.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.allows_any_origin() && self.allow_credentials {
            warnings.push(
                "any origin may send credentialed requests; suitable for local development only, \
                 restrict CORS_ALLOWED_ORIGINS in production"
                    .to_string(),
            );
        }

        if self.allow_credentials
            && self
                .allowed_origin_patterns
                .iter()
                .any(|p| p.as_str().to_ascii_lowercase().starts_with("http://*"))
        {
            warnings.push(
                "a wildcard plain-http origin may send credentialed requests".to_string(),
            );
        }

        warnings
    }

    /// Translate the policy into the tower-http layer that enforces it
    pub fn layer(&self) -> CorsLayer {
        let allow_origin = if self.allows_any_origin() {
            if self.allow_credentials {
                AllowOrigin::mirror_request()
            } else {
                AllowOrigin::any()
            }
        } else {
            let patterns = self.allowed_origin_patterns.clone();
            AllowOrigin::predicate(move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .map(|o| patterns.iter().any(|p| p.matches(o)))
                    .unwrap_or(false)
            })
        };

        let allow_methods = if is_wildcard(&self.allowed_methods) {
            if self.allow_credentials {
                AllowMethods::mirror_request()
            } else {
                AllowMethods::any()
            }
        } else {
            AllowMethods::list(
                self.allowed_methods
                    .iter()
                    .filter_map(|m| Method::from_bytes(m.as_bytes()).ok()),
            )
        };

        let allow_headers = if is_wildcard(&self.allowed_headers) {
            if self.allow_credentials {
                AllowHeaders::mirror_request()
            } else {
                AllowHeaders::any()
            }
        } else {
            AllowHeaders::list(
                self.allowed_headers
                    .iter()
                    .filter_map(|h| h.parse::<HeaderName>().ok()),
            )
        };

        let expose_headers = ExposeHeaders::list(
            self.exposed_headers
                .iter()
                .filter_map(|h| h.parse::<HeaderName>().ok()),
        );

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(allow_methods)
            .allow_headers(allow_headers)
            .expose_headers(expose_headers)
            .allow_credentials(self.allow_credentials)
            .max_age(Duration::from_secs(self.max_age_seconds))
    }
}

/// How a request takes part in CORS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorsRequestKind {
    /// No `Origin`, or a same-origin one
    NotCors,
    /// `OPTIONS` carrying `Origin` and `Access-Control-Request-Method`
    Preflight,
    /// Any other request carrying a foreign `Origin`
    Actual,
}

impl CorsRequestKind {
    pub fn of(method: &Method, headers: &HeaderMap) -> Self {
        let origin = match headers.get(ORIGIN).and_then(|v| v.to_str().ok()) {
            Some(origin) => origin,
            None => return Self::NotCors,
        };

        if is_same_origin(origin, headers) {
            return Self::NotCors;
        }

        if *method == Method::OPTIONS && headers.contains_key(ACCESS_CONTROL_REQUEST_METHOD) {
            Self::Preflight
        } else {
            Self::Actual
        }
    }
}

/// Whether `origin` names the same authority the request was sent to
fn is_same_origin(origin: &str, headers: &HeaderMap) -> bool {
    let Some(host) = headers.get(HOST).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Ok(url) = Url::parse(origin) else {
        return false;
    };
    let Some(origin_host) = url.host_str() else {
        return false;
    };

    let authority = match url.port() {
        Some(port) => format!("{}:{}", origin_host, port),
        None => origin_host.to_string(),
    };
    authority.eq_ignore_ascii_case(host)
}

/// Router-wide CORS middleware state, see [`apply_cors`]
#[derive(Clone)]
pub struct CorsMiddleware {
    layer: CorsLayer,
}

impl CorsMiddleware {
    /// Run tower-http's CORS logic for a request with these parts against an
    /// empty inner service, returning the response it produces.
    async fn evaluate(&self, method: Method, uri: Uri, headers: HeaderMap) -> Response {
        let mut request = Request::new(Body::empty());
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;

        let service = self.layer.layer(service_fn(|_: Request| async {
            Ok::<_, Infallible>(Response::new(Body::empty()))
        }));

        match service.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

/// Middleware entry point, mounted with `axum::middleware::from_fn_with_state`
pub async fn apply_cors(State(cors): State<CorsMiddleware>, req: Request, next: Next) -> Response {
    let kind = CorsRequestKind::of(req.method(), req.headers());
    if kind == CorsRequestKind::NotCors {
        return next.run(req).await;
    }

    let uri = req.uri().clone();
    let headers = req.headers().clone();

    if kind == CorsRequestKind::Preflight {
        return cors.evaluate(Method::OPTIONS, uri, headers).await;
    }

    // tower-http treats every OPTIONS as a preflight, so actual requests
    // are evaluated as GET.
    let decorated = cors.evaluate(Method::GET, uri, headers).await;

    let mut response = next.run(req).await;
    merge_cors_headers(response.headers_mut(), decorated.headers());
    response
}

fn merge_cors_headers(target: &mut HeaderMap, source: &HeaderMap) {
    for (name, value) in source {
        if *name == VARY {
            target.append(name.clone(), value.clone());
        } else {
            target.insert(name.clone(), value.clone());
        }
    }
}

/// Build the middleware for a policy, logging it and any hazards once.
///
/// The returned state is meant to wrap the entire router through
/// [`apply_cors`].
pub fn build_cors_middleware(policy: &CorsPolicy) -> CorsMiddleware {
    let origins: Vec<&str> = policy
        .allowed_origin_patterns
        .iter()
        .map(OriginPattern::as_str)
        .collect();

    tracing::info!(
        path = policy.path_pattern,
        origins = ?origins,
        methods = ?policy.allowed_methods,
        headers = ?policy.allowed_headers,
        credentials = policy.allow_credentials,
        max_age_seconds = policy.max_age_seconds,
        "CORS policy registered"
    );

    for warning in policy.warnings() {
        tracing::warn!(path = policy.path_pattern, "CORS configuration: {}", warning);
    }

    CorsMiddleware {
        layer: policy.layer(),
    }
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == WILDCARD)
}

/// Validate and de-duplicate a list, collapsing it to `*` if the wildcard appears
fn normalize_list<F>(values: &[String], normalize: F) -> AppResult<Vec<String>>
where
    F: Fn(&str) -> AppResult<String>,
{
    if is_wildcard(values) {
        return Ok(vec![WILDCARD.to_string()]);
    }

    let mut out: Vec<String> = Vec::new();
    for value in values {
        let normalized = normalize(value.trim())?;
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    Ok(out)
}
