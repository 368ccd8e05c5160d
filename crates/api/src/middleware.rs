use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{self, HeaderName};
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::debug;
use url::Url;

use crate::session::read_cookie_value;
use crate::ApiState;

const FALLBACK_ORIGIN: &str = "http://localhost:3000";
const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(600);

/// Sent on every response.
const SECURITY_HEADERS: [(HeaderName, &str); 4] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (
        header::CONTENT_SECURITY_POLICY,
        "default-src 'none'; frame-ancestors 'none'; base-uri 'none'",
    ),
];

/// Responses under these prefixes carry account or booking data and must
/// never be cached by a shared proxy.
const PRIVATE_PREFIXES: [&str; 4] = ["/v1/auth/", "/v1/admin/", "/v1/bookings", "/v1/payments/"];

/// Why a request was turned away before reaching a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refusal {
    TooManyCredentialAttempts { retry_after: Duration },
    TooManyRequests { retry_after: Duration },
    OriginRequired,
    OriginNotAllowed,
}

impl IntoResponse for Refusal {
    fn into_response(self) -> Response {
        let (status, code, message, retry_after) = match self {
            Refusal::TooManyCredentialAttempts { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "auth_rate_limited",
                "Too many sign-in or password attempts from this address. Please wait before trying again.",
                Some(retry_after),
            ),
            Refusal::TooManyRequests { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests from this address. Please slow down.",
                Some(retry_after),
            ),
            Refusal::OriginRequired => (
                StatusCode::FORBIDDEN,
                "origin_required",
                "Signed-in changes to bookings and accounts must send an Origin header.",
                None,
            ),
            Refusal::OriginNotAllowed => (
                StatusCode::FORBIDDEN,
                "origin_not_allowed",
                "This site is not allowed to change Wayfare bookings or accounts.",
                None,
            ),
        };
        let mut response =
            (status, Json(serde_json::json!({ "error": code, "message": message }))).into_response();
        if let Some(retry_after) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after.as_secs().max(1)));
        }
        response
    }
}

/// Which limiter a path is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LimitClass {
    /// Health checks and gateway callbacks, which retry on their own schedule.
    Exempt,
    /// Endpoints that take a password or a reset token; these also count
    /// against the standard limit.
    Credentials,
    Standard,
}

fn limit_class(path: &str) -> LimitClass {
    match path {
        "/health" | "/v1/payments/webhook" => LimitClass::Exempt,
        "/v1/auth/login"
        | "/v1/auth/register"
        | "/v1/auth/password"
        | "/v1/auth/password/forgot"
        | "/v1/auth/password/reset" => LimitClass::Credentials,
        _ => LimitClass::Standard,
    }
}

/// Allows the configured front-end origins to call the API with the session
/// cookie attached.
pub fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    if origins.is_empty() {
        origins.push(HeaderValue::from_static(FALLBACK_ORIGIN));
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([HeaderName::from_static("x-request-id")])
        .allow_credentials(true)
        .max_age(PREFLIGHT_MAX_AGE)
}

pub async fn request_metrics_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    state.metrics.inc_request();
    let response = next.run(request).await;
    state.metrics.observe_latency(started.elapsed());
    response
}

pub async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }
    let path = request.uri().path();
    let class = limit_class(path);
    if class == LimitClass::Exempt {
        return next.run(request).await;
    }

    let ip = request_ip(request.headers());
    let retry_after = state.config.rate_limit_window;
    if class == LimitClass::Credentials && !state.auth_limiter.allow(&format!("{path}|{ip}")) {
        debug!(%ip, %path, "credential attempts throttled");
        return Refusal::TooManyCredentialAttempts { retry_after }.into_response();
    }
    if !state.limiter.allow(&ip) {
        debug!(%ip, "client throttled");
        return Refusal::TooManyRequests { retry_after }.into_response();
    }

    next.run(request).await
}

/// Cookie-authenticated state changes must come from an allowed origin.
pub async fn csrf_origin_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let safe_method = [Method::GET, Method::HEAD, Method::OPTIONS].contains(request.method());
    if safe_method || read_cookie_value(request.headers(), &state.config.cookie_name).is_none() {
        return next.run(request).await;
    }

    match request_origin(request.headers()) {
        None => Refusal::OriginRequired.into_response(),
        Some(origin) if !state.allowed_origins.contains(&origin) => {
            Refusal::OriginNotAllowed.into_response()
        }
        Some(_) => next.run(request).await,
    }
}

/// Behind a TLS-terminating proxy: plain-HTTP requests are sent to https.
pub async fn https_redirect_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let forwarded_http = state.config.force_https
        && request
            .headers()
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("http"));
    if !forwarded_http {
        return next.run(request).await;
    }

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let target = request
        .uri()
        .path_and_query()
        .map_or("/", |value| value.as_str());
    match HeaderValue::from_str(&format!("https://{host}{target}")) {
        Ok(location) => (StatusCode::PERMANENT_REDIRECT, [(header::LOCATION, location)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// `Origin`, or the scheme and host of `Referer` when a client omits it.
fn request_origin(headers: &HeaderMap) -> Option<String> {
    let direct = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty());
    if direct.is_some() {
        return direct;
    }

    let referer = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Url::parse(value).ok())?;
    match referer.origin() {
        origin @ url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
        url::Origin::Opaque(_) => None,
    }
}

/// First hop of `x-forwarded-for`; requests without one share a bucket.
fn request_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("local")
        .to_string()
}

pub async fn security_headers_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let private = PRIVATE_PREFIXES
        .iter()
        .any(|prefix| request.uri().path().starts_with(prefix));
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    if private {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }
    if state.config.force_https {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }
    response
}
