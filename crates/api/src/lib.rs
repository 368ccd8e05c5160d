mod admin;
mod auth;
mod bookings;
mod catalog;
pub mod config;
mod contact;
pub mod error;
mod middleware;
pub mod payments;
mod rate_limit;
mod session;
mod templates;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware as axum_middleware;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use reqwest::Client;
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use wayfare_core::AutoResponder;
use wayfare_desk::{DeskSettings, Mailer, TravelDesk};
use wayfare_observability::{AppMetrics, MetricsSnapshot};
use wayfare_storage::Store;

pub use crate::config::{AppConfig, GatewayConfig};
use crate::middleware::{
    build_cors_layer, csrf_origin_middleware, https_redirect_middleware, rate_limit_middleware,
    request_metrics_middleware, security_headers_middleware,
};
use crate::rate_limit::IpRateLimiter;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub desk: Arc<TravelDesk<Store>>,
    pub metrics: Arc<AppMetrics>,
    pub config: Arc<AppConfig>,
    pub limiter: IpRateLimiter,
    pub auth_limiter: IpRateLimiter,
    pub http_client: Client,
    pub allowed_origins: Arc<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    store: &'static str,
    mailer: &'static str,
    metrics: MetricsSnapshot,
    capabilities: HealthCapabilities,
}

#[derive(Debug, Serialize)]
struct HealthCapabilities {
    card_payments: bool,
    payment_simulation: bool,
    auto_reply_threshold: f32,
}

/// Reads the environment, opens the store and returns the full router.
pub async fn build_app() -> Result<Router> {
    let state = build_state(AppConfig::from_env()).await?;
    Ok(build_router(state))
}

pub async fn build_state(config: AppConfig) -> Result<ApiState> {
    let metrics = AppMetrics::shared();
    let store = match config.database_url.as_deref() {
        Some(database_url) => Store::sqlite(database_url).await?,
        None => Store::memory(),
    };
    let mailer = match config.mail_relay_url.as_deref() {
        Some(url) => Mailer::relay(url)?,
        None => Mailer::Log,
    };
    build_state_with(config, store, mailer, metrics)
}

/// Wires a state around an already opened store and mail transport.
pub fn build_state_with(
    config: AppConfig,
    store: Store,
    mailer: Mailer,
    metrics: Arc<AppMetrics>,
) -> Result<ApiState> {
    let settings = DeskSettings {
        session_ttl: chrono::Duration::seconds(
            i64::try_from(config.session_ttl.as_secs()).unwrap_or(i64::MAX / 1000),
        ),
        mail_from: config.mail_from.clone(),
        admin_emails: config.admin_emails.clone(),
        payment_simulation: config.payment_simulation,
        public_url: config.public_url.clone(),
        password_reset_ttl: chrono::Duration::seconds(
            i64::try_from(config.password_reset_ttl.as_secs()).unwrap_or(3600),
        ),
    };
    info!(
        store = store.backend(),
        mailer = mailer.kind(),
        card_payments = config.gateway.is_some(),
        payment_simulation = config.payment_simulation,
        "wayfare desk configured"
    );
    let desk = TravelDesk::new(
        Arc::new(store),
        mailer,
        AutoResponder::new(config.auto_reply_threshold),
        metrics.clone(),
        settings,
    );

    Ok(ApiState {
        desk: Arc::new(desk),
        metrics,
        limiter: IpRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
        auth_limiter: IpRateLimiter::new(config.rate_limit_window, config.auth_rate_limit_max),
        http_client: Client::builder()
            .connect_timeout(Duration::from_secs(6))
            .timeout(Duration::from_secs(20))
            .build()
            .context("failed to build HTTP client")?,
        allowed_origins: Arc::new(config.allowed_origins.clone()),
        config: Arc::new(config),
    })
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/auth/register", post(auth::register))
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/logout", post(auth::logout))
        .route("/v1/auth/me", get(auth::me))
        .route("/v1/auth/profile", post(auth::update_profile))
        .route("/v1/auth/password", post(auth::change_password))
        .route("/v1/auth/password/forgot", post(auth::forgot_password))
        .route("/v1/auth/password/reset", post(auth::reset_password))
        .route("/v1/categories", get(catalog::categories))
        .route("/v1/tours", get(catalog::search))
        .route("/v1/tours/featured", get(catalog::featured))
        .route("/v1/tours/{tour_id}", get(catalog::detail))
        .route("/v1/tours/{tour_id}/itinerary", get(catalog::itinerary))
        .route("/v1/tours/{tour_id}/reviews", post(catalog::submit_review))
        .route(
            "/v1/bookings",
            get(bookings::list).post(bookings::create),
        )
        .route(
            "/v1/bookings/{booking_id}",
            get(bookings::detail).put(bookings::update),
        )
        .route("/v1/bookings/{booking_id}/cancel", post(bookings::cancel))
        .route("/v1/bookings/{booking_id}/checkout", post(payments::checkout))
        .route(
            "/v1/bookings/{booking_id}/pay/simulate",
            post(payments::simulate),
        )
        .route("/v1/payments/webhook", post(payments::webhook))
        .route("/v1/contact", post(contact::submit))
        .route("/v1/admin/dashboard", get(admin::dashboard))
        .route(
            "/v1/admin/tours",
            get(admin::list_tours).post(admin::create_tour),
        )
        .route(
            "/v1/admin/tours/{tour_id}",
            put(admin::update_tour).delete(admin::delete_tour),
        )
        .route(
            "/v1/admin/tours/{tour_id}/itinerary/{day}",
            put(admin::set_itinerary_day).delete(admin::delete_itinerary_day),
        )
        .route(
            "/v1/admin/categories",
            get(admin::list_categories).post(admin::create_category),
        )
        .route(
            "/v1/admin/categories/{category_id}",
            put(admin::update_category).delete(admin::delete_category),
        )
        .route("/v1/admin/users", get(admin::list_users))
        .route("/v1/admin/users/{user_id}", delete(admin::delete_user))
        .route("/v1/admin/users/{user_id}/role", post(admin::set_role))
        .route("/v1/admin/users/{user_id}/active", post(admin::set_active))
        .route("/v1/admin/bookings", get(admin::list_bookings))
        .route(
            "/v1/admin/bookings/complete-due",
            post(admin::complete_due_bookings),
        )
        .route("/v1/admin/bookings/{booking_id}", get(admin::booking_detail))
        .route(
            "/v1/admin/bookings/{booking_id}/cancel",
            post(admin::cancel_booking),
        )
        .route(
            "/v1/admin/bookings/{booking_id}/status",
            post(admin::set_booking_status),
        )
        .route("/v1/admin/reviews", get(admin::list_reviews))
        .route("/v1/admin/reviews/{review_id}", delete(admin::delete_review))
        .route(
            "/v1/admin/reviews/{review_id}/approve",
            post(admin::approve_review),
        )
        .route("/v1/admin/inquiries", get(admin::list_inquiries))
        .route("/v1/admin/inquiries/stats", get(admin::inquiry_stats))
        .route("/v1/admin/inquiries/bulk", post(admin::bulk_inquiries))
        .route(
            "/v1/admin/inquiries/bulk-process",
            post(admin::bulk_process_inquiries),
        )
        .route(
            "/v1/admin/inquiries/{inquiry_id}",
            get(admin::get_inquiry).delete(admin::delete_inquiry),
        )
        .route(
            "/v1/admin/inquiries/{inquiry_id}/respond",
            post(admin::respond_to_inquiry),
        )
        .route(
            "/v1/admin/inquiries/{inquiry_id}/reprocess",
            post(admin::reprocess_inquiry),
        )
        .route(
            "/v1/admin/inquiries/{inquiry_id}/assign",
            post(admin::assign_inquiry),
        )
        .route(
            "/v1/admin/reply-templates",
            get(templates::list).post(templates::create),
        )
        .route(
            "/v1/admin/reply-templates/{template_id}",
            get(templates::detail)
                .put(templates::update)
                .delete(templates::remove),
        )
        .route(
            "/v1/admin/reply-templates/{template_id}/toggle",
            post(templates::toggle),
        )
        .route(
            "/v1/admin/reply-templates/{template_id}/duplicate",
            post(templates::duplicate),
        )
        .route("/v1/admin/responder/analytics", get(templates::analytics))
        .route("/v1/admin/responder/preview", post(templates::preview))
        .route("/v1/admin/reports/statistics", get(admin::statistics))
        .route("/v1/admin/reports/popular-tours", get(admin::popular_tours))
        .route("/v1/admin/reports/bookings.csv", get(admin::bookings_csv))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            csrf_origin_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            https_redirect_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            request_metrics_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        store: state.desk.store().backend(),
        mailer: state.desk.mailer().kind(),
        metrics: state.metrics.snapshot(),
        capabilities: HealthCapabilities {
            card_payments: state.config.gateway.is_some(),
            payment_simulation: state.config.payment_simulation,
            auto_reply_threshold: state.desk.responder().threshold(),
        },
    };
    (StatusCode::OK, Json(payload))
}
