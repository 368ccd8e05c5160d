use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
use wayfare_core::BookingError;
use wayfare_desk::DeskError;

use crate::payments::WebhookRejection;

/// Every handler failure goes out as `{"error": <code>, "message": ...}`.
#[derive(Debug)]
pub enum ApiError {
    Desk(DeskError),
    NotAuthenticated,
    BadRequest(String),
    Unavailable(&'static str),
    Gateway(String),
    WebhookRejected(WebhookRejection),
}

impl From<DeskError> for ApiError {
    fn from(err: DeskError) -> Self {
        Self::Desk(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

fn booking_status(err: &BookingError) -> StatusCode {
    match err {
        BookingError::DateNotInFuture
        | BookingError::OutsideWindow { .. }
        | BookingError::ParticipantsOutOfRange { .. }
        | BookingError::TotalOverflow => StatusCode::BAD_REQUEST,
        BookingError::ReferenceExhausted => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::CONFLICT,
    }
}

fn booking_code(err: &BookingError) -> &'static str {
    match err {
        BookingError::TourInactive => "tour_unavailable",
        BookingError::DateNotInFuture | BookingError::OutsideWindow { .. } => "invalid_travel_date",
        BookingError::ParticipantsOutOfRange { .. } => "invalid_participants",
        BookingError::InsufficientCapacity { .. } => "insufficient_capacity",
        BookingError::TotalOverflow => "invalid_total",
        BookingError::InvalidTransition { .. } => "invalid_transition",
        BookingError::CancellationWindowClosed => "cancellation_window_closed",
        BookingError::ModificationWindowClosed => "modification_window_closed",
        BookingError::TourNotFinished => "tour_not_finished",
        BookingError::AlreadyPaid => "already_paid",
        BookingError::PaymentMismatch { .. } => "payment_mismatch",
        BookingError::ReferenceExhausted => "reference_unavailable",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Desk(DeskError::Validation(errors)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "validation_failed",
                    "message": "Please correct the highlighted fields.",
                    "fields": errors.fields,
                }),
            ),
            ApiError::Desk(DeskError::Booking(err)) => (
                booking_status(&err),
                json!({ "error": booking_code(&err), "message": err.to_string() }),
            ),
            ApiError::Desk(DeskError::Review(err)) => (
                StatusCode::CONFLICT,
                json!({ "error": "review_refused", "message": err.to_string() }),
            ),
            ApiError::Desk(DeskError::NotFound(what)) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "not_found", "message": format!("{what} not found") }),
            ),
            ApiError::Desk(DeskError::Unauthorized(message)) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "invalid_credentials", "message": message }),
            ),
            ApiError::Desk(DeskError::Forbidden(message)) => (
                StatusCode::FORBIDDEN,
                json!({ "error": "forbidden", "message": message }),
            ),
            ApiError::Desk(DeskError::Conflict(message)) => (
                StatusCode::CONFLICT,
                json!({ "error": "conflict", "message": message }),
            ),
            ApiError::Desk(DeskError::BadRequest(message)) | ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "bad_request", "message": message }),
            ),
            ApiError::Desk(DeskError::Internal(err)) => {
                error!(error = ?err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal_error", "message": "something went wrong" }),
                )
            }
            ApiError::NotAuthenticated => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "not_authenticated", "message": "sign in first" }),
            ),
            ApiError::Unavailable(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "unavailable", "message": format!("{what} is not configured") }),
            ),
            ApiError::Gateway(message) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": "payment_gateway_failed", "message": message }),
            ),
            ApiError::WebhookRejected(reason) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "webhook_rejected", "message": reason.to_string() }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
