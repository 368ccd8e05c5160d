use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use wayfare_core::forms::{BookingForm, BookingUpdateForm, CancelForm};

use crate::error::{ApiError, ApiResult};
use crate::session::require_user;
use crate::ApiState;

pub async fn list(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Response> {
    let user = require_user(&state, &headers).await?;
    let bookings = state.desk.list_user_bookings(&user.user_id).await?;
    Ok((StatusCode::OK, Json(json!({ "bookings": bookings }))).into_response())
}

pub async fn create(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<BookingForm>, JsonRejection>,
) -> ApiResult<Response> {
    let user = require_user(&state, &headers).await?;
    let Json(form) = payload?;
    let booking = state.desk.create_booking(&user, form).await?;
    Ok((StatusCode::CREATED, Json(json!({ "booking": booking }))).into_response())
}

pub async fn detail(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> ApiResult<Response> {
    let user = require_user(&state, &headers).await?;
    let detail = state.desk.booking_detail(&user, &booking_id).await?;
    Ok((StatusCode::OK, Json(detail)).into_response())
}

pub async fn update(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
    payload: Result<Json<BookingUpdateForm>, JsonRejection>,
) -> ApiResult<Response> {
    let user = require_user(&state, &headers).await?;
    let Json(form) = payload?;
    let booking = state.desk.update_booking(&user, &booking_id, form).await?;
    Ok((StatusCode::OK, Json(json!({ "booking": booking }))).into_response())
}

/// The body is optional; `{"reason": "..."}` records why.
pub async fn cancel(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let user = require_user(&state, &headers).await?;
    let form = parse_optional_body::<CancelForm>(&body)?;
    let booking = state.desk.cancel_booking(&user, &booking_id, form).await?;
    Ok((StatusCode::OK, Json(json!({ "booking": booking }))).into_response())
}

pub(crate) fn parse_optional_body<T>(body: &[u8]) -> ApiResult<T>
where
    T: Default + serde::de::DeserializeOwned,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| ApiError::BadRequest(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cancel_body_means_no_reason() {
        let form: CancelForm = parse_optional_body(b"").expect("empty");
        assert!(form.reason.is_none());
        let form: CancelForm =
            parse_optional_body(br#"{"reason":"Flight moved"}"#).expect("reason");
        assert_eq!(form.reason.as_deref(), Some("Flight moved"));
        assert!(parse_optional_body::<CancelForm>(b"{").is_err());
    }
}
