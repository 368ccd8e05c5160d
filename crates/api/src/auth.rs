use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use wayfare_core::forms::{
    ForgotPasswordForm, LoginForm, PasswordChangeForm, ProfileForm, RegistrationForm,
    ResetPasswordForm,
};
use wayfare_core::{Session, User};

use crate::error::ApiResult;
use crate::session::{
    attach_cookie, build_clear_cookie, build_session_cookie, read_cookie_value, require_user,
};
use crate::ApiState;

fn signed_in(state: &ApiState, status: StatusCode, user: User, session: &Session) -> Response {
    let mut response = (status, Json(json!({ "user": user }))).into_response();
    let cookie = build_session_cookie(
        &state.config.cookie_name,
        &session.session_id,
        state.config.session_ttl.as_secs(),
        state.config.force_https,
    );
    attach_cookie(&mut response, &cookie);
    response
}

/// Creates the account and signs it in straight away.
pub async fn register(
    State(state): State<ApiState>,
    payload: Result<Json<RegistrationForm>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(form) = payload?;
    let user = state.desk.register(form).await?;
    let session = state.desk.open_session(&user).await?;
    Ok(signed_in(&state, StatusCode::CREATED, user, &session))
}

pub async fn login(
    State(state): State<ApiState>,
    payload: Result<Json<LoginForm>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(form) = payload?;
    let (user, session) = state.desk.login(form).await?;
    Ok(signed_in(&state, StatusCode::OK, user, &session))
}

pub async fn logout(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Response> {
    if let Some(session_id) = read_cookie_value(&headers, &state.config.cookie_name) {
        state.desk.logout(&session_id).await?;
    }
    let mut response = (StatusCode::OK, Json(json!({ "ok": true }))).into_response();
    let cookie = build_clear_cookie(&state.config.cookie_name, state.config.force_https);
    attach_cookie(&mut response, &cookie);
    Ok(response)
}

pub async fn me(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Response> {
    let user = require_user(&state, &headers).await?;
    let bookings = state.desk.list_user_bookings(&user.user_id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "user": user,
            "is_admin": user.is_admin(),
            "booking_count": bookings.len(),
        })),
    )
        .into_response())
}

pub async fn update_profile(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<ProfileForm>, JsonRejection>,
) -> ApiResult<Response> {
    let user = require_user(&state, &headers).await?;
    let Json(form) = payload?;
    let user = state.desk.update_profile(&user.user_id, form).await?;
    Ok((StatusCode::OK, Json(json!({ "user": user }))).into_response())
}

pub async fn change_password(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<PasswordChangeForm>, JsonRejection>,
) -> ApiResult<Response> {
    let user = require_user(&state, &headers).await?;
    let Json(form) = payload?;
    state.desk.change_password(&user.user_id, form).await?;
    Ok((StatusCode::OK, Json(json!({ "ok": true }))).into_response())
}

/// Always 202 so the response does not reveal whether the address exists.
pub async fn forgot_password(
    State(state): State<ApiState>,
    payload: Result<Json<ForgotPasswordForm>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(form) = payload?;
    state.desk.request_password_reset(form).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "If that address belongs to an account, a reset link is on its way.",
        })),
    )
        .into_response())
}

pub async fn reset_password(
    State(state): State<ApiState>,
    payload: Result<Json<ResetPasswordForm>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(form) = payload?;
    state.desk.reset_password(form).await?;
    Ok((StatusCode::OK, Json(json!({ "ok": true }))).into_response())
}
