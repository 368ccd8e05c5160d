use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use wayfare_core::forms::ReplyTemplateForm;

use crate::error::{ApiError, ApiResult};
use crate::session::require_admin;
use crate::ApiState;

const MAX_PREVIEW_MESSAGE: usize = 1_000;

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default = "default_preview_name")]
    name: String,
    #[serde(default)]
    subject: String,
    message: String,
}

fn default_preview_name() -> String {
    "Customer".to_string()
}

pub async fn list(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let templates = state.desk.list_reply_templates().await?;
    Ok((StatusCode::OK, Json(json!({ "templates": templates }))).into_response())
}

pub async fn create(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<ReplyTemplateForm>, JsonRejection>,
) -> ApiResult<Response> {
    let admin = require_admin(&state, &headers).await?;
    let Json(form) = payload?;
    let template = state.desk.create_reply_template(&admin, form).await?;
    Ok((StatusCode::CREATED, Json(json!({ "template": template }))).into_response())
}

pub async fn detail(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(template_id): Path<String>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let template = state.desk.get_reply_template(&template_id).await?;
    Ok((StatusCode::OK, Json(json!({ "template": template }))).into_response())
}

pub async fn update(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(template_id): Path<String>,
    payload: Result<Json<ReplyTemplateForm>, JsonRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Json(form) = payload?;
    let template = state.desk.update_reply_template(&template_id, form).await?;
    Ok((StatusCode::OK, Json(json!({ "template": template }))).into_response())
}

pub async fn remove(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(template_id): Path<String>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    state.desk.delete_reply_template(&template_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn toggle(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(template_id): Path<String>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let template = state.desk.toggle_reply_template(&template_id).await?;
    Ok((StatusCode::OK, Json(json!({ "template": template }))).into_response())
}

pub async fn duplicate(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(template_id): Path<String>,
) -> ApiResult<Response> {
    let admin = require_admin(&state, &headers).await?;
    let template = state
        .desk
        .duplicate_reply_template(&admin, &template_id)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "template": template }))).into_response())
}

pub async fn analytics(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let analytics = state.desk.responder_analytics().await?;
    Ok((StatusCode::OK, Json(json!({ "analytics": analytics }))).into_response())
}

/// Shows what the responder would answer; nothing is stored or sent.
pub async fn preview(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<PreviewRequest>, JsonRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Json(request) = payload?;
    if request.message.trim().is_empty() || request.message.chars().count() > MAX_PREVIEW_MESSAGE {
        return Err(ApiError::BadRequest(format!(
            "message must be 1 to {MAX_PREVIEW_MESSAGE} characters"
        )));
    }
    let decision = state
        .desk
        .preview_reply(&request.name, &request.subject, &request.message)
        .await?;
    Ok((StatusCode::OK, Json(json!({ "decision": decision }))).into_response())
}
