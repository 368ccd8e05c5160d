use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use wayfare_core::forms::ContactForm;

use crate::error::ApiResult;
use crate::session::session_user;
use crate::ApiState;

/// Open to everyone; a signed-in sender is linked to the inquiry.
pub async fn submit(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<ContactForm>, JsonRejection>,
) -> ApiResult<Response> {
    let sender = session_user(&state, &headers).await?;
    let Json(form) = payload?;
    let inquiry = state.desk.submit_inquiry(sender.as_ref(), form).await?;
    let message = if inquiry.requires_human_review {
        "Thank you for your message! Our team will get back to you soon."
    } else {
        "Thank you for your message! We have emailed you an answer right away."
    };
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "inquiry_id": inquiry.inquiry_id,
            "status": inquiry.status,
            "category": inquiry.category,
            "requires_human_review": inquiry.requires_human_review,
            "auto_reply": inquiry.bot_reply,
            "message": message,
        })),
    )
        .into_response())
}
