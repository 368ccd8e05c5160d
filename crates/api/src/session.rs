use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use tracing::warn;
use wayfare_core::User;
use wayfare_desk::DeskError;

use crate::error::{ApiError, ApiResult};
use crate::ApiState;

pub fn read_cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let raw_cookie = headers.get(header::COOKIE)?.to_str().ok()?;
    raw_cookie.split(';').find_map(|part| {
        let mut split = part.trim().splitn(2, '=');
        let key = split.next()?.trim();
        let value = split.next()?.trim();
        if key == cookie_name && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

pub fn build_session_cookie(
    cookie_name: &str,
    session_id: &str,
    max_age_seconds: u64,
    secure: bool,
) -> String {
    let mut segments = vec![
        format!("{cookie_name}={session_id}"),
        "Path=/".to_string(),
        "HttpOnly".to_string(),
        "SameSite=Lax".to_string(),
        format!("Max-Age={max_age_seconds}"),
    ];
    if secure {
        segments.push("Secure".to_string());
    }
    segments.join("; ")
}

pub fn build_clear_cookie(cookie_name: &str, secure: bool) -> String {
    let mut segments = vec![
        format!("{cookie_name}="),
        "Path=/".to_string(),
        "HttpOnly".to_string(),
        "SameSite=Lax".to_string(),
        "Max-Age=0".to_string(),
        "Expires=Thu, 01 Jan 1970 00:00:00 GMT".to_string(),
    ];
    if secure {
        segments.push("Secure".to_string());
    }
    segments.join("; ")
}

pub fn attach_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(_) => warn!("session cookie was not a valid header value"),
    }
}

/// The signed-in user, if the request carries a live session cookie.
pub async fn session_user(state: &ApiState, headers: &HeaderMap) -> ApiResult<Option<User>> {
    let Some(session_id) = read_cookie_value(headers, &state.config.cookie_name) else {
        return Ok(None);
    };
    Ok(state.desk.authenticate(&session_id).await?)
}

pub async fn require_user(state: &ApiState, headers: &HeaderMap) -> ApiResult<User> {
    session_user(state, headers)
        .await?
        .ok_or(ApiError::NotAuthenticated)
}

pub async fn require_admin(state: &ApiState, headers: &HeaderMap) -> ApiResult<User> {
    let user = require_user(state, headers).await?;
    if !user.is_admin() {
        return Err(DeskError::Forbidden("Administrator access required.".to_string()).into());
    }
    Ok(user)
}
