use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use wayfare_core::forms::ReviewForm;
use wayfare_core::TourSearchParams;

use wayfare_desk::DeskError;

use crate::error::ApiResult;
use crate::session::require_user;
use crate::ApiState;

pub async fn categories(State(state): State<ApiState>) -> ApiResult<Response> {
    let categories = state.desk.list_categories(true).await?;
    Ok((StatusCode::OK, Json(json!({ "categories": categories }))).into_response())
}

/// Public listing: `search`, `category`, `min_price`, `max_price`, `page`.
pub async fn search(
    State(state): State<ApiState>,
    query: Result<Query<TourSearchParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = query?;
    let page = state.desk.search_tours(&params).await?;
    let has_next = page.has_next();
    Ok((
        StatusCode::OK,
        Json(json!({
            "tours": page.items,
            "page": page.page,
            "per_page": page.per_page,
            "total": page.total,
            "pages": page.pages,
            "has_next": has_next,
        })),
    )
        .into_response())
}

pub async fn featured(State(state): State<ApiState>) -> ApiResult<Response> {
    let tours = state.desk.featured_tours().await?;
    Ok((StatusCode::OK, Json(json!({ "tours": tours }))).into_response())
}

pub async fn detail(
    State(state): State<ApiState>,
    Path(tour_id): Path<String>,
) -> ApiResult<Response> {
    let detail = state.desk.tour_detail(&tour_id).await?;
    Ok((StatusCode::OK, Json(detail)).into_response())
}

/// Day-by-day plan of an active tour.
pub async fn itinerary(
    State(state): State<ApiState>,
    Path(tour_id): Path<String>,
) -> ApiResult<Response> {
    let tour = state.desk.get_tour(&tour_id).await?;
    if !tour.is_active {
        return Err(DeskError::NotFound("tour").into());
    }
    let days = state.desk.list_itinerary(&tour_id).await?;
    Ok((StatusCode::OK, Json(json!({ "tour_id": tour_id, "days": days }))).into_response())
}

pub async fn submit_review(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(tour_id): Path<String>,
    payload: Result<Json<ReviewForm>, JsonRejection>,
) -> ApiResult<Response> {
    let user = require_user(&state, &headers).await?;
    let Json(form) = payload?;
    let review = state.desk.submit_review(&user, &tour_id, form).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "review": review,
            "message": "Thank you! Your review will appear once it has been approved.",
        })),
    )
        .into_response())
}
