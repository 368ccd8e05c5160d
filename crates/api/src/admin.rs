use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use wayfare_core::forms::{
    AdminResponseForm, BulkInquiryForm, BulkProcessForm, CategoryForm, InquiryAssignForm,
    ItineraryDayForm, TourForm,
};
use wayfare_core::BookingStatus;

use crate::bookings::parse_optional_body;
use crate::error::{ApiError, ApiResult};
use crate::session::require_admin;
use crate::ApiState;

const DEFAULT_POPULAR_TOURS: usize = 10;
const MAX_POPULAR_TOURS: usize = 50;

#[derive(Debug, Deserialize)]
pub struct CategoryUpdateRequest {
    #[serde(flatten)]
    form: CategoryForm,
    is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusChangeRequest {
    #[serde(default)]
    status: String,
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PendingQuery {
    #[serde(default)]
    pending: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

fn ok(body: serde_json::Value) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

fn parse_status(value: &str) -> ApiResult<BookingStatus> {
    BookingStatus::parse(value)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown booking status '{value}'")))
}

pub async fn dashboard(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let dashboard = state.desk.dashboard().await?;
    Ok((StatusCode::OK, Json(dashboard)).into_response())
}

pub async fn list_tours(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let tours = state.desk.list_all_tours().await?;
    Ok(ok(json!({ "tours": tours })))
}

pub async fn create_tour(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<TourForm>, JsonRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Json(form) = payload?;
    let tour = state.desk.create_tour(form).await?;
    Ok((StatusCode::CREATED, Json(json!({ "tour": tour }))).into_response())
}

pub async fn update_tour(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(tour_id): Path<String>,
    payload: Result<Json<TourForm>, JsonRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Json(form) = payload?;
    let tour = state.desk.update_tour(&tour_id, form).await?;
    Ok(ok(json!({ "tour": tour })))
}

pub async fn delete_tour(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(tour_id): Path<String>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    state.desk.delete_tour(&tour_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_categories(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let categories = state.desk.list_categories(false).await?;
    Ok(ok(json!({ "categories": categories })))
}

pub async fn create_category(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<CategoryForm>, JsonRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Json(form) = payload?;
    let category = state.desk.create_category(form).await?;
    Ok((StatusCode::CREATED, Json(json!({ "category": category }))).into_response())
}

pub async fn update_category(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(category_id): Path<String>,
    payload: Result<Json<CategoryUpdateRequest>, JsonRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Json(request) = payload?;
    let category = state
        .desk
        .update_category(&category_id, request.form, request.is_active)
        .await?;
    Ok(ok(json!({ "category": category })))
}

pub async fn delete_category(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(category_id): Path<String>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    state.desk.delete_category(&category_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_users(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let users = state.desk.list_users().await?;
    Ok(ok(json!({ "users": users })))
}

pub async fn set_role(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    payload: Result<Json<RoleRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let actor = require_admin(&state, &headers).await?;
    let Json(request) = payload?;
    let user = state.desk.set_admin(&actor, &user_id, request.admin).await?;
    Ok(ok(json!({ "user": user })))
}

pub async fn set_active(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    payload: Result<Json<ActiveRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let actor = require_admin(&state, &headers).await?;
    let Json(request) = payload?;
    let user = state.desk.set_active(&actor, &user_id, request.active).await?;
    Ok(ok(json!({ "user": user })))
}

pub async fn delete_user(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> ApiResult<Response> {
    let actor = require_admin(&state, &headers).await?;
    state.desk.delete_user(&actor, &user_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_bookings(
    State(state): State<ApiState>,
    headers: HeaderMap,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Query(query) = query?;
    let status = query
        .status
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(parse_status)
        .transpose()?;
    let bookings = state.desk.list_bookings(status).await?;
    Ok(ok(json!({ "bookings": bookings })))
}

pub async fn booking_detail(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> ApiResult<Response> {
    let actor = require_admin(&state, &headers).await?;
    let detail = state.desk.booking_detail(&actor, &booking_id).await?;
    Ok((StatusCode::OK, Json(detail)).into_response())
}

pub async fn set_booking_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
    payload: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let actor = require_admin(&state, &headers).await?;
    let Json(request) = payload?;
    let status = parse_status(&request.status)?;
    let booking = state
        .desk
        .set_booking_status(&actor, &booking_id, status, request.reason)
        .await?;
    Ok(ok(json!({ "booking": booking })))
}

pub async fn complete_due_bookings(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let completed = state.desk.complete_due_bookings().await?;
    Ok(ok(json!({ "completed": completed })))
}

pub async fn list_reviews(
    State(state): State<ApiState>,
    headers: HeaderMap,
    query: Result<Query<PendingQuery>, QueryRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Query(query) = query?;
    let reviews = state.desk.list_reviews(query.pending).await?;
    Ok(ok(json!({ "reviews": reviews })))
}

pub async fn approve_review(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(review_id): Path<String>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let review = state.desk.approve_review(&review_id).await?;
    Ok(ok(json!({ "review": review })))
}

pub async fn delete_review(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(review_id): Path<String>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    state.desk.delete_review(&review_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_inquiries(
    State(state): State<ApiState>,
    headers: HeaderMap,
    query: Result<Query<PendingQuery>, QueryRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Query(query) = query?;
    let inquiries = state.desk.list_inquiries(query.pending).await?;
    Ok(ok(json!({ "inquiries": inquiries })))
}

pub async fn get_inquiry(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(inquiry_id): Path<String>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let inquiry = state.desk.get_inquiry(&inquiry_id).await?;
    let analysis = state.desk.classify(&inquiry.subject, &inquiry.message);
    Ok(ok(json!({ "inquiry": inquiry, "analysis": analysis })))
}

pub async fn respond_to_inquiry(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(inquiry_id): Path<String>,
    payload: Result<Json<AdminResponseForm>, JsonRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Json(form) = payload?;
    let inquiry = state.desk.respond_to_inquiry(&inquiry_id, form).await?;
    Ok(ok(json!({ "inquiry": inquiry })))
}

pub async fn reprocess_inquiry(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(inquiry_id): Path<String>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let inquiry = state.desk.reprocess_inquiry(&inquiry_id).await?;
    Ok(ok(json!({ "inquiry": inquiry })))
}

pub async fn delete_inquiry(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(inquiry_id): Path<String>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    state.desk.delete_inquiry(&inquiry_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn statistics(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let statistics = state.desk.booking_statistics().await?;
    Ok((StatusCode::OK, Json(statistics)).into_response())
}

pub async fn popular_tours(
    State(state): State<ApiState>,
    headers: HeaderMap,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Query(query) = query?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_POPULAR_TOURS)
        .clamp(1, MAX_POPULAR_TOURS);
    let tours = state.desk.popular_tours(limit).await?;
    Ok(ok(json!({ "tours": tours })))
}

pub async fn bookings_csv(
    State(state): State<ApiState>,
    headers: HeaderMap,
    query: Result<Query<DateRangeQuery>, QueryRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Query(range) = query?;
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if from > to {
            return Err(ApiError::BadRequest(
                "'from' must not be after 'to'".to_string(),
            ));
        }
    }
    let csv = state.desk.bookings_csv(range.from, range.to).await?;
    let mut response = (StatusCode::OK, csv).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"bookings.csv\""),
    );
    Ok(response)
}

/// Admin cancellations may carry an empty body.
pub async fn cancel_booking(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let actor = require_admin(&state, &headers).await?;
    let request = parse_optional_body::<StatusChangeRequest>(&body)?;
    let booking = state
        .desk
        .set_booking_status(&actor, &booking_id, BookingStatus::Cancelled, request.reason)
        .await?;
    Ok(ok(json!({ "booking": booking })))
}

pub async fn set_itinerary_day(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tour_id, day_number)): Path<(String, u32)>,
    payload: Result<Json<ItineraryDayForm>, JsonRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Json(form) = payload?;
    let day = state
        .desk
        .set_itinerary_day(&tour_id, day_number, form)
        .await?;
    Ok(ok(json!({ "day": day })))
}

pub async fn delete_itinerary_day(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tour_id, day_number)): Path<(String, u32)>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    state.desk.remove_itinerary_day(&tour_id, day_number).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn assign_inquiry(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(inquiry_id): Path<String>,
    payload: Result<Json<InquiryAssignForm>, JsonRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Json(form) = payload?;
    let inquiry = state.desk.assign_inquiry(&inquiry_id, form).await?;
    Ok(ok(json!({ "inquiry": inquiry })))
}

pub async fn bulk_inquiries(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<BulkInquiryForm>, JsonRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Json(form) = payload?;
    let outcome = state.desk.bulk_update_inquiries(form).await?;
    Ok(ok(json!({ "outcome": outcome })))
}

pub async fn bulk_process_inquiries(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<BulkProcessForm>, JsonRejection>,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let Json(form) = payload?;
    let summary = state.desk.bulk_process_inquiries(form).await?;
    Ok(ok(json!({ "summary": summary })))
}

pub async fn inquiry_stats(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    require_admin(&state, &headers).await?;
    let stats = state.desk.inquiry_stats().await?;
    Ok(ok(json!({ "stats": stats })))
}
