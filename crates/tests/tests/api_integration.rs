use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use wayfare_api::payments::sign_webhook_payload;
use wayfare_api::{build_router, build_state_with, ApiState, AppConfig, GatewayConfig};
use wayfare_core::forms::RegistrationForm;
use wayfare_desk::Mailer;
use wayfare_observability::AppMetrics;
use wayfare_storage::Store;

const ORIGIN: &str = "http://localhost:3000";
const WEBHOOK_SECRET: &str = "whsec_integration";

fn test_state(config: AppConfig) -> ApiState {
    build_state_with(config, Store::memory(), Mailer::outbox(), AppMetrics::shared())
        .expect("state should build")
}

fn test_app() -> (ApiState, Router) {
    let state = test_state(AppConfig::default());
    let app = build_router(state.clone());
    (state, app)
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("origin", ORIGIN);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, parsed)
}

fn registration(username: &str) -> Value {
    json!({
        "first_name": "Rowan",
        "last_name": "Hale",
        "username": username,
        "email": format!("{username}@example.com"),
        "password": "correct horse",
        "password_confirm": "correct horse",
        "terms_accepted": true
    })
}

/// Registers through the API and returns the `name=value` session cookie.
async fn register(app: &Router, username: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/v1/auth/register", None, registration(username)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    session_cookie(&response)
}

fn session_cookie(response: &axum::response::Response) -> String {
    response
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .expect("set-cookie header should be present")
        .split(';')
        .next()
        .expect("cookie pair should be present")
        .to_string()
}

async fn admin_session(state: &ApiState, app: &Router) -> String {
    state
        .desk
        .ensure_admin(RegistrationForm {
            first_name: "Site".to_string(),
            last_name: "Admin".to_string(),
            username: "siteadmin".to_string(),
            email: "siteadmin@example.com".to_string(),
            phone: None,
            password: "correct horse".to_string(),
            password_confirm: "correct horse".to_string(),
            terms_accepted: true,
        })
        .await
        .expect("admin should be created");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/auth/login",
            None,
            json!({ "username_or_email": "siteadmin", "password": "correct horse" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response)
}

/// Creates a category and a bookable tour as an administrator; returns the tour id.
async fn publish_tour(app: &Router, admin: &str, max_participants: u32) -> String {
    let (status, category) = send(
        app,
        json_request(
            "POST",
            "/v1/admin/categories",
            Some(admin),
            json!({ "name": "Mountains", "description": "High places" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{category}");
    let category_id = category["category"]["category_id"].as_str().unwrap().to_string();

    let today = Utc::now().date_naive();
    let (status, tour) = send(
        app,
        json_request(
            "POST",
            "/v1/admin/tours",
            Some(admin),
            json!({
                "category_id": category_id,
                "title": "Atlas Mountains Trek",
                "description": "Four days across the High Atlas",
                "destination": "Morocco",
                "price_cents": 25000,
                "duration_days": 4,
                "max_participants": max_participants,
                "available_from": today.to_string(),
                "available_to": (today + Duration::days(365)).to_string(),
                "difficulty": "hard",
                "featured": true
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{tour}");
    tour["tour"]["tour_id"].as_str().unwrap().to_string()
}

fn booking_body(tour_id: &str, participants: u32) -> Value {
    json!({
        "tour_id": tour_id,
        "participants": participants,
        "travel_date": (Utc::now().date_naive() + Duration::days(30)).to_string(),
        "terms_accepted": true
    })
}

#[tokio::test]
async fn health_is_public() {
    let (_, app) = test_app();

    let (status, body) = send(&app, get_request("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["capabilities"]["payment_simulation"], true);
}

#[tokio::test]
async fn registration_signs_the_user_in() {
    let (_, app) = test_app();
    let cookie = register(&app, "rowanhale").await;

    let (status, body) = send(&app, get_request("/v1/auth/me", Some(&cookie))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "rowanhale");
    assert_eq!(body["is_admin"], false);
    assert_eq!(body["booking_count"], 0);
}

#[tokio::test]
async fn invalid_registration_reports_fields() {
    let (_, app) = test_app();
    let mut body = registration("rh");
    body["password_confirm"] = json!("something else");

    let (status, body) = send(&app, json_request("POST", "/v1/auth/register", None, body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_failed");
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|field| field["field"].as_str())
        .collect();
    assert!(fields.contains(&"username"));
    assert!(fields.contains(&"password_confirm"));
}

#[tokio::test]
async fn booking_requires_a_session() {
    let (_, app) = test_app();

    let (status, _) = send(&app, get_request("/v1/bookings", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_refuse_travellers() {
    let (_, app) = test_app();
    let cookie = register(&app, "traveller1").await;

    let (status, body) = send(&app, get_request("/v1/admin/dashboard", Some(&cookie))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn cookie_writes_need_an_allowed_origin() {
    let (_, app) = test_app();
    let cookie = register(&app, "traveller2").await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/logout")
        .header("cookie", cookie.clone())
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "origin_required");

    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/logout")
        .header("cookie", cookie)
        .header("origin", "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "origin_not_allowed");
}

#[tokio::test]
async fn booking_is_paid_once_through_simulation() {
    let (state, app) = test_app();
    let admin = admin_session(&state, &app).await;
    let tour_id = publish_tour(&app, &admin, 12).await;
    let traveller = register(&app, "traveller3").await;

    let (status, created) = send(
        &app,
        json_request("POST", "/v1/bookings", Some(&traveller), booking_body(&tour_id, 2)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["booking"]["status"], "pending");
    assert_eq!(created["booking"]["total_cents"], 50_000);
    let booking_id = created["booking"]["booking_id"].as_str().unwrap().to_string();

    let uri = format!("/v1/bookings/{booking_id}/pay/simulate");
    let (status, paid) = send(&app, json_request("POST", &uri, Some(&traveller), json!({}))).await;
    assert_eq!(status, StatusCode::OK, "{paid}");
    assert_eq!(paid["booking"]["status"], "confirmed");

    let (status, again) = send(&app, json_request("POST", &uri, Some(&traveller), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["error"], "already_paid");

    let (status, detail) = send(
        &app,
        get_request(&format!("/v1/bookings/{booking_id}"), Some(&traveller)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["payments"].as_array().unwrap().len(), 1);
    assert_eq!(detail["outstanding_cents"], 0);
}

#[tokio::test]
async fn other_travellers_cannot_see_a_booking() {
    let (state, app) = test_app();
    let admin = admin_session(&state, &app).await;
    let tour_id = publish_tour(&app, &admin, 12).await;
    let owner = register(&app, "traveller4").await;
    let stranger = register(&app, "traveller5").await;

    let (_, created) = send(
        &app,
        json_request("POST", "/v1/bookings", Some(&owner), booking_body(&tour_id, 1)),
    )
    .await;
    let booking_id = created["booking"]["booking_id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        get_request(&format!("/v1/bookings/{booking_id}"), Some(&stranger)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        get_request(&format!("/v1/admin/bookings/{booking_id}"), Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn full_dates_are_refused() {
    let (state, app) = test_app();
    let admin = admin_session(&state, &app).await;
    let tour_id = publish_tour(&app, &admin, 3).await;
    let first = register(&app, "traveller6").await;
    let second = register(&app, "traveller7").await;

    let (status, _) = send(
        &app,
        json_request("POST", "/v1/bookings", Some(&first), booking_body(&tour_id, 2)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        json_request("POST", "/v1/bookings", Some(&second), booking_body(&tour_id, 2)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_capacity");
}

#[tokio::test]
async fn contact_answers_simple_questions_and_escalates_complaints() {
    let (state, app) = test_app();

    let (status, answered) = send(
        &app,
        json_request(
            "POST",
            "/v1/contact",
            None,
            json!({
                "name": "Ana Lima",
                "email": "ana@example.com",
                "subject": "Price question",
                "message": "How much does the tour cost?"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{answered}");
    assert_eq!(answered["requires_human_review"], false);
    assert_eq!(answered["category"], "pricing");
    assert!(answered["auto_reply"].as_str().unwrap().starts_with("Hello Ana"));

    let (status, escalated) = send(
        &app,
        json_request(
            "POST",
            "/v1/contact",
            None,
            json!({
                "name": "Ben Ode",
                "email": "ben@example.com",
                "subject": "Refund",
                "message": "I want to file a complaint about the price of my trip"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{escalated}");
    assert_eq!(escalated["requires_human_review"], true);
    assert!(escalated["auto_reply"].is_null());

    let sent = state.desk.mailer().sent();
    assert!(sent.iter().any(|email| email.to == "ana@example.com"));
    assert!(!sent.iter().any(|email| email.to == "ben@example.com"));
}

#[tokio::test]
async fn signed_webhook_confirms_booking_once() {
    let config = AppConfig {
        gateway: Some(GatewayConfig {
            secret_key: "sk_test_integration".to_string(),
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            webhook_tolerance_seconds: 300,
            api_base: "http://127.0.0.1:9".to_string(),
        }),
        ..AppConfig::default()
    };
    let state = test_state(config);
    let app = build_router(state.clone());
    let admin = admin_session(&state, &app).await;
    let tour_id = publish_tour(&app, &admin, 12).await;
    let traveller = register(&app, "traveller8").await;

    let (_, created) = send(
        &app,
        json_request("POST", "/v1/bookings", Some(&traveller), booking_body(&tour_id, 1)),
    )
    .await;
    let booking_id = created["booking"]["booking_id"].as_str().unwrap().to_string();

    let payload = json!({
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": "pi_integration_1",
                "amount_received": 25000,
                "currency": "usd",
                "metadata": { "booking_id": booking_id }
            }
        }
    })
    .to_string();
    let webhook = |signature: String| {
        Request::builder()
            .method("POST")
            .uri("/v1/payments/webhook")
            .header("content-type", "application/json")
            .header("stripe-signature", signature)
            .body(Body::from(payload.clone()))
            .unwrap()
    };

    let (status, body) = send(&app, webhook("t=1,v1=deadbeef".to_string())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "webhook_rejected");

    let signature =
        sign_webhook_payload(&payload, WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();
    let (status, body) = send(&app, webhook(signature.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "confirmed");
    let (status, body) = send(&app, webhook(signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "duplicate");

    let (status, detail) = send(
        &app,
        get_request(&format!("/v1/bookings/{booking_id}"), Some(&traveller)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["booking"]["status"], "confirmed");
    assert_eq!(detail["payments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn webhook_charge_below_the_total_leaves_booking_pending() {
    let config = AppConfig {
        gateway: Some(GatewayConfig {
            secret_key: "sk_test_integration".to_string(),
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            webhook_tolerance_seconds: 300,
            api_base: "http://127.0.0.1:9".to_string(),
        }),
        ..AppConfig::default()
    };
    let state = test_state(config);
    let app = build_router(state.clone());
    let admin = admin_session(&state, &app).await;
    let tour_id = publish_tour(&app, &admin, 12).await;
    let traveller = register(&app, "shortpayer").await;

    let (_, created) = send(
        &app,
        json_request("POST", "/v1/bookings", Some(&traveller), booking_body(&tour_id, 2)),
    )
    .await;
    let booking_id = created["booking"]["booking_id"].as_str().unwrap().to_string();
    assert_eq!(created["booking"]["total_cents"], 50000);

    for (transaction_id, amount, currency) in
        [("pi_short_1", 1, "usd"), ("pi_short_2", 50000, "eur")]
    {
        let payload = json!({
            "type": "payment_intent.succeeded",
            "data": {
                "object": {
                    "id": transaction_id,
                    "amount_received": amount,
                    "currency": currency,
                    "metadata": { "booking_id": booking_id }
                }
            }
        })
        .to_string();
        let signature =
            sign_webhook_payload(&payload, WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/v1/payments/webhook")
            .header("content-type", "application/json")
            .header("stripe-signature", signature)
            .body(Body::from(payload))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "mismatched");
    }

    let (status, detail) = send(
        &app,
        get_request(&format!("/v1/bookings/{booking_id}"), Some(&traveller)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["booking"]["status"], "pending");
    assert_eq!(detail["booking"]["payment_state"], "unpaid");
    assert_eq!(detail["outstanding_cents"], 50000);
    let payments = detail["payments"].as_array().unwrap();
    assert_eq!(payments.len(), 2);
    assert!(payments.iter().all(|payment| payment["status"] == "failed"));
}

#[tokio::test]
async fn admin_dashboard_counts_bookings() {
    let (state, app) = test_app();
    let admin = admin_session(&state, &app).await;
    let tour_id = publish_tour(&app, &admin, 12).await;
    let traveller = register(&app, "traveller9").await;
    send(
        &app,
        json_request("POST", "/v1/bookings", Some(&traveller), booking_body(&tour_id, 3)),
    )
    .await;

    let (status, dashboard) = send(&app, get_request("/v1/admin/dashboard", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK, "{dashboard}");
    assert_eq!(dashboard["bookings"]["total"], 1);
    assert_eq!(dashboard["active_tours"], 1);

    let request = get_request("/v1/admin/reports/bookings.csv", Some(&admin));
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(body.to_vec()).unwrap();
    assert_eq!(csv.lines().count(), 2);
}

fn reset_token(state: &ApiState) -> String {
    let email = state
        .desk
        .mailer()
        .sent()
        .into_iter()
        .rev()
        .find(|email| email.subject == "Reset your Wayfare password")
        .expect("reset email should be sent");
    let start = email.body.find("token=").expect("reset link") + "token=".len();
    email.body[start..]
        .split_whitespace()
        .next()
        .expect("token")
        .to_string()
}

#[tokio::test]
async fn forgotten_password_is_reset_through_the_emailed_link() {
    let (state, app) = test_app();
    let old_session = register(&app, "forgetful").await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/v1/auth/password/forgot",
            None,
            json!({ "email": "nobody@example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(state.desk.mailer().sent().is_empty());

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/v1/auth/password/forgot",
            None,
            json!({ "email": "forgetful@example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let token = reset_token(&state);
    let reset = json!({
        "token": token,
        "password": "a brand new phrase",
        "password_confirm": "a brand new phrase"
    });

    let (status, body) = send(
        &app,
        json_request("POST", "/v1/auth/password/reset", None, reset.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = send(&app, get_request("/v1/auth/me", Some(&old_session))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/v1/auth/login",
            None,
            json!({ "username_or_email": "forgetful", "password": "a brand new phrase" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        json_request("POST", "/v1/auth/password/reset", None, reset),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"][0]["field"], "token");
}

#[tokio::test]
async fn itinerary_is_managed_by_admins_and_shown_with_the_tour() {
    let (state, app) = test_app();
    let admin = admin_session(&state, &app).await;
    let tour_id = publish_tour(&app, &admin, 12).await;
    let day = json!({
        "title": "Arrival in Imlil",
        "description": "Meet the guide and walk to the first village.",
        "activities": ["Village walk", "Mint tea"],
        "accommodation": "Guesthouse",
        "meals": "Dinner"
    });

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/v1/admin/tours/{tour_id}/itinerary/1"),
            Some(&admin),
            day.clone(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/v1/admin/tours/{tour_id}/itinerary/5"),
            Some(&admin),
            day.clone(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let traveller = register(&app, "planner").await;
    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &format!("/v1/admin/tours/{tour_id}/itinerary/2"),
            Some(&traveller),
            day,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, plan) = send(&app, get_request(&format!("/v1/tours/{tour_id}/itinerary"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plan["days"].as_array().unwrap().len(), 1);
    assert_eq!(plan["days"][0]["activities"][1], "Mint tea");

    let (_, detail) = send(&app, get_request(&format!("/v1/tours/{tour_id}"), None)).await;
    assert_eq!(detail["itinerary"][0]["title"], "Arrival in Imlil");

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/v1/admin/tours/{tour_id}/itinerary/1"))
        .header("cookie", &admin)
        .header("origin", ORIGIN)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn reply_templates_answer_matching_messages() {
    let (state, app) = test_app();
    let admin = admin_session(&state, &app).await;

    let (status, created) = send(
        &app,
        json_request(
            "POST",
            "/v1/admin/reply-templates",
            Some(&admin),
            json!({
                "name": "Refund timing",
                "category": "cancellation",
                "trigger_keywords": ["refund"],
                "body": "Hello {name}, refunds reach your card within five working days.",
                "confidence_threshold": 0.3
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let template_id = created["template"]["template_id"].as_str().unwrap().to_string();

    let (status, answered) = send(
        &app,
        json_request(
            "POST",
            "/v1/contact",
            None,
            json!({
                "name": "Ana Lima",
                "email": "ana@example.com",
                "subject": "Refund question",
                "message": "When will my refund arrive on the card?"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{answered}");
    assert_eq!(
        answered["auto_reply"],
        "Hello Ana Lima, refunds reach your card within five working days."
    );

    let (status, toggled) = send(
        &app,
        json_request(
            "POST",
            &format!("/v1/admin/reply-templates/{template_id}/toggle"),
            Some(&admin),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggled["template"]["is_active"], false);

    let (status, copy) = send(
        &app,
        json_request(
            "POST",
            &format!("/v1/admin/reply-templates/{template_id}/duplicate"),
            Some(&admin),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(copy["template"]["name"], "Refund timing (copy)");

    let (status, preview) = send(
        &app,
        json_request(
            "POST",
            "/v1/admin/responder/preview",
            Some(&admin),
            json!({ "subject": "Refund question", "message": "When will my refund arrive?" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{preview}");
    assert!(preview["decision"]["template_id"].is_null());
    assert!(preview["decision"]["reply"]
        .as_str()
        .unwrap()
        .starts_with("Hello Customer,"));

    let (status, analytics) = send(
        &app,
        get_request("/v1/admin/responder/analytics", Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analytics["analytics"]["auto_answered"], 1);
    assert_eq!(analytics["analytics"]["templates"][0]["template_id"], template_id);
    assert_eq!(analytics["analytics"]["templates"][0]["uses"], 1);
}

#[tokio::test]
async fn inquiries_are_assigned_and_closed_in_bulk() {
    let (state, app) = test_app();
    let admin = admin_session(&state, &app).await;
    let (_, me) = send(&app, get_request("/v1/auth/me", Some(&admin))).await;
    let admin_id = me["user"]["user_id"].as_str().unwrap().to_string();

    let (_, complaint) = send(
        &app,
        json_request(
            "POST",
            "/v1/contact",
            None,
            json!({
                "name": "Ben Ode",
                "email": "ben@example.com",
                "subject": "Urgent",
                "message": "Emergency: nobody met us at the pickup point"
            }),
        ),
    )
    .await;
    let inquiry_id = complaint["inquiry_id"].as_str().unwrap().to_string();

    let (status, assigned) = send(
        &app,
        json_request(
            "POST",
            &format!("/v1/admin/inquiries/{inquiry_id}/assign"),
            Some(&admin),
            json!({ "assigned_to": admin_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{assigned}");
    assert_eq!(assigned["inquiry"]["status"], "in_progress");
    assert_eq!(assigned["inquiry"]["priority"], "urgent");

    let (_, stats) = send(&app, get_request("/v1/admin/inquiries/stats", Some(&admin))).await;
    assert_eq!(stats["stats"]["in_progress"], 1);
    assert_eq!(stats["stats"]["urgent"], 1);

    let (status, bulk) = send(
        &app,
        json_request(
            "POST",
            "/v1/admin/inquiries/bulk",
            Some(&admin),
            json!({ "inquiry_ids": [inquiry_id, "missing"], "action": "mark_resolved" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{bulk}");
    assert_eq!(bulk["outcome"]["updated"], 1);
    assert_eq!(bulk["outcome"]["missing"][0], "missing");

    let (status, processed) = send(
        &app,
        json_request(
            "POST",
            "/v1/admin/inquiries/bulk-process",
            Some(&admin),
            json!({ "inquiry_ids": [inquiry_id] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(processed["summary"]["skipped"], 1);

    let (_, stats) = send(&app, get_request("/v1/admin/inquiries/stats", Some(&admin))).await;
    assert_eq!(stats["stats"]["resolved"], 1);
    assert_eq!(stats["stats"]["urgent"], 0);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/v1/admin/inquiries/bulk",
            Some(&admin),
            json!({ "inquiry_ids": [], "action": "delete" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
