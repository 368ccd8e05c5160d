use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};
use wayfare_core::{BookingError, PaymentMethod};
use wayfare_desk::bookings::PaymentReceipt;
use wayfare_desk::DeskError;

use crate::error::{ApiError, ApiResult};
use crate::session::require_user;
use crate::ApiState;

const MAX_WEBHOOK_PAYLOAD: usize = 256 * 1024;
const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
struct CheckoutResponse {
    booking_id: String,
    reference: String,
    amount_cents: i64,
    currency: String,
    payment_intent_id: String,
    client_secret: String,
}

/// Opens a card payment intent for whatever is still owed on the booking.
pub async fn checkout(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> ApiResult<Response> {
    let user = require_user(&state, &headers).await?;
    let Some(gateway) = state.config.gateway.as_ref() else {
        return Err(ApiError::Unavailable("card payment gateway"));
    };
    let (booking, outstanding) = state.desk.payable_booking(&user, &booking_id).await?;

    let amount = outstanding.to_string();
    let currency = booking.currency.to_lowercase();
    let response = state
        .http_client
        .post(format!("{}/v1/payment_intents", gateway.api_base))
        .bearer_auth(gateway.secret_key.as_str())
        .form(&[
            ("amount", amount.as_str()),
            ("currency", currency.as_str()),
            ("automatic_payment_methods[enabled]", "true"),
            ("receipt_email", user.email.as_str()),
            ("metadata[booking_id]", booking.booking_id.as_str()),
            ("metadata[reference]", booking.reference.as_str()),
        ])
        .send()
        .await
        .map_err(|err| ApiError::Gateway(err.to_string()))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        warn!(status = status.as_u16(), booking_id = %booking.booking_id, "payment intent rejected");
        return Err(ApiError::Gateway(format!(
            "gateway answered with status {}",
            status.as_u16()
        )));
    }

    let parsed: serde_json::Value = serde_json::from_str(body.as_str()).unwrap_or_default();
    let field = |name: &str| {
        parsed
            .get(name)
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string()
    };
    let (payment_intent_id, client_secret) = (field("id"), field("client_secret"));
    if payment_intent_id.is_empty() || client_secret.is_empty() {
        return Err(ApiError::Gateway(
            "gateway response did not include a client secret".to_string(),
        ));
    }

    info!(booking_id = %booking.booking_id, payment_intent_id = %payment_intent_id, "payment intent created");
    Ok((
        StatusCode::OK,
        Json(CheckoutResponse {
            booking_id: booking.booking_id,
            reference: booking.reference,
            amount_cents: outstanding,
            currency: booking.currency,
            payment_intent_id,
            client_secret,
        }),
    )
        .into_response())
}

pub async fn simulate(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> ApiResult<Response> {
    let user = require_user(&state, &headers).await?;
    let booking = state.desk.simulate_payment(&user, &booking_id).await?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "booking": booking }))).into_response())
}

/// What a gateway callback did to the booking, echoed back in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum WebhookOutcome {
    Confirmed,
    Duplicate,
    Mismatched,
    FailureRecorded,
    Ignored,
}

#[derive(Debug, Deserialize)]
struct GatewayEvent {
    #[serde(rename = "type")]
    kind: String,
    data: GatewayEventData,
}

#[derive(Debug, Deserialize)]
struct GatewayEventData {
    object: PaymentIntent,
}

#[derive(Debug, Default, Deserialize)]
struct PaymentIntent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    amount: i64,
    amount_received: Option<i64>,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    metadata: IntentMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct IntentMetadata {
    booking_id: Option<String>,
}

impl PaymentIntent {
    fn receipt(&self) -> PaymentReceipt {
        PaymentReceipt {
            amount_cents: self.amount_received.unwrap_or(self.amount),
            currency: self.currency.to_uppercase(),
            method: PaymentMethod::Card,
            transaction_id: self.id.clone(),
        }
    }
}

/// Signed gateway callbacks. Replays of an already confirmed booking are
/// acknowledged without charging anything again; a charge that does not
/// settle the booking is kept as a failed payment and acknowledged too.
pub async fn webhook(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Response> {
    let Some(gateway) = state.config.gateway.as_ref() else {
        return Err(ApiError::Unavailable("card payment gateway"));
    };
    let Some(secret) = gateway.webhook_secret.as_ref() else {
        return Err(ApiError::Unavailable("webhook signing secret"));
    };
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if let Err(rejection) = verify_webhook(
        header,
        body.as_str(),
        secret.as_str(),
        gateway.webhook_tolerance_seconds,
        chrono::Utc::now().timestamp(),
    ) {
        warn!(reason = %rejection, "webhook signature rejected");
        return Err(ApiError::WebhookRejected(rejection));
    }

    let event: GatewayEvent = serde_json::from_str(body.as_str())
        .map_err(|_| ApiError::BadRequest("webhook body is not a gateway event".to_string()))?;
    let intent = event.data.object;
    let Some(booking_id) = intent.metadata.booking_id.clone() else {
        return Ok(acknowledge(WebhookOutcome::Ignored));
    };

    let outcome = match event.kind.as_str() {
        "payment_intent.succeeded" => {
            match state.desk.confirm_payment(&booking_id, intent.receipt()).await {
                Ok(_) => WebhookOutcome::Confirmed,
                Err(DeskError::Booking(BookingError::AlreadyPaid)) | Err(DeskError::Conflict(_)) => {
                    info!(booking_id = %booking_id, "duplicate payment notification ignored");
                    WebhookOutcome::Duplicate
                }
                Err(DeskError::Booking(BookingError::PaymentMismatch { expected, received })) => {
                    warn!(
                        booking_id = %booking_id,
                        %expected,
                        %received,
                        "gateway charge does not settle booking"
                    );
                    WebhookOutcome::Mismatched
                }
                Err(err) => return Err(err.into()),
            }
        }
        "payment_intent.payment_failed" => {
            state
                .desk
                .record_failed_payment(&booking_id, intent.receipt())
                .await?;
            WebhookOutcome::FailureRecorded
        }
        _ => WebhookOutcome::Ignored,
    };
    Ok(acknowledge(outcome))
}

fn acknowledge(outcome: WebhookOutcome) -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "received": true, "outcome": outcome })),
    )
        .into_response()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WebhookRejection {
    #[error("signature header is malformed")]
    Malformed,
    #[error("signature timestamp is outside the tolerance window")]
    Stale,
    #[error("payload exceeds {MAX_WEBHOOK_PAYLOAD} bytes")]
    Oversized,
    #[error("no signature matches the payload")]
    Mismatch,
}

/// A parsed `t=<unix>,v1=<hex>[,v1=<hex>]` header. Unknown schemes are
/// skipped so that signing-key rotation keeps working.
#[derive(Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, WebhookRejection> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for (key, value) in header
            .split(',')
            .filter_map(|part| part.trim().split_once('='))
        {
            match key {
                "t" => timestamp = value.parse::<i64>().ok(),
                "v1" => signatures.extend(decode_hex(value)),
                _ => {}
            }
        }
        match timestamp {
            Some(timestamp) if !signatures.is_empty() => Ok(Self {
                timestamp,
                signatures,
            }),
            _ => Err(WebhookRejection::Malformed),
        }
    }
}

fn signing_mac(secret: &str, timestamp: i64, payload: &str) -> Option<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    Some(mac)
}

/// Checks the header against HMAC-SHA256 of `"<t>.<body>"`, comparing in
/// constant time.
pub fn verify_webhook(
    header: &str,
    payload: &str,
    secret: &str,
    tolerance_seconds: u64,
    now: i64,
) -> Result<(), WebhookRejection> {
    if payload.len() > MAX_WEBHOOK_PAYLOAD {
        return Err(WebhookRejection::Oversized);
    }
    let parsed = SignatureHeader::parse(header)?;
    if tolerance_seconds > 0 && now.abs_diff(parsed.timestamp) > tolerance_seconds {
        return Err(WebhookRejection::Stale);
    }
    let Some(mac) = signing_mac(secret, parsed.timestamp, payload) else {
        return Err(WebhookRejection::Mismatch);
    };
    if parsed
        .signatures
        .iter()
        .any(|signature| mac.clone().verify_slice(signature).is_ok())
    {
        Ok(())
    } else {
        Err(WebhookRejection::Mismatch)
    }
}

fn decode_hex(value: &str) -> Option<Vec<u8>> {
    if value.len() % 2 != 0 {
        return None;
    }
    (0..value.len())
        .step_by(2)
        .map(|at| u8::from_str_radix(value.get(at..at + 2)?, 16).ok())
        .collect()
}

/// Builds the header a gateway would send for `payload` at `timestamp`.
pub fn sign_webhook_payload(payload: &str, secret: &str, timestamp: i64) -> Option<String> {
    let digest = signing_mac(secret, timestamp, payload)?.finalize().into_bytes();
    let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    Some(format!("t={timestamp},v1={hex}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_760_000_000;
    const PAYLOAD: &str = r#"{"type":"payment_intent.succeeded"}"#;

    #[test]
    fn accepts_fresh_valid_signature() {
        let header = sign_webhook_payload(PAYLOAD, SECRET, NOW).expect("sign");
        assert_eq!(verify_webhook(&header, PAYLOAD, SECRET, 300, NOW + 10), Ok(()));
    }

    #[test]
    fn any_listed_signature_may_match() {
        let valid = sign_webhook_payload(PAYLOAD, SECRET, NOW).expect("sign");
        let rotated = valid.replacen(",v1=", ",v0=legacy,v1=00ff,v1=", 1);
        assert_eq!(verify_webhook(&rotated, PAYLOAD, SECRET, 300, NOW), Ok(()));
    }

    #[test]
    fn rejections_name_the_reason() {
        let header = sign_webhook_payload(PAYLOAD, SECRET, NOW).expect("sign");
        assert_eq!(
            verify_webhook(&header, "{}", SECRET, 300, NOW),
            Err(WebhookRejection::Mismatch)
        );
        assert_eq!(
            verify_webhook(&header, PAYLOAD, "other", 300, NOW),
            Err(WebhookRejection::Mismatch)
        );
        assert_eq!(
            verify_webhook(&header, PAYLOAD, SECRET, 300, NOW + 301),
            Err(WebhookRejection::Stale)
        );
        assert_eq!(
            verify_webhook("v1=abc", PAYLOAD, SECRET, 300, NOW),
            Err(WebhookRejection::Malformed)
        );
        let huge = "x".repeat(MAX_WEBHOOK_PAYLOAD + 1);
        assert_eq!(
            verify_webhook(&header, &huge, SECRET, 300, NOW),
            Err(WebhookRejection::Oversized)
        );
    }

    #[test]
    fn header_parsing_skips_unknown_schemes() {
        let parsed = SignatureHeader::parse("t=12, v0=zz, v1=0a0b").expect("parse");
        assert_eq!(parsed.timestamp, 12);
        assert_eq!(parsed.signatures, vec![vec![0x0a, 0x0b]]);
        assert_eq!(
            SignatureHeader::parse("t=12,v1=xyz"),
            Err(WebhookRejection::Malformed)
        );
    }

    #[test]
    fn intent_prefers_the_received_amount() {
        let intent: PaymentIntent = serde_json::from_str(
            r#"{"id":"pi_1","amount":500,"amount_received":1,"currency":"usd"}"#,
        )
        .expect("intent");
        let receipt = intent.receipt();
        assert_eq!(receipt.amount_cents, 1);
        assert_eq!(receipt.currency, "USD");
        assert!(intent.metadata.booking_id.is_none());
    }
}
