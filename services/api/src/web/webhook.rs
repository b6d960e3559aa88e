//! services/api/src/web/webhook.rs
//!
//! The payment-processor callback receiver. The raw body is authenticated
//! against the shared webhook secret before the payload is trusted; the
//! matched order's status is then overwritten from the event. Replayed
//! deliveries reapply the same overwrite.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::web::state::AppState;
use storefront_core::ports::{PaymentOutcome, PortError};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature, `t=<unix>,v1=<hex>`.
pub const SIGNATURE_HEADER: &str = "payment-signature";

//=========================================================================================
// Signature Verification
//=========================================================================================

/// Builds the signature header value for a payload, as the processor would.
/// The signed message is `"{timestamp}.{body}"`.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a signature header against the raw body. Comparison is
/// constant-time via the Mac verifier.
fn verify_signature(secret: &str, header: &str, body: &[u8]) -> bool {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(v) = part.strip_prefix("v1=") {
            signature = Some(v);
        }
    }
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return false;
    };
    let Ok(signature) = hex::decode(signature) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

//=========================================================================================
// Event Payload
//=========================================================================================

#[derive(Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Deserialize)]
struct EventData {
    object: PaymentIntent,
}

#[derive(Deserialize)]
struct PaymentIntent {
    id: String,
    #[serde(default)]
    last_payment_error: Option<PaymentIntentError>,
}

#[derive(Deserialize)]
struct PaymentIntentError {
    message: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

//=========================================================================================
// Handler
//=========================================================================================

/// Receive a payment-processor event.
#[utoipa::path(
    post,
    path = "/webhooks/payment",
    request_body(content_type = "application/json", description = "Raw payment-processor event payload."),
    responses(
        (status = 200, description = "Event received", body = WebhookAck),
        (status = 400, description = "Bad signature or payload"),
        (status = 500, description = "Handler failure")
    )
)]
pub async fn payment_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !verify_signature(&state.config.payment_webhook_secret, signature, &body) {
        warn!("Webhook signature verification failed");
        return Err((
            StatusCode::BAD_REQUEST,
            "Webhook signature verification failed".to_string(),
        ));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid webhook payload".to_string()))?;
    let intent = event.data.object;

    let handler_error = |e: PortError| {
        error!("Webhook handler error: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook handler failed".to_string(),
        )
    };

    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            let updated = state
                .store
                .apply_payment_outcome(
                    &intent.id,
                    PaymentOutcome::Succeeded { paid_at: Utc::now() },
                )
                .await
                .map_err(handler_error)?;
            match updated {
                Some(order) => info!(order_id = %order.id, "Order marked as paid"),
                // A successful payment with nothing to attach it to is
                // logged and dropped; there is no dead-letter queue.
                None => warn!(payment_ref = %intent.id, "No order found for payment intent"),
            }
        }
        "payment_intent.payment_failed" => {
            let error_message = intent
                .last_payment_error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "Payment failed".to_string());
            let updated = state
                .store
                .apply_payment_outcome(&intent.id, PaymentOutcome::Failed { error: error_message })
                .await
                .map_err(handler_error)?;
            if let Some(order) = updated {
                info!(order_id = %order.id, "Order marked as payment failed");
            }
        }
        "payment_intent.canceled" => {
            state
                .store
                .apply_payment_outcome(&intent.id, PaymentOutcome::Canceled)
                .await
                .map_err(handler_error)?;
        }
        other => {
            info!(event_type = other, "Unhandled webhook event type");
        }
    }

    Ok(Json(WebhookAck { received: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn signed_payloads_verify() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let header = sign_payload(SECRET, 1_700_000_000, body);
        assert!(verify_signature(SECRET, &header, body));
    }

    #[test]
    fn wrong_secret_or_body_fails() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let header = sign_payload(SECRET, 1_700_000_000, body);
        assert!(!verify_signature("whsec_other", &header, body));
        assert!(!verify_signature(SECRET, &header, b"tampered body"));
    }

    #[test]
    fn malformed_headers_fail() {
        let body = b"{}";
        assert!(!verify_signature(SECRET, "", body));
        assert!(!verify_signature(SECRET, "t=123", body));
        assert!(!verify_signature(SECRET, "v1=deadbeef", body));
        assert!(!verify_signature(SECRET, "t=123,v1=not-hex", body));
    }
}
