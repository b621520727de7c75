//! Provider callbacks. Bodies are signed with HMAC-SHA256 over the raw bytes
//! using the shared webhook secret; the hex digest arrives in `X-Signature`.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use afrilingua_common::AppError;

pub const SIGNATURE_HEADER: &str = "x-signature";

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str) -> Result<HmacSha256, AppError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("Invalid webhook secret".to_string()))
}

pub fn sign(secret: &str, payload: &[u8]) -> Result<String, AppError> {
    let mut mac = mac(secret)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature against the payload.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> Result<(), AppError> {
    let invalid = || AppError::Authentication("Invalid webhook signature".to_string());

    let provided = hex::decode(signature.trim()).map_err(|_| invalid())?;
    let mut mac = mac(secret)?;
    mac.update(payload);
    mac.verify_slice(&provided).map_err(|_| invalid())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub payment_intent_id: String,
    pub status: WebhookOutcome,
    pub transaction_id: Option<String>,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, AppError> {
        serde_json::from_slice(payload)
            .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn signature_round_trips_and_rejects_tampering() {
        let body = br#"{"payment_intent_id":"pi_1","status":"succeeded"}"#;
        let signature = sign(SECRET, body).unwrap();

        assert!(verify_signature(SECRET, body, &signature).is_ok());
        assert!(verify_signature("other-secret", body, &signature).is_err());
        assert!(verify_signature(SECRET, br#"{"payment_intent_id":"pi_2"}"#, &signature).is_err());
        assert!(verify_signature(SECRET, body, "not-hex").is_err());
    }

    #[test]
    fn event_payload_parses() {
        let event = WebhookEvent::parse(
            br#"{"payment_intent_id":"pi_1","status":"failed","transaction_id":null}"#,
        )
        .unwrap();
        assert_eq!(event.status, WebhookOutcome::Failed);
        assert!(WebhookEvent::parse(br#"{"status":"refunded"}"#).is_err());
    }
}
