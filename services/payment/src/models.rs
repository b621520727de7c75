use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use afrilingua_common::{AppError, PaymentProvider, PaymentStatus, PayoutMethod};
use afrilingua_database::validate_amount;

// Payments

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub booking_id: Uuid,
    #[serde(default = "default_provider")]
    pub provider: PaymentProvider,
}

fn default_provider() -> PaymentProvider {
    PaymentProvider::Stripe
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct ConfirmPaymentRequest {
    #[validate(length(min = 1, max = 255))]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
}

/// Provider reference handed to the client when a payment is started.
pub fn new_payment_intent_id(provider: PaymentProvider) -> String {
    format!("{}_pi_{}", provider.as_str(), Uuid::new_v4().simple())
}

// Wallets

#[derive(Debug, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionQuery {
    pub tutor_id: Option<Uuid>,
}

// Withdrawals

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateWithdrawalRequest {
    pub amount: Decimal,
    pub payout_method: PayoutMethod,
    pub payout_details: serde_json::Value,
}

impl CreateWithdrawalRequest {
    pub fn check(&self) -> Result<(), AppError> {
        validate_amount(self.amount)?;
        match self.payout_details.as_object() {
            Some(details) if !details.is_empty() => Ok(()),
            _ => Err(AppError::Validation(
                "payout_details must describe where to send the money".to_string(),
            )),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct WithdrawalDecisionRequest {
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub transaction_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn withdrawal_needs_amount_and_details() {
        let request = CreateWithdrawalRequest {
            amount: Decimal::new(5000, 2),
            payout_method: PayoutMethod::PayPal,
            payout_details: json!({ "email": "tutor@example.com" }),
        };
        assert!(request.check().is_ok());

        let zero = CreateWithdrawalRequest { amount: Decimal::ZERO, ..request };
        assert!(zero.check().is_err());

        let blank = CreateWithdrawalRequest {
            amount: Decimal::new(5000, 2),
            payout_method: PayoutMethod::Wise,
            payout_details: json!({}),
        };
        assert!(blank.check().is_err());
    }

    #[test]
    fn payment_intent_carries_provider_prefix() {
        let id = new_payment_intent_id(PaymentProvider::PayPal);
        assert!(id.starts_with("paypal_pi_"));
        assert_ne!(id, new_payment_intent_id(PaymentProvider::PayPal));
    }

    #[test]
    fn provider_defaults_to_stripe() {
        let request: CreatePaymentRequest =
            serde_json::from_value(json!({ "booking_id": Uuid::new_v4() })).unwrap();
        assert_eq!(request.provider, PaymentProvider::Stripe);
    }
}
