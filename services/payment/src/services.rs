use axum::extract::FromRef;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use afrilingua_auth::{Claims, ClientInfo, JwtService};
use afrilingua_common::{
    AppError, AuditAction, BookingStatus, LedgerEntryType, NotificationCategory, PaymentProvider,
    PaymentStatus,
};
use afrilingua_database::{
    audit::{self, AuditEntry},
    calculate_fees,
    notifications::{create_notification, NewNotification},
    wallet::{self, LedgerMove},
    Booking, Payment,
};
use afrilingua_mailer::Mailer;

use crate::config::AppConfig;
use crate::models::*;
use crate::webhooks::{verify_signature, WebhookEvent, WebhookOutcome};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_service: JwtService,
    pub mailer: Mailer,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db_pool: PgPool, config: AppConfig) -> Result<Self, AppError> {
        Ok(Self {
            jwt_service: JwtService::new(&config.jwt),
            mailer: Mailer::new(&config.email)?,
            db_pool,
            config,
        })
    }
}

impl FromRef<AppState> for JwtService {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_service.clone()
    }
}

async fn lock_payment(conn: &mut PgConnection, payment_id: Uuid) -> Result<Payment, AppError> {
    sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE payment_id = $1 FOR UPDATE")
        .bind(payment_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
}

pub struct PaymentService {
    db_pool: PgPool,
    config: AppConfig,
}

impl PaymentService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db_pool: state.db_pool.clone(),
            config: state.config.clone(),
        }
    }

    pub async fn create_payment(
        &self,
        student_id: Uuid,
        request: CreatePaymentRequest,
    ) -> Result<Payment, AppError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1")
            .bind(request.booking_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if booking.student_id != student_id {
            return Err(AppError::Authorization("You can only pay for your own bookings".to_string()));
        }
        if booking.status()? != BookingStatus::Pending {
            return Err(AppError::Validation("Only pending bookings can be paid".to_string()));
        }

        let already_paid = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM payments WHERE booking_id = $1 AND status = $2)",
        )
        .bind(booking.booking_id)
        .bind(PaymentStatus::Succeeded.as_str())
        .fetch_one(&self.db_pool)
        .await?;

        if already_paid {
            return Err(AppError::Conflict("This booking has already been paid".to_string()));
        }

        let now = Utc::now();
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments
                (payment_id, booking_id, user_id, provider, amount, currency, status,
                 payment_intent_id, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(booking.booking_id)
        .bind(student_id)
        .bind(request.provider.as_str())
        .bind(booking.amount)
        .bind(&booking.currency)
        .bind(PaymentStatus::Pending.as_str())
        .bind(new_payment_intent_id(request.provider))
        .bind(json!({ "booking_id": booking.booking_id, "tutor_id": booking.tutor_id }))
        .bind(now)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(
            "Payment {} started for booking {} via {}",
            payment.payment_id,
            booking.booking_id,
            request.provider
        );
        Ok(payment)
    }

    pub async fn list_payments(&self, claims: &Claims) -> Result<Vec<Payment>, AppError> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE $1 OR user_id = $2 ORDER BY created_at DESC",
        )
        .bind(claims.is_admin())
        .bind(claims.user_id())
        .fetch_all(&self.db_pool)
        .await?;
        Ok(payments)
    }

    pub async fn get_payment(&self, claims: &Claims, payment_id: Uuid) -> Result<Payment, AppError> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE payment_id = $1")
            .bind(payment_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if !claims.is_admin() && payment.user_id != claims.user_id() {
            return Err(AppError::Authorization("You can only view your own payments".to_string()));
        }
        Ok(payment)
    }

    pub async fn handle_webhook(
        &self,
        provider: PaymentProvider,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookAck, AppError> {
        let signature = signature
            .ok_or_else(|| AppError::Authentication("Missing webhook signature".to_string()))?;
        verify_signature(&self.config.payment.webhook_secret, payload, signature)?;

        let event = WebhookEvent::parse(payload)?;
        let payment_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT payment_id FROM payments WHERE payment_intent_id = $1 AND provider = $2",
        )
        .bind(&event.payment_intent_id)
        .bind(provider.as_str())
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        tracing::info!(
            "Webhook from {}: payment {} {:?}",
            provider,
            payment_id,
            event.status
        );

        let payment = match event.status {
            WebhookOutcome::Succeeded => {
                self.finalize(payment_id, event.transaction_id, &ClientInfo::default())
                    .await?
            }
            WebhookOutcome::Failed => self.mark_failed(payment_id, event.transaction_id).await?,
        };

        Ok(WebhookAck {
            payment_id: payment.payment_id,
            status: payment.status()?,
        })
    }

    /// Manual confirmation by an admin, for providers without callbacks.
    pub async fn confirm_payment(
        &self,
        payment_id: Uuid,
        request: ConfirmPaymentRequest,
        client: &ClientInfo,
    ) -> Result<Payment, AppError> {
        self.finalize(payment_id, request.transaction_id, client).await
    }

    async fn mark_failed(&self, payment_id: Uuid, transaction_id: Option<String>) -> Result<Payment, AppError> {
        let mut tx = self.db_pool.begin().await?;
        let payment = lock_payment(&mut tx, payment_id).await?;

        if !matches!(payment.status()?, PaymentStatus::Pending | PaymentStatus::Processing) {
            return Ok(payment);
        }

        let failed = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2, transaction_id = COALESCE($3, transaction_id), updated_at = $4
            WHERE payment_id = $1
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(PaymentStatus::Failed.as_str())
        .bind(transaction_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        create_notification(
            &mut *tx,
            &NewNotification::in_app(
                payment.user_id,
                NotificationCategory::Payment,
                "Payment failed",
                "Your payment could not be completed. Please try again.",
            )
            .with_metadata(json!({ "payment_id": payment_id, "booking_id": payment.booking_id })),
        )
        .await?;

        tx.commit().await?;
        tracing::warn!("Payment {} failed", payment_id);
        Ok(failed)
    }

    /// Settles a payment in one transaction: payment succeeded, booking paid
    /// with its fee split, tutor earnings credited as pending. Repeated
    /// deliveries for an already settled payment are no-ops.
    async fn finalize(
        &self,
        payment_id: Uuid,
        transaction_id: Option<String>,
        client: &ClientInfo,
    ) -> Result<Payment, AppError> {
        let mut tx = self.db_pool.begin().await?;
        let payment = lock_payment(&mut tx, payment_id).await?;

        match payment.status()? {
            PaymentStatus::Succeeded => return Ok(payment),
            PaymentStatus::Pending | PaymentStatus::Processing => {}
            other => {
                return Err(AppError::Validation(format!(
                    "A {} payment cannot be confirmed",
                    other
                )))
            }
        }

        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1 FOR UPDATE")
            .bind(payment.booking_id)
            .fetch_one(&mut *tx)
            .await?;
        booking.ensure_transition(BookingStatus::Paid)?;

        let (platform_fee, tutor_earnings) =
            calculate_fees(booking.amount, self.config.platform.platform_fee_percentage);
        let now = Utc::now();

        let settled = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2, transaction_id = COALESCE($3, transaction_id), updated_at = $4
            WHERE payment_id = $1
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(PaymentStatus::Succeeded.as_str())
        .bind(transaction_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2, platform_fee = $3, tutor_earnings = $4, updated_at = $5
            WHERE booking_id = $1
            "#,
        )
        .bind(booking.booking_id)
        .bind(BookingStatus::Paid.as_str())
        .bind(platform_fee)
        .bind(tutor_earnings)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if tutor_earnings > Decimal::ZERO {
            wallet::apply(
                &mut tx,
                &LedgerMove::new(
                    booking.tutor_id,
                    LedgerEntryType::Earning,
                    tutor_earnings,
                    &booking.currency,
                )
                .reference(booking.booking_id)
                .describe("Booking paid"),
            )
            .await?;
        }

        audit::record(
            &mut *tx,
            &AuditEntry::new(
                Some(payment.user_id),
                AuditAction::PaymentMade,
                format!("Paid {} {} for booking {}", payment.amount, payment.currency, booking.booking_id),
            )
            .client(client)
            .metadata(json!({
                "payment_id": payment_id,
                "booking_id": booking.booking_id,
                "platform_fee": platform_fee,
                "tutor_earnings": tutor_earnings,
            })),
        )
        .await?;

        create_notification(
            &mut *tx,
            &NewNotification::in_app(
                payment.user_id,
                NotificationCategory::Payment,
                "Payment received",
                format!("We received your payment of {} {}.", payment.amount, payment.currency),
            )
            .with_metadata(json!({ "payment_id": payment_id, "booking_id": booking.booking_id })),
        )
        .await?;

        create_notification(
            &mut *tx,
            &NewNotification::in_app(
                booking.tutor_id,
                NotificationCategory::Booking,
                "Booking paid",
                "A student paid for a lesson. Please confirm the booking.",
            )
            .with_metadata(json!({ "booking_id": booking.booking_id })),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Payment {} settled: fee {} / tutor {}",
            payment_id,
            platform_fee,
            tutor_earnings
        );
        Ok(settled)
    }
}
