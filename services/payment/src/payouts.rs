use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use afrilingua_auth::{Claims, ClientInfo};
use afrilingua_common::{
    AppError, AuditAction, LedgerEntryType, NotificationCategory, UserRole, WithdrawalStatus,
};
use afrilingua_database::{
    audit::{self, AuditEntry},
    notifications::{create_notification, NewNotification},
    wallet::{self, LedgerMove},
    TutorWallet, User, WalletTransaction, WithdrawalRequest,
};
use afrilingua_mailer::{EmailTemplate, Mailer};

use crate::models::*;

pub struct WalletService {
    db_pool: PgPool,
    currency: String,
}

impl WalletService {
    pub fn new(db_pool: PgPool, currency: &str) -> Self {
        Self {
            db_pool,
            currency: currency.to_string(),
        }
    }

    /// The tutor's wallet, opened empty on first access.
    pub async fn wallet_for(&self, tutor_id: Uuid) -> Result<TutorWallet, AppError> {
        let mut tx = self.db_pool.begin().await?;
        let wallet = wallet::lock_or_create(&mut tx, tutor_id, &self.currency).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    pub async fn list_wallets(&self) -> Result<Vec<TutorWallet>, AppError> {
        let wallets = sqlx::query_as::<_, TutorWallet>(
            "SELECT * FROM tutor_wallets ORDER BY total_earned DESC, created_at ASC",
        )
        .fetch_all(&self.db_pool)
        .await?;
        Ok(wallets)
    }

    /// Admin override moving pending earnings to available ahead of lesson
    /// completion.
    pub async fn release(&self, admin_id: Uuid, tutor_id: Uuid, amount: Decimal) -> Result<TutorWallet, AppError> {
        let mut tx = self.db_pool.begin().await?;
        let (wallet, _) = wallet::apply(
            &mut tx,
            &LedgerMove::new(tutor_id, LedgerEntryType::Release, amount, &self.currency)
                .describe(format!("Released by admin {}", admin_id)),
        )
        .await?;
        tx.commit().await?;

        tracing::info!("Admin {} released {} to tutor {}", admin_id, amount, tutor_id);
        Ok(wallet)
    }

    pub async fn transactions(
        &self,
        claims: &Claims,
        query: TransactionQuery,
    ) -> Result<Vec<WalletTransaction>, AppError> {
        let tutor_filter = if claims.is_admin() {
            query.tutor_id
        } else {
            Some(claims.user_id())
        };

        let entries = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT * FROM wallet_transactions
            WHERE ($1::UUID IS NULL OR tutor_id = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(tutor_filter)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(entries)
    }
}

async fn lock_withdrawal(conn: &mut PgConnection, withdrawal_id: Uuid) -> Result<WithdrawalRequest, AppError> {
    sqlx::query_as::<_, WithdrawalRequest>(
        "SELECT * FROM withdrawal_requests WHERE withdrawal_id = $1 FOR UPDATE",
    )
    .bind(withdrawal_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Withdrawal request not found".to_string()))
}

pub struct WithdrawalService {
    db_pool: PgPool,
    mailer: Mailer,
    currency: String,
}

impl WithdrawalService {
    pub fn new(db_pool: PgPool, mailer: Mailer, currency: &str) -> Self {
        Self {
            db_pool,
            mailer,
            currency: currency.to_string(),
        }
    }

    /// Debits the available balance up front so the same money cannot be
    /// requested twice. A rejection credits it back.
    pub async fn request(
        &self,
        tutor_id: Uuid,
        request: CreateWithdrawalRequest,
        client: &ClientInfo,
    ) -> Result<WithdrawalRequest, AppError> {
        request.check()?;

        let mut tx = self.db_pool.begin().await?;
        let now = Utc::now();

        let withdrawal = sqlx::query_as::<_, WithdrawalRequest>(
            r#"
            INSERT INTO withdrawal_requests
                (withdrawal_id, tutor_id, amount, currency, status, payout_method,
                 payout_details, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tutor_id)
        .bind(request.amount)
        .bind(&self.currency)
        .bind(WithdrawalStatus::Pending.as_str())
        .bind(request.payout_method.as_str())
        .bind(&request.payout_details)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        wallet::apply(
            &mut tx,
            &LedgerMove::new(tutor_id, LedgerEntryType::Withdrawal, request.amount, &self.currency)
                .reference(withdrawal.withdrawal_id)
                .describe(format!("Withdrawal via {}", request.payout_method)),
        )
        .await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(
                Some(tutor_id),
                AuditAction::WithdrawalRequested,
                format!("Requested withdrawal of {} {}", request.amount, self.currency),
            )
            .client(client)
            .metadata(json!({ "withdrawal_id": withdrawal.withdrawal_id })),
        )
        .await?;

        let admins: Vec<Uuid> = sqlx::query_scalar("SELECT user_id FROM users WHERE role = $1 AND is_active")
            .bind(UserRole::Admin.as_str())
            .fetch_all(&mut *tx)
            .await?;

        for admin_id in admins {
            create_notification(
                &mut *tx,
                &NewNotification::in_app(
                    admin_id,
                    NotificationCategory::Withdrawal,
                    "New withdrawal request",
                    format!("A tutor requested {} {}.", request.amount, self.currency),
                )
                .with_metadata(json!({ "withdrawal_id": withdrawal.withdrawal_id })),
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!("Tutor {} requested withdrawal {}", tutor_id, withdrawal.withdrawal_id);
        Ok(withdrawal)
    }

    pub async fn list(&self, claims: &Claims) -> Result<Vec<WithdrawalRequest>, AppError> {
        let withdrawals = sqlx::query_as::<_, WithdrawalRequest>(
            "SELECT * FROM withdrawal_requests WHERE $1 OR tutor_id = $2 ORDER BY created_at DESC",
        )
        .bind(claims.is_admin())
        .bind(claims.user_id())
        .fetch_all(&self.db_pool)
        .await?;
        Ok(withdrawals)
    }

    /// Admin moves a request along pending → approved → processing →
    /// completed, or rejects it before processing starts.
    pub async fn transition(
        &self,
        admin_id: Uuid,
        withdrawal_id: Uuid,
        next: WithdrawalStatus,
        request: WithdrawalDecisionRequest,
        client: &ClientInfo,
    ) -> Result<WithdrawalRequest, AppError> {
        let mut tx = self.db_pool.begin().await?;
        let withdrawal = lock_withdrawal(&mut tx, withdrawal_id).await?;

        let current = withdrawal.status()?;
        if !current.can_transition_to(next) {
            return Err(AppError::Validation(format!(
                "Withdrawal cannot move from {} to {}",
                current, next
            )));
        }

        if next == WithdrawalStatus::Rejected {
            wallet::apply(
                &mut tx,
                &LedgerMove::new(
                    withdrawal.tutor_id,
                    LedgerEntryType::WithdrawalReversal,
                    withdrawal.amount,
                    &withdrawal.currency,
                )
                .reference(withdrawal_id)
                .describe("Withdrawal rejected"),
            )
            .await?;
        }

        let now = Utc::now();
        let processed_at = matches!(next, WithdrawalStatus::Completed | WithdrawalStatus::Rejected)
            .then_some(now);

        let updated = sqlx::query_as::<_, WithdrawalRequest>(
            r#"
            UPDATE withdrawal_requests
            SET status = $2,
                admin_notes = COALESCE($3, admin_notes),
                transaction_id = COALESCE($4, transaction_id),
                processed_at = COALESCE($5, processed_at),
                updated_at = $6
            WHERE withdrawal_id = $1
            RETURNING *
            "#,
        )
        .bind(withdrawal_id)
        .bind(next.as_str())
        .bind(&request.admin_notes)
        .bind(&request.transaction_id)
        .bind(processed_at)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(
                Some(admin_id),
                AuditAction::WithdrawalProcessed,
                format!("Withdrawal {} {} -> {}", withdrawal_id, current, next),
            )
            .client(client)
            .metadata(json!({ "withdrawal_id": withdrawal_id, "tutor_id": withdrawal.tutor_id })),
        )
        .await?;

        create_notification(
            &mut *tx,
            &NewNotification::in_app(
                withdrawal.tutor_id,
                NotificationCategory::Withdrawal,
                "Withdrawal update",
                format!(
                    "Your withdrawal of {} {} is now {}.",
                    withdrawal.amount, withdrawal.currency, next
                ),
            )
            .with_metadata(json!({ "withdrawal_id": withdrawal_id, "status": next }))
            .also_email(),
        )
        .await?;

        tx.commit().await?;

        self.email_tutor(&updated).await;
        Ok(updated)
    }

    async fn email_tutor(&self, withdrawal: &WithdrawalRequest) {
        let tutor = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(withdrawal.tutor_id)
            .fetch_optional(&self.db_pool)
            .await;

        match tutor {
            Ok(Some(tutor)) => {
                self.mailer
                    .dispatch(
                        &tutor.email,
                        EmailTemplate::WithdrawalUpdate,
                        &json!({
                            "first_name": tutor.first_name,
                            "amount": withdrawal.amount,
                            "currency": withdrawal.currency,
                            "status": withdrawal.status,
                            "admin_notes": withdrawal.admin_notes,
                        }),
                    )
                    .await
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not load tutor {} for email: {}", withdrawal.tutor_id, e),
        }
    }
}
