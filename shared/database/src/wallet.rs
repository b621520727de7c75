//! Tutor wallet ledger.
//!
//! Every balance change runs on a connection that is already inside a
//! transaction: the wallet row is locked with `FOR UPDATE`, mutated through
//! the pure `TutorWallet` rules, written back, and a `wallet_transactions`
//! entry records the amount and the resulting balances.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use afrilingua_common::{AppError, LedgerEntryType};

use crate::models::{TutorWallet, WalletTransaction};

/// Locks the tutor's wallet row, creating an empty wallet first if the tutor
/// has none yet.
pub async fn lock_or_create(
    conn: &mut PgConnection,
    tutor_id: Uuid,
    currency: &str,
) -> Result<TutorWallet, AppError> {
    let fresh = TutorWallet::empty(tutor_id, currency);
    sqlx::query(
        r#"
        INSERT INTO tutor_wallets (wallet_id, tutor_id, currency, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        ON CONFLICT (tutor_id) DO NOTHING
        "#,
    )
    .bind(fresh.wallet_id)
    .bind(tutor_id)
    .bind(currency)
    .bind(fresh.created_at)
    .execute(&mut *conn)
    .await?;

    let wallet = sqlx::query_as::<_, TutorWallet>(
        "SELECT * FROM tutor_wallets WHERE tutor_id = $1 FOR UPDATE",
    )
    .bind(tutor_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(wallet)
}

pub async fn persist(conn: &mut PgConnection, wallet: &TutorWallet) -> Result<TutorWallet, AppError> {
    let wallet = sqlx::query_as::<_, TutorWallet>(
        r#"
        UPDATE tutor_wallets
        SET available_balance = $2, pending_balance = $3, total_earned = $4, updated_at = $5
        WHERE wallet_id = $1
        RETURNING *
        "#,
    )
    .bind(wallet.wallet_id)
    .bind(wallet.available_balance)
    .bind(wallet.pending_balance)
    .bind(wallet.total_earned)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(wallet)
}

pub async fn record_entry(
    conn: &mut PgConnection,
    wallet: &TutorWallet,
    entry_type: LedgerEntryType,
    amount: Decimal,
    reference_id: Option<Uuid>,
    description: &str,
) -> Result<WalletTransaction, AppError> {
    let entry = sqlx::query_as::<_, WalletTransaction>(
        r#"
        INSERT INTO wallet_transactions
            (transaction_id, wallet_id, tutor_id, entry_type, amount,
             available_after, pending_after, reference_id, description, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(wallet.wallet_id)
    .bind(wallet.tutor_id)
    .bind(entry_type.as_str())
    .bind(amount)
    .bind(wallet.available_balance)
    .bind(wallet.pending_balance)
    .bind(reference_id)
    .bind(description)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(entry)
}

/// One ledger movement: what happens to the balances and how it is recorded.
#[derive(Debug, Clone)]
pub struct LedgerMove {
    pub tutor_id: Uuid,
    pub entry_type: LedgerEntryType,
    pub amount: Decimal,
    pub currency: String,
    pub reference_id: Option<Uuid>,
    pub description: String,
}

impl LedgerMove {
    pub fn new(tutor_id: Uuid, entry_type: LedgerEntryType, amount: Decimal, currency: &str) -> Self {
        Self {
            tutor_id,
            entry_type,
            amount,
            currency: currency.to_string(),
            reference_id: None,
            description: String::new(),
        }
    }

    pub fn reference(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn apply_to(&self, wallet: &mut TutorWallet) -> Result<(), AppError> {
        match self.entry_type {
            LedgerEntryType::Earning => wallet.add_earnings(self.amount, true),
            LedgerEntryType::Release => wallet.release_pending(self.amount),
            LedgerEntryType::Withdrawal => wallet.withdraw(self.amount),
            LedgerEntryType::WithdrawalReversal => wallet.credit_available(self.amount),
            LedgerEntryType::Refund => wallet.reverse_pending(self.amount),
        }
    }
}

/// Applies `movement` to the locked wallet and records it. The caller owns
/// the transaction and commits it together with its own writes.
pub async fn apply(
    conn: &mut PgConnection,
    movement: &LedgerMove,
) -> Result<(TutorWallet, WalletTransaction), AppError> {
    let mut wallet = lock_or_create(conn, movement.tutor_id, &movement.currency).await?;
    movement.apply_to(&mut wallet)?;
    let wallet = persist(conn, &wallet).await?;
    let entry = record_entry(
        conn,
        &wallet,
        movement.entry_type,
        movement.amount,
        movement.reference_id,
        &movement.description,
    )
    .await?;

    tracing::debug!(
        "Wallet {} {} {}: available={} pending={}",
        wallet.tutor_id,
        movement.entry_type,
        movement.amount,
        wallet.available_balance,
        wallet.pending_balance
    );

    Ok((wallet, entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn each_entry_type_moves_the_matching_balance() {
        let tutor_id = Uuid::new_v4();
        let mut wallet = TutorWallet::empty(tutor_id, "USD");

        LedgerMove::new(tutor_id, LedgerEntryType::Earning, dec!(85), "USD")
            .apply_to(&mut wallet)
            .unwrap();
        assert_eq!(wallet.pending_balance, dec!(85));

        LedgerMove::new(tutor_id, LedgerEntryType::Release, dec!(85), "USD")
            .apply_to(&mut wallet)
            .unwrap();
        assert_eq!(wallet.available_balance, dec!(85));

        LedgerMove::new(tutor_id, LedgerEntryType::Withdrawal, dec!(60), "USD")
            .apply_to(&mut wallet)
            .unwrap();
        LedgerMove::new(tutor_id, LedgerEntryType::WithdrawalReversal, dec!(60), "USD")
            .apply_to(&mut wallet)
            .unwrap();
        assert_eq!(wallet.available_balance, dec!(85));
        assert_eq!(wallet.total_earned, dec!(85));
    }

    #[test]
    fn overdrawn_withdrawal_leaves_wallet_untouched() {
        let tutor_id = Uuid::new_v4();
        let mut wallet = TutorWallet::empty(tutor_id, "USD");
        let result = LedgerMove::new(tutor_id, LedgerEntryType::Withdrawal, dec!(1), "USD")
            .reference(Uuid::new_v4())
            .describe("Payout")
            .apply_to(&mut wallet);

        assert!(matches!(result, Err(AppError::InsufficientFunds(_))));
        assert_eq!(wallet.available_balance, Decimal::ZERO);
    }
}
