use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use afrilingua_auth::ClientInfo;
use afrilingua_common::{AppError, LedgerEntryType, PaymentStatus, PayoutMethod, WithdrawalStatus};
use afrilingua_database::{run_migrations, wallet, Booking, TutorWallet, WalletTransaction};
use afrilingua_payment::{
    config::AppConfig,
    models::{ConfirmPaymentRequest, CreateWithdrawalRequest, WithdrawalDecisionRequest},
    payouts::WithdrawalService,
    services::{AppState, PaymentService},
};

async fn test_state() -> Option<AppState> {
    // Skip test if no database is available
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            println!("Skipping database test - DATABASE_URL not set");
            return None;
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");
    run_migrations(&pool).await.expect("Failed to run migrations");
    Some(AppState::new(pool, AppConfig::from_env()).expect("state"))
}

async fn insert_user(pool: &PgPool, role: &str) -> Uuid {
    let user_id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (user_id, email, hashed_password, role) VALUES ($1, $2, $3, $4)")
        .bind(user_id)
        .bind(format!("{}-{}@example.com", role, user_id))
        .bind("hashed_password")
        .bind(role)
        .execute(pool)
        .await
        .expect("Failed to insert test user");
    user_id
}

/// A pending booking of `amount` with a pending Stripe payment against it.
async fn insert_pending_payment(pool: &PgPool, student_id: Uuid, tutor_id: Uuid, amount: Decimal) -> (Uuid, Uuid) {
    let course_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO courses (course_id, title, description, created_by, price, is_published) VALUES ($1, 'Yoruba', '', $2, $3, TRUE)",
    )
    .bind(course_id)
    .bind(tutor_id)
    .bind(amount)
    .execute(pool)
    .await
    .expect("Failed to insert course");

    let slot_id = Uuid::new_v4();
    let start = Utc::now() + Duration::days(7);
    sqlx::query(
        "INSERT INTO availability_slots (slot_id, tutor_id, start_time, end_time, is_booked) VALUES ($1, $2, $3, $4, TRUE)",
    )
    .bind(slot_id)
    .bind(tutor_id)
    .bind(start)
    .bind(start + Duration::hours(1))
    .execute(pool)
    .await
    .expect("Failed to insert slot");

    let booking_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO bookings (booking_id, student_id, tutor_id, course_id, slot_id, status, amount) VALUES ($1, $2, $3, $4, $5, 'pending', $6)",
    )
    .bind(booking_id)
    .bind(student_id)
    .bind(tutor_id)
    .bind(course_id)
    .bind(slot_id)
    .bind(amount)
    .execute(pool)
    .await
    .expect("Failed to insert booking");

    let payment_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO payments (payment_id, booking_id, user_id, provider, amount, payment_intent_id) VALUES ($1, $2, $3, 'stripe', $4, $5)",
    )
    .bind(payment_id)
    .bind(booking_id)
    .bind(student_id)
    .bind(amount)
    .bind(format!("stripe_pi_{}", payment_id.simple()))
    .execute(pool)
    .await
    .expect("Failed to insert payment");

    (booking_id, payment_id)
}

async fn wallet_of(pool: &PgPool, tutor_id: Uuid) -> TutorWallet {
    sqlx::query_as::<_, TutorWallet>("SELECT * FROM tutor_wallets WHERE tutor_id = $1")
        .bind(tutor_id)
        .fetch_one(pool)
        .await
        .expect("wallet exists")
}

async fn ledger_of(pool: &PgPool, tutor_id: Uuid) -> Vec<WalletTransaction> {
    sqlx::query_as::<_, WalletTransaction>(
        "SELECT * FROM wallet_transactions WHERE tutor_id = $1 ORDER BY created_at",
    )
    .bind(tutor_id)
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_confirming_a_payment_twice_credits_the_tutor_once() {
    let Some(state) = test_state().await else { return };
    let pool = state.db_pool.clone();
    let student_id = insert_user(&pool, "student").await;
    let tutor_id = insert_user(&pool, "tutor").await;
    let (booking_id, payment_id) = insert_pending_payment(&pool, student_id, tutor_id, dec!(50)).await;
    let service = PaymentService::new(&state);

    let first = service
        .confirm_payment(
            payment_id,
            ConfirmPaymentRequest { transaction_id: Some("txn_first".to_string()) },
            &ClientInfo::default(),
        )
        .await
        .expect("first confirmation");
    assert_eq!(first.status().unwrap(), PaymentStatus::Succeeded);

    let repeat = service
        .confirm_payment(
            payment_id,
            ConfirmPaymentRequest { transaction_id: Some("txn_second".to_string()) },
            &ClientInfo::default(),
        )
        .await
        .expect("repeat confirmation is a no-op");
    assert_eq!(repeat.transaction_id.as_deref(), Some("txn_first"));

    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1")
        .bind(booking_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(booking.status, "paid");
    assert_eq!(booking.platform_fee + booking.tutor_earnings, dec!(50));

    let wallet = wallet_of(&pool, tutor_id).await;
    assert_eq!(wallet.pending_balance, booking.tutor_earnings);
    assert_eq!(wallet.available_balance, Decimal::ZERO);

    let ledger = ledger_of(&pool, tutor_id).await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].entry_type, LedgerEntryType::Earning.as_str());
    assert_eq!(ledger[0].reference_id, Some(booking_id));
}

#[tokio::test]
async fn test_rejected_withdrawal_is_credited_back() {
    let Some(state) = test_state().await else { return };
    let pool = state.db_pool.clone();
    let tutor_id = insert_user(&pool, "tutor").await;
    let admin_id = insert_user(&pool, "admin").await;

    let mut tx = pool.begin().await.unwrap();
    for entry_type in [LedgerEntryType::Earning, LedgerEntryType::Release] {
        wallet::apply(&mut tx, &wallet::LedgerMove::new(tutor_id, entry_type, dec!(100), "USD"))
            .await
            .unwrap();
    }
    tx.commit().await.unwrap();

    let service = WithdrawalService::new(pool.clone(), state.mailer.clone(), "USD");
    let withdrawal = service
        .request(
            tutor_id,
            CreateWithdrawalRequest {
                amount: dec!(40),
                payout_method: PayoutMethod::PayPal,
                payout_details: json!({ "email": "tutor@example.com" }),
            },
            &ClientInfo::default(),
        )
        .await
        .expect("withdrawal requested");
    assert_eq!(wallet_of(&pool, tutor_id).await.available_balance, dec!(60));

    let rejected = service
        .transition(
            admin_id,
            withdrawal.withdrawal_id,
            WithdrawalStatus::Rejected,
            WithdrawalDecisionRequest {
                admin_notes: Some("Payout details do not match".to_string()),
                transaction_id: None,
            },
            &ClientInfo::default(),
        )
        .await
        .expect("withdrawal rejected");
    assert_eq!(rejected.status, WithdrawalStatus::Rejected.as_str());
    assert!(rejected.processed_at.is_some());

    assert_eq!(wallet_of(&pool, tutor_id).await.available_balance, dec!(100));
    let ledger = ledger_of(&pool, tutor_id).await;
    let reversal = ledger
        .iter()
        .find(|entry| entry.entry_type == LedgerEntryType::WithdrawalReversal.as_str())
        .expect("reversal entry");
    assert_eq!(reversal.amount, dec!(40));
    assert_eq!(reversal.reference_id, Some(withdrawal.withdrawal_id));

    let again = service
        .transition(
            admin_id,
            withdrawal.withdrawal_id,
            WithdrawalStatus::Rejected,
            WithdrawalDecisionRequest { admin_notes: None, transaction_id: None },
            &ClientInfo::default(),
        )
        .await;
    assert!(matches!(again, Err(AppError::Validation(_))));
}
