use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use afrilingua_auth::{Claims, ClientInfo};
use afrilingua_bookings::{
    config::AppConfig,
    models::{CancelBookingRequest, CreateBookingRequest, CreateSubscriptionRequest},
    services::{AppState, BookingService},
    sessions::SessionService,
    subscriptions::SubscriptionService,
};
use afrilingua_common::{AppError, LedgerEntryType, UserRole};
use afrilingua_database::{run_migrations, wallet, Subscription, TutorWallet, WalletTransaction};

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

async fn insert_approved_tutor(pool: &PgPool) -> Uuid {
    let tutor_id = insert_user(pool, "tutor").await;
    sqlx::query(
        "INSERT INTO tutor_profiles (user_id, price_per_lesson, approval_status) VALUES ($1, 30, 'approved')",
    )
    .bind(tutor_id)
    .execute(pool)
    .await
    .expect("Failed to insert tutor profile");
    tutor_id
}

async fn insert_course(pool: &PgPool, created_by: Uuid, price: Decimal) -> Uuid {
    let course_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO courses (course_id, title, description, created_by, price, is_published) VALUES ($1, 'Swahili basics', '', $2, $3, TRUE)",
    )
    .bind(course_id)
    .bind(created_by)
    .bind(price)
    .execute(pool)
    .await
    .expect("Failed to insert course");
    course_id
}

async fn insert_slot(pool: &PgPool, tutor_id: Uuid, is_booked: bool) -> Uuid {
    let slot_id = Uuid::new_v4();
    let start = Utc::now() + Duration::days(7);
    sqlx::query(
        "INSERT INTO availability_slots (slot_id, tutor_id, start_time, end_time, is_booked) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(slot_id)
    .bind(tutor_id)
    .bind(start)
    .bind(start + Duration::hours(1))
    .bind(is_booked)
    .execute(pool)
    .await
    .expect("Failed to insert slot");
    slot_id
}

/// A booking already paid for: succeeded payment, split recorded, earnings
/// pending in the tutor's wallet.
async fn insert_paid_booking(pool: &PgPool, student_id: Uuid, tutor_id: Uuid) -> Uuid {
    let course_id = insert_course(pool, tutor_id, dec!(50)).await;
    let slot_id = insert_slot(pool, tutor_id, true).await;

    let booking_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO bookings
            (booking_id, student_id, tutor_id, course_id, slot_id, status, amount, platform_fee, tutor_earnings)
        VALUES ($1, $2, $3, $4, $5, 'paid', 50, 10, 40)
        "#,
    )
    .bind(booking_id)
    .bind(student_id)
    .bind(tutor_id)
    .bind(course_id)
    .bind(slot_id)
    .execute(pool)
    .await
    .expect("Failed to insert booking");

    sqlx::query(
        "INSERT INTO payments (payment_id, booking_id, user_id, amount, status, payment_intent_id) VALUES ($1, $2, $3, 50, 'succeeded', $4)",
    )
    .bind(Uuid::new_v4())
    .bind(booking_id)
    .bind(student_id)
    .bind(format!("stripe_pi_{}", booking_id.simple()))
    .execute(pool)
    .await
    .expect("Failed to insert payment");

    let mut tx = pool.begin().await.unwrap();
    wallet::apply(
        &mut tx,
        &wallet::LedgerMove::new(tutor_id, LedgerEntryType::Earning, dec!(40), "USD").reference(booking_id),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    booking_id
}

fn claims(state: &AppState, user_id: Uuid, role: UserRole) -> Claims {
    Claims::new(user_id, format!("{}@example.com", user_id), role, &state.config.jwt)
}

async fn wallet_of(pool: &PgPool, tutor_id: Uuid) -> TutorWallet {
    sqlx::query_as::<_, TutorWallet>("SELECT * FROM tutor_wallets WHERE tutor_id = $1")
        .bind(tutor_id)
        .fetch_one(pool)
        .await
        .expect("wallet exists")
}

async fn ledger_entry(pool: &PgPool, tutor_id: Uuid, entry_type: LedgerEntryType) -> Option<WalletTransaction> {
    sqlx::query_as::<_, WalletTransaction>(
        "SELECT * FROM wallet_transactions WHERE tutor_id = $1 AND entry_type = $2",
    )
    .bind(tutor_id)
    .bind(entry_type.as_str())
    .fetch_optional(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_course_must_belong_to_the_slot_tutor() {
    let Some(state) = test_state().await else { return };
    let pool = state.db_pool.clone();
    let student_id = insert_user(&pool, "student").await;
    let tutor_id = insert_approved_tutor(&pool).await;
    let other_tutor_id = insert_approved_tutor(&pool).await;

    let slot_id = insert_slot(&pool, tutor_id, false).await;
    let foreign_course = insert_course(&pool, other_tutor_id, dec!(5)).await;
    let own_course = insert_course(&pool, tutor_id, dec!(45)).await;
    let service = BookingService::new(&state);

    let mismatched = service
        .create_booking(
            student_id,
            CreateBookingRequest { course_id: foreign_course, availability_slot_id: slot_id },
            &ClientInfo::default(),
        )
        .await;
    assert!(matches!(mismatched, Err(AppError::Validation(_))));

    let is_booked: bool = sqlx::query_scalar("SELECT is_booked FROM availability_slots WHERE slot_id = $1")
        .bind(slot_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(!is_booked);

    let booked = service
        .create_booking(
            student_id,
            CreateBookingRequest { course_id: own_course, availability_slot_id: slot_id },
            &ClientInfo::default(),
        )
        .await
        .expect("booking with the tutor's own course");
    assert_eq!(booked.booking.amount, dec!(45));
    assert_eq!(booked.booking.status, "pending");
}

#[tokio::test]
async fn test_lapsed_subscription_makes_way_for_a_new_one() {
    let Some(state) = test_state().await else { return };
    let pool = state.db_pool.clone();
    let student_id = insert_user(&pool, "student").await;
    let tutor_id = insert_approved_tutor(&pool).await;

    let lapsed_id = Uuid::new_v4();
    let started = Utc::now() - Duration::days(40);
    sqlx::query(
        r#"
        INSERT INTO subscriptions
            (subscription_id, student_id, tutor_id, lessons_per_month, price, commission_rate,
             tutor_share, status, current_period_start, current_period_end)
        VALUES ($1, $2, $3, 4, 80, 0.33, 53.60, 'active', $4, $5)
        "#,
    )
    .bind(lapsed_id)
    .bind(student_id)
    .bind(tutor_id)
    .bind(started)
    .bind(started + Duration::days(30))
    .execute(&pool)
    .await
    .expect("Failed to insert lapsed subscription");

    let service = SubscriptionService::new(pool.clone());
    let request = || CreateSubscriptionRequest {
        tutor_id,
        lessons_per_month: 4,
        price: dec!(80),
    };

    let renewed = service
        .create(student_id, request(), "USD")
        .await
        .expect("a lapsed period does not block a new subscription");
    assert_eq!(renewed.status, "active");
    assert_ne!(renewed.subscription_id, lapsed_id);

    let lapsed = sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE subscription_id = $1")
        .bind(lapsed_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(lapsed.status, "expired");

    let duplicate = service.create(student_id, request(), "USD").await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_cancelling_a_paid_booking_refunds_it() {
    let Some(state) = test_state().await else { return };
    let pool = state.db_pool.clone();
    let student_id = insert_user(&pool, "student").await;
    let tutor_id = insert_approved_tutor(&pool).await;
    let booking_id = insert_paid_booking(&pool, student_id, tutor_id).await;

    let refunded = BookingService::new(&state)
        .cancel_booking(
            &claims(&state, student_id, UserRole::Student),
            booking_id,
            CancelBookingRequest { reason: Some("Schedule clash".to_string()) },
            &ClientInfo::default(),
        )
        .await
        .expect("paid booking cancelled");
    assert_eq!(refunded.booking.status, "refunded");
    assert_eq!(refunded.booking.refund_reason.as_deref(), Some("Schedule clash"));

    let payment_status: String = sqlx::query_scalar("SELECT status FROM payments WHERE booking_id = $1")
        .bind(booking_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(payment_status, "refunded");

    let is_booked: bool = sqlx::query_scalar("SELECT is_booked FROM availability_slots WHERE slot_id = $1")
        .bind(refunded.booking.slot_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(!is_booked);

    let wallet = wallet_of(&pool, tutor_id).await;
    assert_eq!(wallet.pending_balance, Decimal::ZERO);
    assert_eq!(wallet.available_balance, Decimal::ZERO);

    let refund = ledger_entry(&pool, tutor_id, LedgerEntryType::Refund)
        .await
        .expect("refund entry");
    assert_eq!(refund.amount, dec!(40));
    assert_eq!(refund.reference_id, Some(booking_id));
}

#[tokio::test]
async fn test_completed_lesson_releases_pending_earnings() {
    let Some(state) = test_state().await else { return };
    let pool = state.db_pool.clone();
    let student_id = insert_user(&pool, "student").await;
    let tutor_id = insert_approved_tutor(&pool).await;
    let admin_id = insert_user(&pool, "admin").await;
    let booking_id = insert_paid_booking(&pool, student_id, tutor_id).await;

    let confirmed = BookingService::new(&state)
        .confirm_booking(tutor_id, booking_id)
        .await
        .expect("tutor confirms");
    assert_eq!(confirmed.booking.status, "confirmed");
    assert!(confirmed.booking.meeting_link.is_some());

    let session_id: Uuid = sqlx::query_scalar("SELECT session_id FROM lesson_sessions WHERE booking_id = $1")
        .bind(booking_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    let sessions = SessionService::new(pool.clone(), state.config.clone());
    let early = sessions
        .complete_session(&claims(&state, student_id, UserRole::Student), session_id)
        .await;
    assert!(matches!(early, Err(AppError::Validation(_))));

    let completed = sessions
        .complete_session(&claims(&state, admin_id, UserRole::Admin), session_id)
        .await
        .expect("admin completes the lesson");
    assert_eq!(completed.session.status, "completed");

    let wallet = wallet_of(&pool, tutor_id).await;
    assert_eq!(wallet.pending_balance, Decimal::ZERO);
    assert_eq!(wallet.available_balance, dec!(40));

    let release = ledger_entry(&pool, tutor_id, LedgerEntryType::Release)
        .await
        .expect("release entry");
    assert_eq!(release.amount, dec!(40));

    let status: String = sqlx::query_scalar("SELECT status FROM bookings WHERE booking_id = $1")
        .bind(booking_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "completed");
}
