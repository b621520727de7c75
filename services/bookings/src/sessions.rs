//! Lesson sessions and the virtual classrooms attached to confirmed bookings.
//!
//! A session is completed by a participant once it has started, by an admin
//! at any time, or automatically once its end time plus the grace period has
//! passed. Completion is where the tutor gets paid: the booking's earnings
//! move from pending to available in the wallet ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use afrilingua_auth::Claims;
use afrilingua_common::{AppError, BookingStatus, LedgerEntryType, LessonStatus, NotificationCategory};
use afrilingua_database::{
    notifications::{create_notification, NewNotification},
    wallet::{self, LedgerMove},
    AvailabilitySlot, Booking, LessonSession, VirtualClassroom,
};

use crate::config::AppConfig;
use crate::models::*;
use crate::services::lock_booking;

pub(crate) async fn schedule_session(
    conn: &mut PgConnection,
    booking: &Booking,
    slot: &AvailabilitySlot,
) -> Result<LessonSession, AppError> {
    let now = Utc::now();
    let session = sqlx::query_as::<_, LessonSession>(
        r#"
        INSERT INTO lesson_sessions
            (session_id, booking_id, tutor_id, student_id, scheduled_start, scheduled_end,
             status, auto_confirmed, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(booking.booking_id)
    .bind(booking.tutor_id)
    .bind(booking.student_id)
    .bind(slot.start_time)
    .bind(slot.end_time)
    .bind(LessonStatus::Scheduled.as_str())
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(session)
}

pub(crate) async fn open_classroom(
    conn: &mut PgConnection,
    booking: &Booking,
    slot: &AvailabilitySlot,
    config: &AppConfig,
) -> Result<VirtualClassroom, AppError> {
    let room_name = format!("afrilingua-{}", Uuid::new_v4().simple());
    let classroom = sqlx::query_as::<_, VirtualClassroom>(
        r#"
        INSERT INTO virtual_classrooms
            (classroom_id, booking_id, room_name, join_url, opens_at, closes_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(booking.booking_id)
    .bind(&room_name)
    .bind(config.classroom_url(&room_name))
    .bind(slot.start_time - config.early_join())
    .bind(slot.end_time)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(classroom)
}

/// Moves the session and classroom of a rescheduled booking to the new slot.
pub(crate) async fn move_to_slot(
    conn: &mut PgConnection,
    booking_id: Uuid,
    slot: &AvailabilitySlot,
    config: &AppConfig,
) -> Result<(), AppError> {
    let now = Utc::now();
    sqlx::query(
        r#"
        UPDATE lesson_sessions SET scheduled_start = $2, scheduled_end = $3, updated_at = $4
        WHERE booking_id = $1 AND status = 'scheduled'
        "#,
    )
    .bind(booking_id)
    .bind(slot.start_time)
    .bind(slot.end_time)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    sqlx::query("UPDATE virtual_classrooms SET opens_at = $2, closes_at = $3 WHERE booking_id = $1")
        .bind(booking_id)
        .bind(slot.start_time - config.early_join())
        .bind(slot.end_time)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub(crate) async fn cancel_scheduled(conn: &mut PgConnection, booking_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE lesson_sessions SET status = 'cancelled', updated_at = $2 WHERE booking_id = $1 AND status = 'scheduled'",
    )
    .bind(booking_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn lock_session(conn: &mut PgConnection, session_id: Uuid) -> Result<LessonSession, AppError> {
    sqlx::query_as::<_, LessonSession>("SELECT * FROM lesson_sessions WHERE session_id = $1 FOR UPDATE")
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Lesson session not found".to_string()))
}

fn ensure_session_access(session: &LessonSession, claims: &Claims) -> Result<(), AppError> {
    let user_id = claims.user_id();
    if claims.is_admin() || session.tutor_id == user_id || session.student_id == user_id {
        Ok(())
    } else {
        Err(AppError::Authorization("You are not part of this lesson".to_string()))
    }
}

/// Completes a locked, scheduled session and settles the tutor's earnings.
async fn finalize_completion(
    conn: &mut PgConnection,
    session: &LessonSession,
    auto_confirmed: bool,
    now: DateTime<Utc>,
) -> Result<LessonSession, AppError> {
    let booking = lock_booking(conn, session.booking_id).await?;
    booking.ensure_transition(BookingStatus::Completed)?;

    let completed = sqlx::query_as::<_, LessonSession>(
        r#"
        UPDATE lesson_sessions
        SET status = $2, completed_at = $3, auto_confirmed = $4, updated_at = $3
        WHERE session_id = $1
        RETURNING *
        "#,
    )
    .bind(session.session_id)
    .bind(LessonStatus::Completed.as_str())
    .bind(now)
    .bind(auto_confirmed)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE bookings SET status = $2, updated_at = $3 WHERE booking_id = $1")
        .bind(booking.booking_id)
        .bind(BookingStatus::Completed.as_str())
        .bind(now)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "UPDATE tutor_profiles SET total_hours_taught = total_hours_taught + $2, updated_at = $3 WHERE user_id = $1",
    )
    .bind(session.tutor_id)
    .bind(completed.duration_hours())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if booking.tutor_earnings > Decimal::ZERO {
        wallet::apply(
            conn,
            &LedgerMove::new(
                booking.tutor_id,
                LedgerEntryType::Release,
                booking.tutor_earnings,
                &booking.currency,
            )
            .reference(booking.booking_id)
            .describe("Lesson completed"),
        )
        .await?;
    }

    let how = if auto_confirmed { "automatically confirmed" } else { "marked complete" };
    create_notification(
        &mut *conn,
        &NewNotification::in_app(
            session.tutor_id,
            NotificationCategory::Lesson,
            "Lesson completed",
            format!(
                "Your lesson was {}. {} {} is now available in your wallet.",
                how, booking.tutor_earnings, booking.currency
            ),
        )
        .with_metadata(json!({ "session_id": session.session_id, "booking_id": booking.booking_id })),
    )
    .await?;

    create_notification(
        &mut *conn,
        &NewNotification::in_app(
            session.student_id,
            NotificationCategory::Lesson,
            "Lesson completed",
            format!("Your lesson was {}. You can now leave a testimonial.", how),
        )
        .with_metadata(json!({ "session_id": session.session_id, "booking_id": booking.booking_id })),
    )
    .await?;

    tracing::info!(
        "Lesson session {} completed (auto_confirmed={})",
        session.session_id,
        auto_confirmed
    );
    Ok(completed)
}

pub struct SessionService {
    db_pool: PgPool,
    config: AppConfig,
}

impl SessionService {
    pub fn new(db_pool: PgPool, config: AppConfig) -> Self {
        Self { db_pool, config }
    }

    pub async fn list_sessions(&self, claims: &Claims) -> Result<Vec<SessionResponse>, AppError> {
        let sessions = sqlx::query_as::<_, LessonSession>(
            r#"
            SELECT * FROM lesson_sessions
            WHERE $1 OR tutor_id = $2 OR student_id = $2
            ORDER BY scheduled_start DESC
            "#,
        )
        .bind(claims.is_admin())
        .bind(claims.user_id())
        .fetch_all(&self.db_pool)
        .await?;

        Ok(sessions.into_iter().map(SessionResponse::from).collect())
    }

    /// Reads a session, auto-confirming it first when it is overdue.
    pub async fn get_session(&self, claims: &Claims, session_id: Uuid) -> Result<SessionResponse, AppError> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let mut session = lock_session(&mut tx, session_id).await?;
        ensure_session_access(&session, claims)?;

        if session.auto_confirm_due(now, self.config.auto_confirm_grace()) {
            session = finalize_completion(&mut tx, &session, true, now).await?;
        }

        tx.commit().await?;
        Ok(session.into())
    }

    pub async fn complete_session(&self, claims: &Claims, session_id: Uuid) -> Result<SessionResponse, AppError> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let session = lock_session(&mut tx, session_id).await?;
        ensure_session_access(&session, claims)?;

        if !session.is_scheduled() {
            return Err(AppError::Validation(format!("Lesson is already {}", session.status)));
        }
        if !claims.is_admin() && now < session.scheduled_start {
            return Err(AppError::Validation(
                "A lesson cannot be completed before it starts".to_string(),
            ));
        }

        let completed = finalize_completion(&mut tx, &session, false, now).await?;
        tx.commit().await?;
        Ok(completed.into())
    }

    /// Completes every overdue session, each in its own transaction so one
    /// failure does not hold back the rest.
    pub async fn auto_confirm_due(&self) -> Result<AutoConfirmReport, AppError> {
        let now = Utc::now();
        let grace = self.config.auto_confirm_grace();

        let due: Vec<Uuid> = sqlx::query_scalar(
            "SELECT session_id FROM lesson_sessions WHERE status = 'scheduled' AND scheduled_end < $1 ORDER BY scheduled_end",
        )
        .bind(now - grace)
        .fetch_all(&self.db_pool)
        .await?;

        let mut session_ids = Vec::new();
        for session_id in due {
            let mut tx = self.db_pool.begin().await?;
            let session = lock_session(&mut tx, session_id).await?;
            if !session.auto_confirm_due(now, grace) {
                continue;
            }

            match finalize_completion(&mut tx, &session, true, now).await {
                Ok(_) => {
                    tx.commit().await?;
                    session_ids.push(session_id);
                }
                Err(e) => tracing::warn!("Failed to auto-confirm lesson {}: {}", session_id, e),
            }
        }

        tracing::info!("Auto-confirmed {} lesson sessions", session_ids.len());
        Ok(AutoConfirmReport {
            confirmed: session_ids.len(),
            session_ids,
        })
    }

    pub async fn classroom(&self, claims: &Claims, booking_id: Uuid) -> Result<ClassroomResponse, AppError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if !claims.is_admin() && !booking.is_participant(claims.user_id()) {
            return Err(AppError::Authorization("You are not part of this booking".to_string()));
        }

        let classroom = sqlx::query_as::<_, VirtualClassroom>(
            "SELECT * FROM virtual_classrooms WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("The classroom opens once the tutor confirms the booking".to_string())
        })?;

        Ok(ClassroomResponse::at(classroom, Utc::now()))
    }
}
