use axum::extract::FromRef;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use afrilingua_auth::{Claims, ClientInfo, JwtService};
use afrilingua_common::{
    AppError, AuditAction, BookingStatus, LedgerEntryType, NotificationCategory, PaymentStatus,
};
use afrilingua_database::{
    audit::{self, AuditEntry},
    can_refund,
    notifications::{create_notification, NewNotification},
    wallet::{self, LedgerMove},
    Booking, Course, TutorProfile, User,
};
use afrilingua_mailer::{EmailTemplate, Mailer};

use crate::config::AppConfig;
use crate::models::*;
use crate::scheduling::{ensure_bookable, lock_slot, set_slot_booked};
use crate::sessions;

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

const BOOKING_DETAIL_SELECT: &str = r#"
    SELECT b.*,
           st.email AS student_email,
           tu.email AS tutor_email,
           c.title AS course_title,
           s.start_time AS slot_start,
           s.end_time AS slot_end
    FROM bookings b
    JOIN users st ON st.user_id = b.student_id
    JOIN users tu ON tu.user_id = b.tutor_id
    JOIN courses c ON c.course_id = b.course_id
    JOIN availability_slots s ON s.slot_id = b.slot_id
"#;

pub(crate) async fn lock_booking(conn: &mut PgConnection, booking_id: Uuid) -> Result<Booking, AppError> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1 FOR UPDATE")
        .bind(booking_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

fn ensure_participant(booking: &Booking, claims: &Claims) -> Result<(), AppError> {
    if booking.is_participant(claims.user_id()) {
        Ok(())
    } else {
        Err(AppError::Authorization("You are not part of this booking".to_string()))
    }
}

/// The participant on the other side of the booking from `user_id`.
fn counterpart(booking: &Booking, user_id: Uuid) -> Uuid {
    if booking.student_id == user_id {
        booking.tutor_id
    } else {
        booking.student_id
    }
}

/// Price of one lesson: the course price, or the tutor's own rate for free
/// courses.
pub fn lesson_price(course: &Course, tutor: &TutorProfile) -> Decimal {
    if course.is_free() {
        tutor.price_per_lesson
    } else {
        course.price
    }
}

/// A slot can only be booked for a course its own tutor created.
pub fn ensure_course_taught_by(course: &Course, tutor_id: Uuid) -> Result<(), AppError> {
    if course.created_by == tutor_id {
        Ok(())
    } else {
        Err(AppError::Validation("This course is not taught by the slot's tutor".to_string()))
    }
}

pub struct BookingService {
    db_pool: PgPool,
    mailer: Mailer,
    config: AppConfig,
}

impl BookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db_pool: state.db_pool.clone(),
            mailer: state.mailer.clone(),
            config: state.config.clone(),
        }
    }

    fn cutoff_hours(&self) -> i64 {
        self.config.platform.booking_refund_cutoff_hours
    }

    async fn detail(&self, booking_id: Uuid) -> Result<BookingDetail, AppError> {
        sqlx::query_as::<_, BookingDetail>(&format!("{} WHERE b.booking_id = $1", BOOKING_DETAIL_SELECT))
            .bind(booking_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    pub async fn create_booking(
        &self,
        student_id: Uuid,
        request: CreateBookingRequest,
        client: &ClientInfo,
    ) -> Result<BookingDetail, AppError> {
        let mut tx = self.db_pool.begin().await?;

        let slot = lock_slot(&mut tx, request.availability_slot_id).await?;
        ensure_bookable(&slot)?;

        let tutor = sqlx::query_as::<_, TutorProfile>("SELECT * FROM tutor_profiles WHERE user_id = $1")
            .bind(slot.tutor_id)
            .fetch_optional(&mut *tx)
            .await?
            .filter(TutorProfile::is_approved)
            .ok_or_else(|| AppError::Validation("Tutor is not approved for bookings".to_string()))?;

        let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE course_id = $1")
            .bind(request.course_id)
            .fetch_optional(&mut *tx)
            .await?
            .filter(|course| course.is_published)
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;
        ensure_course_taught_by(&course, slot.tutor_id)?;

        let amount = lesson_price(&course, &tutor);
        let now = Utc::now();

        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings
                (booking_id, student_id, tutor_id, course_id, slot_id, status, amount,
                 platform_fee, tutor_earnings, currency, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(slot.tutor_id)
        .bind(course.course_id)
        .bind(slot.slot_id)
        .bind(BookingStatus::Pending.as_str())
        .bind(amount)
        .bind(&self.config.platform.default_currency)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        set_slot_booked(&mut tx, slot.slot_id, true).await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(
                Some(student_id),
                AuditAction::BookingCreated,
                format!("Booked {} for {}", course.title, slot.start_time),
            )
            .client(client)
            .metadata(json!({ "booking_id": booking.booking_id, "amount": amount })),
        )
        .await?;

        create_notification(
            &mut *tx,
            &NewNotification::in_app(
                slot.tutor_id,
                NotificationCategory::Booking,
                "New booking",
                format!("A student booked {} on {}.", course.title, slot.start_time.format("%Y-%m-%d %H:%M UTC")),
            )
            .with_link(self.config.booking_link(booking.booking_id))
            .with_metadata(json!({ "booking_id": booking.booking_id })),
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Booking {} created by student {}", booking.booking_id, student_id);
        self.detail(booking.booking_id).await
    }

    pub async fn list_bookings(&self, claims: &Claims, query: BookingListQuery) -> Result<Vec<BookingDetail>, AppError> {
        let bookings = sqlx::query_as::<_, BookingDetail>(&format!(
            r#"{}
            WHERE ($1 OR b.student_id = $2 OR b.tutor_id = $2)
              AND ($3::TEXT IS NULL OR b.status = $3)
            ORDER BY b.created_at DESC
            "#,
            BOOKING_DETAIL_SELECT
        ))
        .bind(claims.is_admin())
        .bind(claims.user_id())
        .bind(query.status.map(|s| s.as_str()))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(bookings)
    }

    pub async fn get_booking(&self, claims: &Claims, booking_id: Uuid) -> Result<BookingDetail, AppError> {
        let detail = self.detail(booking_id).await?;
        if !claims.is_admin() {
            ensure_participant(&detail.booking, claims)?;
        }
        Ok(detail)
    }

    /// Tutor accepts a paid booking: the classroom and lesson session are
    /// created and the student is told where to join.
    pub async fn confirm_booking(&self, tutor_id: Uuid, booking_id: Uuid) -> Result<BookingDetail, AppError> {
        let mut tx = self.db_pool.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;
        if booking.tutor_id != tutor_id {
            return Err(AppError::Authorization(
                "Only the booking's tutor can confirm it".to_string(),
            ));
        }
        booking.ensure_transition(BookingStatus::Confirmed)?;

        let slot = lock_slot(&mut tx, booking.slot_id).await?;
        let classroom = sessions::open_classroom(&mut tx, &booking, &slot, &self.config).await?;
        sessions::schedule_session(&mut tx, &booking, &slot).await?;

        sqlx::query(
            "UPDATE bookings SET status = $2, meeting_link = $3, updated_at = $4 WHERE booking_id = $1",
        )
        .bind(booking_id)
        .bind(BookingStatus::Confirmed.as_str())
        .bind(&classroom.join_url)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        create_notification(
            &mut *tx,
            &NewNotification::in_app(
                booking.student_id,
                NotificationCategory::Booking,
                "Booking confirmed",
                "Your tutor confirmed the lesson. The classroom link is ready.",
            )
            .with_link(self.config.booking_link(booking_id))
            .with_metadata(json!({ "booking_id": booking_id, "join_url": classroom.join_url }))
            .also_email(),
        )
        .await?;

        tx.commit().await?;

        let detail = self.detail(booking_id).await?;
        self.send_confirmation(&detail, &classroom.join_url).await;
        Ok(detail)
    }

    async fn send_confirmation(&self, detail: &BookingDetail, join_url: &str) {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ANY($1)")
            .bind(vec![detail.booking.student_id, detail.booking.tutor_id])
            .fetch_all(&self.db_pool)
            .await;

        let users = match users {
            Ok(users) => users,
            Err(e) => {
                tracing::warn!("Could not load booking participants for email: {}", e);
                return;
            }
        };
        let find = |id: Uuid| users.iter().find(|u| u.user_id == id);
        let (Some(student), Some(tutor)) = (find(detail.booking.student_id), find(detail.booking.tutor_id)) else {
            return;
        };

        self.mailer
            .dispatch(
                &student.email,
                EmailTemplate::BookingConfirmed,
                &json!({
                    "first_name": student.first_name,
                    "tutor_name": tutor.full_name(),
                    "course_title": detail.course_title,
                    "start_time": detail.slot_start.format("%A %d %B %Y, %H:%M UTC").to_string(),
                    "join_url": join_url,
                }),
            )
            .await;
    }

    /// Unpaid bookings are cancelled. Paid or confirmed bookings are refunded:
    /// the tutor's earnings come back out of the wallet and the payment is
    /// marked refunded. Either way the slot opens up again.
    pub async fn cancel_booking(
        &self,
        claims: &Claims,
        booking_id: Uuid,
        request: CancelBookingRequest,
        client: &ClientInfo,
    ) -> Result<BookingDetail, AppError> {
        let mut tx = self.db_pool.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;
        ensure_participant(&booking, claims)?;

        let slot = lock_slot(&mut tx, booking.slot_id).await?;
        let now = Utc::now();
        if !can_refund(slot.start_time, now, self.cutoff_hours()) {
            return Err(AppError::Validation(format!(
                "Bookings can only be cancelled more than {} hours before the lesson starts",
                self.cutoff_hours()
            )));
        }

        let next = if booking.status()?.is_paid() {
            BookingStatus::Refunded
        } else {
            BookingStatus::Cancelled
        };
        booking.ensure_transition(next)?;

        if next == BookingStatus::Refunded {
            if booking.tutor_earnings > Decimal::ZERO {
                wallet::apply(
                    &mut tx,
                    &LedgerMove::new(
                        booking.tutor_id,
                        LedgerEntryType::Refund,
                        booking.tutor_earnings,
                        &booking.currency,
                    )
                    .reference(booking_id)
                    .describe("Booking refunded"),
                )
                .await?;
            }

            sqlx::query(
                "UPDATE payments SET status = $2, updated_at = $3 WHERE booking_id = $1 AND status = $4",
            )
            .bind(booking_id)
            .bind(PaymentStatus::Refunded.as_str())
            .bind(now)
            .bind(PaymentStatus::Succeeded.as_str())
            .execute(&mut *tx)
            .await?;

            sessions::cancel_scheduled(&mut tx, booking_id).await?;
        }

        sqlx::query(
            "UPDATE bookings SET status = $2, refund_reason = $3, updated_at = $4 WHERE booking_id = $1",
        )
        .bind(booking_id)
        .bind(next.as_str())
        .bind(&request.reason)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        set_slot_booked(&mut tx, slot.slot_id, false).await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(
                Some(claims.user_id()),
                AuditAction::BookingCancelled,
                format!("Booking {} {}", booking_id, next),
            )
            .client(client)
            .metadata(json!({ "booking_id": booking_id, "reason": request.reason })),
        )
        .await?;

        create_notification(
            &mut *tx,
            &NewNotification::in_app(
                counterpart(&booking, claims.user_id()),
                NotificationCategory::Booking,
                "Booking cancelled",
                format!(
                    "The lesson on {} was cancelled.",
                    slot.start_time.format("%Y-%m-%d %H:%M UTC")
                ),
            )
            .with_link(self.config.booking_link(booking_id))
            .with_metadata(json!({ "booking_id": booking_id, "status": next })),
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Booking {} is now {}", booking_id, next);
        self.detail(booking_id).await
    }

    pub async fn reschedule_booking(
        &self,
        claims: &Claims,
        booking_id: Uuid,
        request: RescheduleBookingRequest,
    ) -> Result<BookingDetail, AppError> {
        let mut tx = self.db_pool.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;
        ensure_participant(&booking, claims)?;

        if booking.status()?.is_terminal() {
            return Err(AppError::Validation(format!(
                "A {} booking cannot be rescheduled",
                booking.status
            )));
        }

        let current = lock_slot(&mut tx, booking.slot_id).await?;
        if !can_refund(current.start_time, Utc::now(), self.cutoff_hours()) {
            return Err(AppError::Validation(format!(
                "Bookings can only be rescheduled more than {} hours before the lesson starts",
                self.cutoff_hours()
            )));
        }

        if request.availability_slot_id == current.slot_id {
            return Err(AppError::Validation("The booking is already on this slot".to_string()));
        }

        let target = lock_slot(&mut tx, request.availability_slot_id).await?;
        if target.tutor_id != booking.tutor_id {
            return Err(AppError::Validation(
                "The new slot must belong to the same tutor".to_string(),
            ));
        }
        ensure_bookable(&target)?;

        set_slot_booked(&mut tx, current.slot_id, false).await?;
        set_slot_booked(&mut tx, target.slot_id, true).await?;

        sqlx::query(
            "UPDATE bookings SET slot_id = $2, reschedule_reason = $3, updated_at = $4 WHERE booking_id = $1",
        )
        .bind(booking_id)
        .bind(target.slot_id)
        .bind(&request.reason)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sessions::move_to_slot(&mut tx, booking_id, &target, &self.config).await?;

        create_notification(
            &mut *tx,
            &NewNotification::in_app(
                counterpart(&booking, claims.user_id()),
                NotificationCategory::Booking,
                "Booking rescheduled",
                format!(
                    "The lesson moved from {} to {}.",
                    current.start_time.format("%Y-%m-%d %H:%M UTC"),
                    target.start_time.format("%Y-%m-%d %H:%M UTC")
                ),
            )
            .with_link(self.config.booking_link(booking_id))
            .with_metadata(json!({ "booking_id": booking_id, "reason": request.reason })),
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Booking {} moved to slot {}", booking_id, target.slot_id);
        self.detail(booking_id).await
    }

    pub async fn refund_eligibility(&self, claims: &Claims, booking_id: Uuid) -> Result<RefundEligibility, AppError> {
        let detail = self.get_booking(claims, booking_id).await?;
        Ok(RefundEligibility::at(detail.slot_start, Utc::now(), self.cutoff_hours()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn course(price: Decimal) -> Course {
        let now = Utc::now();
        Course {
            course_id: Uuid::new_v4(),
            title: "Amharic script".to_string(),
            description: String::new(),
            category: "language".to_string(),
            image_url: None,
            created_by: Uuid::new_v4(),
            price,
            is_published: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn tutor(price_per_lesson: Decimal) -> TutorProfile {
        let now = Utc::now();
        TutorProfile {
            user_id: Uuid::new_v4(),
            bio: String::new(),
            skills: String::new(),
            languages: String::new(),
            price_per_lesson,
            hourly_rate: Decimal::ZERO,
            total_hours_taught: Decimal::ZERO,
            instant_booking: false,
            approval_status: "approved".to_string(),
            cv_url: None,
            certificate_url: None,
            rating: Decimal::ZERO,
            total_ratings: 0,
            courses_taught: 0,
            is_featured: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn free_courses_are_charged_at_the_tutor_rate() {
        assert_eq!(lesson_price(&course(dec!(0)), &tutor(dec!(25))), dec!(25));
        assert_eq!(lesson_price(&course(dec!(40)), &tutor(dec!(25))), dec!(40));
    }

    #[test]
    fn courses_are_booked_with_their_own_tutor() {
        let course = course(dec!(40));
        assert!(ensure_course_taught_by(&course, course.created_by).is_ok());

        let err = ensure_course_taught_by(&course, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn counterpart_is_the_other_participant() {
        let now = Utc::now();
        let booking = Booking {
            booking_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            tutor_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            slot_id: Uuid::new_v4(),
            status: "pending".to_string(),
            amount: dec!(25),
            platform_fee: Decimal::ZERO,
            tutor_earnings: Decimal::ZERO,
            currency: "USD".to_string(),
            meeting_link: None,
            reschedule_reason: None,
            refund_reason: None,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(counterpart(&booking, booking.student_id), booking.tutor_id);
        assert_eq!(counterpart(&booking, booking.tutor_id), booking.student_id);
    }
}
