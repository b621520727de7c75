use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use afrilingua_common::{AppError, BookingStatus};
use afrilingua_database::{
    can_refund, refund_cutoff, AvailabilitySlot, Booking, LessonSession, VirtualClassroom,
};

// Availability slots

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateSlotRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// A slot must end after it starts and must not start in the past.
pub fn validate_window(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if end_time <= start_time {
        return Err(AppError::Validation("End time must be after start time".to_string()));
    }
    if start_time <= now {
        return Err(AppError::Validation("Start time must be in the future".to_string()));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlotListQuery {
    pub tutor_id: Option<Uuid>,
    pub available: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct SlotView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub slot: AvailabilitySlot,
    pub tutor_email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlotResponse {
    #[serde(flatten)]
    pub slot: AvailabilitySlot,
    pub tutor_email: String,
    pub duration_minutes: i64,
}

impl From<SlotView> for SlotResponse {
    fn from(view: SlotView) -> Self {
        Self {
            duration_minutes: view.slot.duration_minutes(),
            tutor_email: view.tutor_email,
            slot: view.slot,
        }
    }
}

// Bookings

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub course_id: Uuid,
    pub availability_slot_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct CancelBookingRequest {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RescheduleBookingRequest {
    pub availability_slot_id: Uuid,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

/// Booking joined with the people, course and slot it refers to.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct BookingDetail {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub booking: Booking,
    pub student_email: String,
    pub tutor_email: String,
    pub course_title: String,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefundEligibility {
    pub can_refund: bool,
    pub cutoff: DateTime<Utc>,
}

impl RefundEligibility {
    pub fn at(slot_start: DateTime<Utc>, now: DateTime<Utc>, cutoff_hours: i64) -> Self {
        Self {
            can_refund: can_refund(slot_start, now, cutoff_hours),
            cutoff: refund_cutoff(slot_start, cutoff_hours),
        }
    }
}

// Lessons and classrooms

#[derive(Debug, Serialize, Deserialize)]
pub struct AutoConfirmReport {
    pub confirmed: usize,
    pub session_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: LessonSession,
    pub duration_hours: Decimal,
}

impl From<LessonSession> for SessionResponse {
    fn from(session: LessonSession) -> Self {
        Self {
            duration_hours: session.duration_hours(),
            session,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClassroomResponse {
    #[serde(flatten)]
    pub classroom: VirtualClassroom,
    pub is_open: bool,
}

impl ClassroomResponse {
    pub fn at(classroom: VirtualClassroom, now: DateTime<Utc>) -> Self {
        Self {
            is_open: classroom.is_open(now),
            classroom,
        }
    }
}

// Subscriptions

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateSubscriptionRequest {
    pub tutor_id: Uuid,
    #[validate(range(min = 1, max = 31))]
    pub lessons_per_month: i32,
    pub price: Decimal,
}

impl CreateSubscriptionRequest {
    pub fn validate_price(&self) -> Result<(), AppError> {
        afrilingua_database::validate_price("price", self.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn slot_window_must_be_forward_and_future() {
        let now = Utc::now();
        let start = now + Duration::days(1);

        assert!(validate_window(start, start + Duration::hours(1), now).is_ok());
        assert!(validate_window(start, start, now).is_err());
        assert!(validate_window(start, start - Duration::minutes(30), now).is_err());
        assert!(validate_window(now - Duration::hours(1), now + Duration::hours(1), now).is_err());
    }

    #[test]
    fn refund_eligibility_reports_cutoff() {
        let now = Utc::now();
        let start = now + Duration::hours(30);

        let early = RefundEligibility::at(start, now, 24);
        assert!(early.can_refund);
        assert_eq!(early.cutoff, start - Duration::hours(24));

        let late = RefundEligibility::at(start, now + Duration::hours(7), 24);
        assert!(!late.can_refund);
    }

    #[test]
    fn subscription_needs_at_least_one_lesson() {
        let request = CreateSubscriptionRequest {
            tutor_id: Uuid::new_v4(),
            lessons_per_month: 0,
            price: Decimal::new(8000, 2),
        };
        assert!(request.validate().is_err());
        assert!(request.validate_price().is_ok());
    }
}
