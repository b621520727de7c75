use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use afrilingua_common::AuditAction;

// Testimonials

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateTestimonialRequest {
    pub booking_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub comment: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TestimonialListQuery {
    pub tutor_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TestimonialApprovalRequest {
    pub is_approved: bool,
}

// Progress

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RecordProgressRequest {
    pub lesson_id: Uuid,
    /// Minutes spent in this visit; added to the running total.
    #[serde(default)]
    #[validate(range(min = 0, max = 1440))]
    pub time_spent: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressListQuery {
    pub course_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CourseProgress {
    pub course_id: Uuid,
    pub completed_lessons: i64,
    pub total_lessons: i64,
    pub percent: Decimal,
}

impl CourseProgress {
    pub fn new(course_id: Uuid, completed_lessons: i64, total_lessons: i64) -> Self {
        let percent = if total_lessons > 0 {
            (Decimal::from(completed_lessons) * Decimal::ONE_HUNDRED / Decimal::from(total_lessons))
                .round_dp(2)
        } else {
            Decimal::ZERO
        };

        Self {
            course_id,
            completed_lessons,
            total_lessons,
            percent,
        }
    }
}

// Audit logs

pub const DEFAULT_AUDIT_LIMIT: i64 = 100;
pub const MAX_AUDIT_LIMIT: i64 = 500;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AuditLogQuery {
    pub action: Option<AuditAction>,
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
}

impl AuditLogQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .clamp(1, MAX_AUDIT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rating_must_be_one_to_five() {
        let mut request = CreateTestimonialRequest {
            booking_id: Uuid::new_v4(),
            rating: 5,
            comment: "Patient and clear".to_string(),
        };
        assert!(request.validate().is_ok());

        request.rating = 0;
        assert!(request.validate().is_err());
        request.rating = 6;
        assert!(request.validate().is_err());
    }

    #[test]
    fn completion_percentage() {
        let course = Uuid::new_v4();
        assert_eq!(CourseProgress::new(course, 1, 3).percent, dec!(33.33));
        assert_eq!(CourseProgress::new(course, 4, 4).percent, dec!(100));
        assert_eq!(CourseProgress::new(course, 0, 0).percent, Decimal::ZERO);
    }

    #[test]
    fn audit_limit_is_clamped() {
        assert_eq!(AuditLogQuery::default().limit(), DEFAULT_AUDIT_LIMIT);
        let huge = AuditLogQuery { limit: Some(10_000), ..Default::default() };
        assert_eq!(huge.limit(), MAX_AUDIT_LIMIT);
        let negative = AuditLogQuery { limit: Some(-3), ..Default::default() };
        assert_eq!(negative.limit(), 1);
    }
}
