use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use afrilingua_common::{AppError, CourseCategory};
use afrilingua_database::{Course, Lesson};

#[derive(Debug, Serialize, Deserialize)]
pub struct CourseListQuery {
    pub category: Option<CourseCategory>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,

    #[validate(length(min = 1))]
    pub description: String,

    #[serde(default = "default_category")]
    pub category: CourseCategory,

    #[validate(url)]
    pub image_url: Option<String>,

    #[serde(default)]
    pub price: Decimal,

    #[serde(default)]
    pub is_published: bool,
}

fn default_category() -> CourseCategory {
    CourseCategory::Other
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,

    #[validate(length(min = 1))]
    pub description: Option<String>,

    pub category: Option<CourseCategory>,

    #[validate(url)]
    pub image_url: Option<String>,

    pub price: Option<Decimal>,
    pub is_published: Option<bool>,
}

pub fn validate_price(price: Option<Decimal>) -> Result<(), AppError> {
    match price {
        Some(price) => afrilingua_database::validate_price("price", price),
        None => Ok(()),
    }
}

/// Course row plus the number of lessons it holds.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct CourseSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub course: Course,
    pub lesson_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub lesson_count: usize,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,

    #[serde(default)]
    pub content: String,

    #[validate(url)]
    pub video_url: Option<String>,

    #[validate(url)]
    pub file_url: Option<String>,

    #[serde(default)]
    #[validate(range(min = 0))]
    pub duration_minutes: i32,

    #[serde(default)]
    pub order: i32,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateLessonRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub content: Option<String>,
    #[validate(url)]
    pub video_url: Option<String>,
    #[validate(url)]
    pub file_url: Option<String>,
    #[validate(range(min = 0))]
    pub duration_minutes: Option<i32>,
    pub order: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_defaults_to_free_unpublished_other() {
        let request: CreateCourseRequest = serde_json::from_value(serde_json::json!({
            "title": "Yoruba for beginners",
            "description": "Greetings and numbers"
        }))
        .unwrap();

        assert_eq!(request.category, CourseCategory::Other);
        assert_eq!(request.price, Decimal::ZERO);
        assert!(!request.is_published);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn negative_price_is_rejected() {
        assert!(validate_price(Some(Decimal::new(-500, 2))).is_err());
        assert!(validate_price(Some(Decimal::new(2500, 2))).is_ok());
        assert!(validate_price(None).is_ok());
        assert!(validate_price(Some(Decimal::new(12345, 3))).is_err());
        assert!(validate_price(Some(Decimal::new(1_000_000_000, 0))).is_err());
    }

    #[test]
    fn lesson_order_is_read_from_order_field() {
        let request: CreateLessonRequest = serde_json::from_value(serde_json::json!({
            "title": "Tones",
            "order": 3,
            "duration_minutes": 45
        }))
        .unwrap();
        assert_eq!(request.order, 3);
        assert!(request.validate().is_ok());
    }
}
