use axum::extract::FromRef;
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use afrilingua_auth::{Claims, JwtService};
use afrilingua_common::{AppError, BookingStatus, NotificationCategory};
use afrilingua_database::{
    notifications::{create_notification, NewNotification},
    Booking, Testimonial, TutorProfile,
};

use crate::config::AppConfig;
use crate::models::*;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_service: JwtService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db_pool: PgPool, config: AppConfig) -> Result<Self, AppError> {
        Ok(Self {
            jwt_service: JwtService::new(&config.jwt),
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

pub struct TestimonialService {
    db_pool: PgPool,
}

impl TestimonialService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Stores the review and folds its rating into the tutor's running
    /// average in the same transaction.
    pub async fn create(
        &self,
        student_id: Uuid,
        request: CreateTestimonialRequest,
    ) -> Result<Testimonial, AppError> {
        let mut tx = self.db_pool.begin().await?;

        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1")
            .bind(request.booking_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if booking.student_id != student_id {
            return Err(AppError::Authorization(
                "You can only review your own bookings".to_string(),
            ));
        }
        if booking.status()? != BookingStatus::Completed {
            return Err(AppError::Validation(
                "You can only review completed lessons".to_string(),
            ));
        }

        let now = Utc::now();
        let testimonial = sqlx::query_as::<_, Testimonial>(
            r#"
            INSERT INTO testimonials
                (testimonial_id, student_id, tutor_id, booking_id, rating, comment,
                 is_approved, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(booking.tutor_id)
        .bind(booking.booking_id)
        .bind(request.rating)
        .bind(request.comment.trim())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict("You have already reviewed this booking".to_string())
            }
            other => other,
        })?;

        let profile = sqlx::query_as::<_, TutorProfile>(
            "SELECT * FROM tutor_profiles WHERE user_id = $1 FOR UPDATE",
        )
        .bind(booking.tutor_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Tutor profile not found".to_string()))?;

        let (rating, total_ratings) = profile.apply_rating(request.rating);
        sqlx::query(
            "UPDATE tutor_profiles SET rating = $2, total_ratings = $3, updated_at = $4 WHERE user_id = $1",
        )
        .bind(booking.tutor_id)
        .bind(rating)
        .bind(total_ratings)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        create_notification(
            &mut *tx,
            &NewNotification::in_app(
                booking.tutor_id,
                NotificationCategory::General,
                "New review",
                format!("A student rated your lesson {} out of 5.", request.rating),
            )
            .with_metadata(json!({ "testimonial_id": testimonial.testimonial_id })),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Tutor {} rated {} (now {} over {} reviews)",
            booking.tutor_id,
            request.rating,
            rating,
            total_ratings
        );
        Ok(testimonial)
    }

    pub async fn list(
        &self,
        claims: Option<&Claims>,
        query: TestimonialListQuery,
    ) -> Result<Vec<Testimonial>, AppError> {
        let include_hidden = claims.map(|c| c.is_admin()).unwrap_or(false);

        let testimonials = sqlx::query_as::<_, Testimonial>(
            r#"
            SELECT * FROM testimonials
            WHERE ($1::UUID IS NULL OR tutor_id = $1)
              AND ($2 OR is_approved)
            ORDER BY created_at DESC
            "#,
        )
        .bind(query.tutor_id)
        .bind(include_hidden)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(testimonials)
    }

    pub async fn set_approval(
        &self,
        testimonial_id: Uuid,
        request: TestimonialApprovalRequest,
    ) -> Result<Testimonial, AppError> {
        let testimonial = sqlx::query_as::<_, Testimonial>(
            r#"
            UPDATE testimonials SET is_approved = $2, updated_at = $3
            WHERE testimonial_id = $1
            RETURNING *
            "#,
        )
        .bind(testimonial_id)
        .bind(request.is_approved)
        .bind(Utc::now())
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Testimonial not found".to_string()))?;

        tracing::info!("Testimonial {} approval set to {}", testimonial_id, request.is_approved);
        Ok(testimonial)
    }
}
