use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers;
use crate::services::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))

        // Testimonials
        .route(
            "/testimonials",
            get(handlers::list_testimonials).post(handlers::create_testimonial),
        )
        .route(
            "/testimonials/:testimonial_id/approval",
            put(handlers::set_testimonial_approval),
        )

        // Student progress
        .route("/progress", get(handlers::list_progress).post(handlers::record_progress))
        .route("/progress/:progress_id/complete", post(handlers::complete_progress))
        .route("/progress/courses/:course_id/summary", get(handlers::course_progress))

        // Audit trail
        .route("/audit-logs", get(handlers::list_audit_logs))
}
