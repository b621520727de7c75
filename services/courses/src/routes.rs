use axum::{
    routing::get,
    Router,
};

use crate::handlers;
use crate::services::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Courses
        .route("/courses", get(handlers::list_courses).post(handlers::create_course))
        .route(
            "/courses/:course_id",
            get(handlers::get_course).put(handlers::update_course),
        )

        // Lessons
        .route(
            "/courses/:course_id/lessons",
            get(handlers::list_lessons).post(handlers::create_lesson),
        )
        .route(
            "/lessons/:lesson_id",
            get(handlers::get_lesson).put(handlers::update_lesson),
        )
}
