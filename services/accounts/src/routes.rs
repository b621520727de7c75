use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers;
use crate::services::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Registration and login
        .route("/auth/register/student", post(handlers::register_student))
        .route("/auth/register/tutor", post(handlers::register_tutor))
        .route("/auth/login", post(handlers::login))
        .route("/auth/admin/login", post(handlers::admin_login))
        .route("/auth/admin/register", post(handlers::register_admin))
        .route("/auth/me", get(handlers::get_current_user))
        .route("/auth/change-password", post(handlers::change_password))

        // Email verification and password reset
        .route("/auth/verify-email", post(handlers::verify_email))
        .route("/auth/resend-verification", post(handlers::resend_verification))
        .route("/auth/password-reset", post(handlers::request_password_reset))
        .route("/auth/password-reset/confirm", post(handlers::confirm_password_reset))

        // Tutor profiles
        .route("/tutors", get(handlers::list_tutors))
        .route("/tutors/me", put(handlers::update_my_tutor_profile))
        .route("/tutors/:tutor_id", get(handlers::get_tutor))
        .route("/tutors/:tutor_id/approve", post(handlers::approve_tutor))
        .route("/tutors/:tutor_id/reject", post(handlers::reject_tutor))

        // Student profiles
        .route("/students", get(handlers::list_students))
        .route(
            "/students/me",
            get(handlers::get_my_student_profile).put(handlers::update_my_student_profile),
        )
}
