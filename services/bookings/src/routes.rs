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

        // Availability
        .route(
            "/availability-slots",
            get(handlers::list_slots).post(handlers::create_slot),
        )
        .route("/availability-slots/:slot_id", put(handlers::update_slot))

        // Bookings
        .route("/bookings", get(handlers::list_bookings).post(handlers::create_booking))
        .route("/bookings/:booking_id", get(handlers::get_booking))
        .route("/bookings/:booking_id/confirm", post(handlers::confirm_booking))
        .route("/bookings/:booking_id/cancel", post(handlers::cancel_booking))
        .route("/bookings/:booking_id/reschedule", post(handlers::reschedule_booking))
        .route("/bookings/:booking_id/refund-eligibility", get(handlers::refund_eligibility))
        .route("/bookings/:booking_id/classroom", get(handlers::get_classroom))

        // Lesson sessions
        .route("/lesson-sessions", get(handlers::list_sessions))
        .route("/lesson-sessions/auto-confirm", post(handlers::auto_confirm_sessions))
        .route("/lesson-sessions/:session_id", get(handlers::get_session))
        .route("/lesson-sessions/:session_id/complete", post(handlers::complete_session))

        // Subscriptions
        .route(
            "/subscriptions",
            get(handlers::list_subscriptions).post(handlers::create_subscription),
        )
        .route("/subscriptions/:subscription_id", get(handlers::get_subscription))
        .route("/subscriptions/:subscription_id/pause", post(handlers::pause_subscription))
        .route("/subscriptions/:subscription_id/resume", post(handlers::resume_subscription))
        .route("/subscriptions/:subscription_id/cancel", post(handlers::cancel_subscription))
}
