use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/unread-count", get(handlers::unread_count))
        .route("/notifications/read-all", post(handlers::mark_all_read))
        .route("/notifications/:notification_id/read", post(handlers::mark_read))
}
