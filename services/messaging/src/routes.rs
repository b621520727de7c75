use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/conversations",
            get(handlers::list_conversations).post(handlers::create_conversation),
        )
        .route("/conversations/:conversation_id", get(handlers::get_conversation))
        .route(
            "/conversations/:conversation_id/messages",
            get(handlers::list_messages).post(handlers::send_message),
        )
        .route("/conversations/:conversation_id/read", post(handlers::mark_read))
}
