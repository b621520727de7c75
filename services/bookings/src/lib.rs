pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod scheduling;
pub mod services;
pub mod sessions;
pub mod subscriptions;

use axum::{
    http::{HeaderValue, Method},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::services::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(origins)
}

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
        .fallback(handlers::handler_404)
}
