use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use afrilingua_analytics::{config::AppConfig, create_app, services::AppState};
use afrilingua_database::{create_pool, run_migrations};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "afrilingua_analytics=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    // Create database connection pool
    let db_pool = create_pool(&config.database).await?;

    // Run migrations
    run_migrations(&db_pool).await?;

    let app_state = AppState::new(db_pool, config.clone())?;
    let app = create_app(app_state);

    // Start the server
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
        .await?;

    tracing::info!("Analytics Service listening on {}:{}", config.server.host, config.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
