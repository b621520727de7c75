use std::time::Duration;

use sqlx::{migrate::MigrateDatabase, postgres::PgPoolOptions, Pool, Postgres};
use afrilingua_common::{AppError, DatabaseConfig};

pub type DbPool = Pool<Postgres>;

pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, AppError> {
    let connection_string = config.connection_string();

    // Create database if it doesn't exist
    if !Postgres::database_exists(&connection_string).await.unwrap_or(false) {
        tracing::info!("Creating database: {}", config.database);
        Postgres::create_database(&connection_string)
            .await
            .map_err(AppError::Database)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&connection_string)
        .await
        .map_err(AppError::Database)?;

    // Test the connection
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(AppError::Database)?;

    tracing::info!("Database connection established");
    Ok(pool)
}

/// Pool that connects on first use. Routers built on it can serve every
/// request that never reaches the database.
pub fn create_lazy_pool(connection_string: &str) -> Result<DbPool, AppError> {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(1))
        .connect_lazy(connection_string)
        .map_err(AppError::Database)
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))?;

    tracing::info!("Database migrations completed");
    Ok(())
}
