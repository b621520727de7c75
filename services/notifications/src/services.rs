use axum::extract::FromRef;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use afrilingua_auth::JwtService;
use afrilingua_common::AppError;
use afrilingua_database::Notification;

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

pub struct NotificationService {
    db_pool: PgPool,
}

impl NotificationService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn list(&self, user_id: Uuid, query: NotificationListQuery) -> Result<Vec<Notification>, AppError> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(query.unread)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(notifications)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<UnreadCount, AppError> {
        let unread = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(UnreadCount { unread })
    }

    /// Reading twice is harmless: the first `read_at` is kept.
    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<Notification, AppError> {
        let mut tx = self.db_pool.begin().await?;

        let mut notification = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE notification_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        if notification.mark_as_read(Utc::now()) {
            sqlx::query("UPDATE notifications SET is_read = TRUE, read_at = $2 WHERE notification_id = $1")
                .bind(notification_id)
                .bind(notification.read_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(notification)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<ReadAllResult, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = $2 WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?;

        tracing::debug!("Marked {} notifications read for {}", result.rows_affected(), user_id);
        Ok(ReadAllResult {
            marked_read: result.rows_affected(),
        })
    }
}
