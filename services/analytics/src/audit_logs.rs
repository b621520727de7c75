use sqlx::PgPool;

use afrilingua_common::AppError;
use afrilingua_database::AuditLog;

use crate::models::AuditLogQuery;

pub struct AuditLogService {
    db_pool: PgPool,
}

impl AuditLogService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Newest first, filtered by action and actor.
    pub async fn search(&self, query: AuditLogQuery) -> Result<Vec<AuditLog>, AppError> {
        let logs = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT * FROM audit_logs
            WHERE ($1::TEXT IS NULL OR action = $1)
              AND ($2::UUID IS NULL OR user_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(query.action.map(|a| a.as_str()))
        .bind(query.user_id)
        .bind(query.limit())
        .fetch_all(&self.db_pool)
        .await?;
        Ok(logs)
    }
}
