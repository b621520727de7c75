use chrono::Utc;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use afrilingua_auth::ClientInfo;
use afrilingua_common::{AppError, AuditAction};

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(user_id: Option<Uuid>, action: AuditAction, description: impl Into<String>) -> Self {
        Self {
            user_id,
            action,
            description: description.into(),
            ip_address: None,
            user_agent: None,
            metadata: None,
        }
    }

    pub fn client(mut self, client: &ClientInfo) -> Self {
        self.ip_address = client.ip_address.clone();
        self.user_agent = client.user_agent.clone();
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

pub async fn record<'e, E>(executor: E, entry: &AuditEntry) -> Result<(), AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO audit_logs
            (log_id, user_id, action, description, ip_address, user_agent, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.user_id)
    .bind(entry.action.as_str())
    .bind(&entry.description)
    .bind(&entry.ip_address)
    .bind(&entry.user_agent)
    .bind(&entry.metadata)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    tracing::info!("audit {} by {:?}: {}", entry.action, entry.user_id, entry.description);
    Ok(())
}
