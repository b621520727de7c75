use std::collections::HashMap;

use axum::extract::FromRef;
use chrono::Utc;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use afrilingua_auth::{Claims, JwtService};
use afrilingua_common::{AppError, NotificationCategory};
use afrilingua_database::{
    notifications::{create_notification, NewNotification},
    Booking, Conversation, Message,
};

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

async fn participant_ids(conn: &mut PgConnection, conversation_id: Uuid) -> Result<Vec<Uuid>, AppError> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT user_id FROM conversation_participants WHERE conversation_id = $1",
    )
    .bind(conversation_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

/// Loads the conversation and checks that `user_id` takes part in it.
async fn load_for_participant(
    conn: &mut PgConnection,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<(Conversation, Vec<Uuid>), AppError> {
    let conversation = sqlx::query_as::<_, Conversation>(
        "SELECT * FROM conversations WHERE conversation_id = $1",
    )
    .bind(conversation_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

    let participants = participant_ids(conn, conversation_id).await?;
    if !participants.contains(&user_id) {
        return Err(AppError::Authorization(
            "You are not a participant in this conversation".to_string(),
        ));
    }
    Ok((conversation, participants))
}

pub struct MessagingService {
    db_pool: PgPool,
    config: AppConfig,
}

impl MessagingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db_pool: state.db_pool.clone(),
            config: state.config.clone(),
        }
    }

    pub async fn list_conversations(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>, AppError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT c.* FROM conversations c
            JOIN conversation_participants cp ON cp.conversation_id = c.conversation_id
            WHERE cp.user_id = $1
            ORDER BY c.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        self.summarize(conversations).await
    }

    pub async fn get_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<ConversationSummary, AppError> {
        let mut conn = self.db_pool.acquire().await?;
        let (conversation, _) = load_for_participant(&mut conn, conversation_id, user_id).await?;
        drop(conn);

        self.summarize(vec![conversation])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))
    }

    pub async fn create_conversation(
        &self,
        claims: &Claims,
        request: CreateConversationRequest,
    ) -> Result<ConversationSummary, AppError> {
        let participants = request.participants(claims.user_id())?;

        let known = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE user_id = ANY($1) AND is_active",
        )
        .bind(&participants)
        .fetch_one(&self.db_pool)
        .await?;

        if known != participants.len() as i64 {
            return Err(AppError::Validation(
                "Every participant must be an active user".to_string(),
            ));
        }

        if let Some(booking_id) = request.booking_id {
            let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1")
                .bind(booking_id)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

            if !claims.is_admin() && !booking.is_participant(claims.user_id()) {
                return Err(AppError::Authorization(
                    "You can only link your own bookings".to_string(),
                ));
            }
        }

        let mut tx = self.db_pool.begin().await?;
        let now = Utc::now();

        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (conversation_id, booking_id, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.booking_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for participant in &participants {
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id) VALUES ($1, $2)",
            )
            .bind(conversation.conversation_id)
            .bind(participant)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Conversation {} opened by {} with {} participants",
            conversation.conversation_id,
            claims.user_id(),
            participants.len()
        );

        self.summarize(vec![conversation])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Conversation vanished after insert".to_string()))
    }

    pub async fn list_messages(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Vec<MessageView>, AppError> {
        let mut conn = self.db_pool.acquire().await?;
        load_for_participant(&mut conn, conversation_id, user_id).await?;

        let messages = sqlx::query_as::<_, MessageView>(
            r#"
            SELECT m.*, u.email AS sender_email
            FROM messages m
            JOIN users u ON u.user_id = m.sender_id
            WHERE m.conversation_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(messages)
    }

    /// Stores the message, bumps the conversation and notifies everyone else
    /// in it.
    pub async fn send_message(
        &self,
        claims: &Claims,
        conversation_id: Uuid,
        request: SendMessageRequest,
    ) -> Result<MessageView, AppError> {
        request.check()?;
        let sender_id = claims.user_id();

        let mut tx = self.db_pool.begin().await?;
        let (_, participants) = load_for_participant(&mut tx, conversation_id, sender_id).await?;
        let now = Utc::now();

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages
                (message_id, conversation_id, sender_id, content, is_read, created_at, updated_at)
            VALUES ($1, $2, $3, $4, FALSE, $5, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(sender_id)
        .bind(request.content.trim())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = $2 WHERE conversation_id = $1")
            .bind(conversation_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let link = self.config.conversation_link(conversation_id);
        for recipient in participants.into_iter().filter(|id| *id != sender_id) {
            create_notification(
                &mut *tx,
                &NewNotification::in_app(
                    recipient,
                    NotificationCategory::Message,
                    "New message",
                    format!("{} sent you a message: {}", claims.email, preview(&message.content)),
                )
                .with_link(link.clone())
                .with_metadata(json!({
                    "conversation_id": conversation_id,
                    "message_id": message.message_id,
                })),
            )
            .await?;
        }

        tx.commit().await?;

        tracing::debug!("Message {} posted to {}", message.message_id, conversation_id);
        Ok(MessageView {
            message,
            sender_email: claims.email.clone(),
        })
    }

    /// Marks every message from the other participants as read.
    pub async fn mark_read(&self, user_id: Uuid, conversation_id: Uuid) -> Result<ReadReceipt, AppError> {
        let mut conn = self.db_pool.acquire().await?;
        load_for_participant(&mut conn, conversation_id, user_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = TRUE, updated_at = $3
            WHERE conversation_id = $1 AND sender_id <> $2 AND NOT is_read
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(ReadReceipt {
            conversation_id,
            marked_read: result.rows_affected(),
        })
    }

    /// Attaches participant emails and the latest message to each
    /// conversation, preserving order.
    async fn summarize(&self, conversations: Vec<Conversation>) -> Result<Vec<ConversationSummary>, AppError> {
        let ids: Vec<Uuid> = conversations.iter().map(|c| c.conversation_id).collect();

        let emails = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT cp.conversation_id, u.email
            FROM conversation_participants cp
            JOIN users u ON u.user_id = cp.user_id
            WHERE cp.conversation_id = ANY($1)
            ORDER BY u.email ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db_pool)
        .await?;

        let mut emails_by_conversation: HashMap<Uuid, Vec<String>> = HashMap::new();
        for (conversation_id, email) in emails {
            emails_by_conversation.entry(conversation_id).or_default().push(email);
        }

        let latest = sqlx::query_as::<_, LastMessageRow>(
            r#"
            SELECT DISTINCT ON (m.conversation_id)
                m.conversation_id, u.email AS sender, m.content, m.created_at
            FROM messages m
            JOIN users u ON u.user_id = m.sender_id
            WHERE m.conversation_id = ANY($1)
            ORDER BY m.conversation_id, m.created_at DESC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db_pool)
        .await?;

        let mut latest_by_conversation: HashMap<Uuid, LastMessage> = latest
            .into_iter()
            .map(|row| (row.conversation_id, LastMessage::from(row)))
            .collect();

        Ok(conversations
            .into_iter()
            .map(|conversation| ConversationSummary {
                participants_emails: emails_by_conversation
                    .remove(&conversation.conversation_id)
                    .unwrap_or_default(),
                last_message: latest_by_conversation.remove(&conversation.conversation_id),
                conversation,
            })
            .collect())
    }
}
