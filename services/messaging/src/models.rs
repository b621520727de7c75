use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use afrilingua_common::AppError;
use afrilingua_database::{Conversation, Message};

/// Longest message excerpt shown in a conversation list.
pub const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateConversationRequest {
    pub participant_ids: Vec<Uuid>,
    pub booking_id: Option<Uuid>,
}

impl CreateConversationRequest {
    /// Distinct participants with the caller always included.
    pub fn participants(&self, caller: Uuid) -> Result<Vec<Uuid>, AppError> {
        let mut participants = vec![caller];
        for id in &self.participant_ids {
            if !participants.contains(id) {
                participants.push(*id);
            }
        }

        if participants.len() < 2 {
            return Err(AppError::Validation(
                "A conversation needs at least one other participant".to_string(),
            ));
        }
        Ok(participants)
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

impl SendMessageRequest {
    pub fn check(&self) -> Result<(), AppError> {
        if self.content.trim().is_empty() {
            return Err(AppError::Validation("Message content cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LastMessage {
    pub sender: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// First characters of a message, cut on a character boundary.
pub fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

#[derive(Debug, FromRow)]
pub struct LastMessageRow {
    pub conversation_id: Uuid,
    pub sender: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<LastMessageRow> for LastMessage {
    fn from(row: LastMessageRow) -> Self {
        Self {
            sender: row.sender,
            content: preview(&row.content),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participants_emails: Vec<String>,
    pub last_message: Option<LastMessage>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct MessageView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub message: Message,
    pub sender_email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub conversation_id: Uuid,
    pub marked_read: u64,
}
