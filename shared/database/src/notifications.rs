use chrono::Utc;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use afrilingua_common::{AppError, NotificationCategory, NotificationType};

use crate::models::Notification;

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub category: NotificationCategory,
    pub link: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewNotification {
    pub fn in_app(
        user_id: Uuid,
        category: NotificationCategory,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            notification_type: NotificationType::InApp,
            category,
            link: None,
            metadata: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn also_email(mut self) -> Self {
        self.notification_type = NotificationType::Both;
        self
    }
}

/// Inserts an unread notification. Accepts a pool or a connection inside an
/// open transaction.
pub async fn create_notification<'e, E>(
    executor: E,
    notification: &NewNotification,
) -> Result<Notification, AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    let created = sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications
            (notification_id, user_id, title, message, notification_type, category,
             is_read, link, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(notification.user_id)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.notification_type.as_str())
    .bind(notification.category.as_str())
    .bind(&notification.link)
    .bind(&notification.metadata)
    .bind(Utc::now())
    .fetch_one(executor)
    .await?;

    tracing::debug!(
        "Notification {} created for user {}",
        created.notification_id,
        created.user_id
    );
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_in_app() {
        let notification = NewNotification::in_app(
            Uuid::new_v4(),
            NotificationCategory::Booking,
            "New booking",
            "A student booked your slot",
        )
        .with_link("/bookings/1");

        assert_eq!(notification.notification_type, NotificationType::InApp);
        assert_eq!(notification.link.as_deref(), Some("/bookings/1"));
        assert_eq!(notification.also_email().notification_type, NotificationType::Both);
    }
}
