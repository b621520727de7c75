use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NotificationListQuery {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadAllResult {
    pub marked_read: u64,
}
