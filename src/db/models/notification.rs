use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UserPartition;

/// Kinds of notifications produced by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Chat,
    ClassScheduled,
    ClassReminder,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Chat => "chat",
            NotificationType::ClassScheduled => "class_scheduled",
            NotificationType::ClassReminder => "class_reminder",
        }
    }
}

/// In-app notification row surfaced in the app's notification list.
/// The app flips `is_read`; this service only inserts.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InAppNotification {
    pub id: String,
    pub user_partition: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub notification_type: String,
    pub class_id: Option<String>,
    pub priority: Option<String>,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct CreateInAppNotification {
    pub user_partition: UserPartition,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub notification_type: NotificationType,
    pub class_id: Option<String>,
    pub priority: Option<String>,
}
