use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Reminder type tag used for the pre-class reminder.
pub const CLASS_REMINDER: &str = "class_reminder";

/// Append-only marker recording that a reminder went out for a class, with a
/// snapshot of the class as it was at send time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClassReminderLog {
    pub id: String,
    pub class_id: String,
    pub reminder_type: String,
    pub sent_at: NaiveDateTime,
    pub title: String,
    pub teacher_name: String,
    pub scheduled_at: Option<NaiveDateTime>,
    pub subject: String,
}

#[derive(Debug, Clone)]
pub struct CreateClassReminderLog {
    pub class_id: String,
    pub reminder_type: String,
    pub title: String,
    pub teacher_name: String,
    pub scheduled_at: Option<NaiveDateTime>,
    pub subject: String,
}
