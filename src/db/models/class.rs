use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: String,
    pub title: Option<String>,
    pub teacher_id: Option<String>,
    /// Denormalized copy of the teacher's display name, when the app wrote one.
    pub teacher_name: Option<String>,
    pub subject: Option<String>,
    /// Scheduled start, UTC.
    pub scheduled_at: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

impl ClassRecord {
    pub fn scheduled_at_utc(&self) -> Option<DateTime<Utc>> {
        self.scheduled_at.map(|t| t.and_utc())
    }
}

/// A class document as delivered by the class-created event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDocument {
    pub title: Option<String>,
    pub teacher_id: Option<String>,
    pub subject: Option<String>,
    pub scheduled_date_time: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub class_id: String,
    pub student_id: Option<String>,
    pub created_at: NaiveDateTime,
}
