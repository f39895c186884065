use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{ClassReminderLog, CreateClassReminderLog};
use crate::error::{AppError, AppResult};

pub struct ReminderLogRepository;

impl ReminderLogRepository {
    pub async fn exists(pool: &SqlitePool, class_id: &str, reminder_type: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM class_reminder_logs WHERE class_id = ? AND reminder_type = ?",
        )
        .bind(class_id)
        .bind(reminder_type)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(count > 0)
    }

    pub async fn create(
        pool: &SqlitePool,
        log: CreateClassReminderLog,
    ) -> AppResult<ClassReminderLog> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, ClassReminderLog>(
            r#"
            INSERT INTO class_reminder_logs (
                id, class_id, reminder_type, sent_at,
                title, teacher_name, scheduled_at, subject
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id, class_id, reminder_type, sent_at,
                title, teacher_name, scheduled_at, subject
            "#,
        )
        .bind(id)
        .bind(log.class_id)
        .bind(log.reminder_type)
        .bind(now)
        .bind(log.title)
        .bind(log.teacher_name)
        .bind(log.scheduled_at)
        .bind(log.subject)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }
}
