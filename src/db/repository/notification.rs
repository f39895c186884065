use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{CreateInAppNotification, InAppNotification};
use crate::error::{AppError, AppResult};

pub struct NotificationRepository;

impl NotificationRepository {
    /// Insert an unread in-app notification stamped with the current time.
    pub async fn create(
        pool: &SqlitePool,
        notification: CreateInAppNotification,
    ) -> AppResult<InAppNotification> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, InAppNotification>(
            r#"
            INSERT INTO notifications (
                id, user_partition, user_id, title, body,
                notification_type, class_id, priority, is_read, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
            RETURNING
                id, user_partition, user_id, title, body,
                notification_type, class_id, priority, is_read, created_at
            "#,
        )
        .bind(id)
        .bind(notification.user_partition.as_str())
        .bind(notification.user_id)
        .bind(notification.title)
        .bind(notification.body)
        .bind(notification.notification_type.as_str())
        .bind(notification.class_id)
        .bind(notification.priority)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }
}
