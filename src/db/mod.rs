pub mod models;
pub mod repository;

pub use models::*;
pub use repository::*;


#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::models::*;
    use super::repository::*;
    use super::test_support::*;

    #[tokio::test]
    async fn migrations_create_shared_tables() {
        let pool = memory_pool().await;
        let tables: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx%'
            ORDER BY name
            "#,
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert_eq!(
            tables,
            [
                "chat_messages",
                "chat_rooms",
                "class_reminder_logs",
                "classes",
                "enrollments",
                "notifications",
                "users"
            ]
        );
    }

    #[tokio::test]
    async fn user_lookup_probes_partitions_in_order() {
        let pool = memory_pool().await;
        insert_user(&pool, UserPartition::Students, "u1", Some("Sam"), None).await;
        insert_user(&pool, UserPartition::Teachers, "u1", Some("Ms. Lee"), None).await;
        insert_user(&pool, UserPartition::Students, "u2", Some("Ana"), None).await;

        let order = [UserPartition::Teachers, UserPartition::Students];
        let u1 = UserRepository::find_in_partitions(&pool, &order, "u1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(u1.partition, "teachers");

        let u2 = UserRepository::find_in_partitions(&pool, &order, "u2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(u2.display_name(), Some("Ana"));

        assert!(UserRepository::find_in_partitions(&pool, &order, "nobody")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn list_page_walks_partition_by_id() {
        let pool = memory_pool().await;
        for id in ["s3", "s1", "s2"] {
            insert_user(&pool, UserPartition::Students, id, None, None).await;
        }
        insert_user(&pool, UserPartition::Teachers, "t1", None, None).await;

        let first = UserRepository::list_page(&pool, UserPartition::Students, None, 2)
            .await
            .unwrap();
        let ids: Vec<_> = first.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2"]);

        let rest = UserRepository::list_page(&pool, UserPartition::Students, Some("s2"), 2)
            .await
            .unwrap();
        let ids: Vec<_> = rest.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["s3"]);
    }

    #[tokio::test]
    async fn scheduled_window_is_inclusive_and_excludes_outside() {
        let pool = memory_pool().await;
        let now = Utc::now().naive_utc();
        let end = now + Duration::minutes(5);

        for (id, at) in [
            ("past", Some(now - Duration::seconds(30))),
            ("start", Some(now)),
            ("inside", Some(now + Duration::minutes(2))),
            ("end", Some(end)),
            ("later", Some(end + Duration::seconds(30))),
            ("unscheduled", None),
        ] {
            insert_class(
                &pool,
                ClassSeed {
                    id,
                    title: Some("Algebra"),
                    teacher_id: Some("t1"),
                    teacher_name: None,
                    subject: None,
                    scheduled_at: at,
                },
            )
            .await;
        }

        let found = ClassRepository::find_scheduled_between(&pool, now, end)
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["start", "inside", "end"]);
    }

    #[tokio::test]
    async fn reminder_log_marks_class_as_sent() {
        let pool = memory_pool().await;
        assert!(!ReminderLogRepository::exists(&pool, "C1", CLASS_REMINDER)
            .await
            .unwrap());

        ReminderLogRepository::create(
            &pool,
            CreateClassReminderLog {
                class_id: "C1".to_string(),
                reminder_type: CLASS_REMINDER.to_string(),
                title: "Class".to_string(),
                teacher_name: "Unknown".to_string(),
                scheduled_at: None,
                subject: "N/A".to_string(),
            },
        )
        .await
        .unwrap();

        assert!(ReminderLogRepository::exists(&pool, "C1", CLASS_REMINDER)
            .await
            .unwrap());
        assert!(!ReminderLogRepository::exists(&pool, "C1", "other")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn in_app_notification_is_unread_on_insert() {
        let pool = memory_pool().await;
        let row = NotificationRepository::create(
            &pool,
            CreateInAppNotification {
                user_partition: UserPartition::Students,
                user_id: "s1".to_string(),
                title: "t".to_string(),
                body: "b".to_string(),
                notification_type: NotificationType::ClassScheduled,
                class_id: Some("C1".to_string()),
                priority: None,
            },
        )
        .await
        .unwrap();

        assert!(!row.is_read);
        assert_eq!(row.notification_type, "class_scheduled");
        assert_eq!(notifications_for(&pool, UserPartition::Students, "s1").await.len(), 1);
    }
}
