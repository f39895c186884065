//! Pre-class reminders.
//!
//! Each sweep looks for classes starting inside the look-ahead window and
//! reminds the teacher and enrolled students once per class. A row in
//! `class_reminder_logs` is the only thing that marks a class as done; the
//! check and the write are separate statements, so two sweeps that overlap
//! on the same class can both send before either writes its row.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{
    ClassRecord, ClassRepository, CreateClassReminderLog, CreateInAppNotification,
    EnrollmentRepository, NotificationRepository, NotificationType, ReminderLogRepository,
    UserRepository, UserRole, CLASS_REMINDER,
};
use crate::error::AppResult;
use crate::services::non_empty;
use crate::services::push::{send_each, DeliveryReport, PushGateway, PushMessage};
use crate::services::schedule::format_reminder_time;

const REMINDER_CHANNEL_ID: &str = "class_reminders";
const PRIORITY_HIGH: &str = "high";

/// `[start, end]`, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReminderWindow {
    pub fn starting_at(now: DateTime<Utc>, lookahead: Duration) -> Self {
        Self {
            start: now,
            end: now + lookahead,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub classes_matched: usize,
    pub reminders_sent: usize,
    pub already_sent: usize,
    pub failed: usize,
    pub delivery: DeliveryReport,
}

pub struct ReminderSweeper {
    pool: SqlitePool,
    push: Arc<dyn PushGateway>,
    lookahead: Duration,
    offset: FixedOffset,
}

impl ReminderSweeper {
    pub fn new(
        pool: SqlitePool,
        push: Arc<dyn PushGateway>,
        lookahead: Duration,
        offset: FixedOffset,
    ) -> Self {
        Self {
            pool,
            push,
            lookahead,
            offset,
        }
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Run one sweep as of `now`. Never fails: every error is logged here.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let window = ReminderWindow::starting_at(now, self.lookahead);
        tracing::info!("Checking for class reminders at: {}", now.to_rfc3339());

        let classes = match ClassRepository::find_scheduled_between(
            &self.pool,
            window.start.naive_utc(),
            window.end.naive_utc(),
        )
        .await
        {
            Ok(classes) => classes,
            Err(e) => {
                e.log("Failed to query classes for reminders");
                return SweepReport::default();
            }
        };

        let mut report = SweepReport {
            classes_matched: classes.len(),
            ..SweepReport::default()
        };

        for class in &classes {
            match self.remind_once(class).await {
                Ok(Some(delivery)) => {
                    report.reminders_sent += 1;
                    report.delivery.merge(delivery);
                    tracing::info!("Reminder sent for class: {}", class.id);
                }
                Ok(None) => {
                    report.already_sent += 1;
                    tracing::debug!("Reminder already sent for class: {}", class.id);
                }
                Err(e) => {
                    report.failed += 1;
                    e.log(&format!("Reminder failed for class {}", class.id));
                }
            }
        }

        report
    }

    /// Dispatch and log the reminder unless a log row already exists.
    /// Returns `None` when the class was already handled.
    async fn remind_once(&self, class: &ClassRecord) -> AppResult<Option<DeliveryReport>> {
        if ReminderLogRepository::exists(&self.pool, &class.id, CLASS_REMINDER).await? {
            return Ok(None);
        }

        let delivery = self.dispatch_reminder(class).await;

        ReminderLogRepository::create(
            &self.pool,
            CreateClassReminderLog {
                class_id: class.id.clone(),
                reminder_type: CLASS_REMINDER.to_string(),
                title: non_empty(class.title.as_deref())
                    .unwrap_or("Class")
                    .to_string(),
                teacher_name: non_empty(class.teacher_name.as_deref())
                    .unwrap_or("Unknown")
                    .to_string(),
                scheduled_at: class.scheduled_at,
                subject: non_empty(class.subject.as_deref())
                    .unwrap_or("N/A")
                    .to_string(),
            },
        )
        .await?;

        Ok(Some(delivery))
    }

    /// Notify the class teacher, then every enrolled student.
    pub async fn dispatch_reminder(&self, class: &ClassRecord) -> DeliveryReport {
        let title = non_empty(class.title.as_deref()).unwrap_or("Class Reminder");
        let body = format!(
            "Your class \"{}\" is starting in {} minutes at {}",
            title,
            self.lookahead.num_minutes(),
            format_reminder_time(class.scheduled_at_utc(), self.offset)
        );

        let mut report = DeliveryReport::default();

        if let Some(teacher_id) = non_empty(class.teacher_id.as_deref()) {
            report.merge(
                self.deliver_to_user(teacher_id, UserRole::Teacher, title, &body, &class.id)
                    .await,
            );
        }

        match EnrollmentRepository::find_by_class_id(&self.pool, &class.id).await {
            Ok(enrollments) => {
                for enrollment in &enrollments {
                    if let Some(student_id) = non_empty(enrollment.student_id.as_deref()) {
                        report.merge(
                            self.deliver_to_user(
                                student_id,
                                UserRole::Student,
                                title,
                                &body,
                                &class.id,
                            )
                            .await,
                        );
                    }
                }
            }
            Err(e) => e.log(&format!("Failed to load enrollments for class {}", class.id)),
        }

        report
    }

    /// Push to every token the user has, then store one in-app notification
    /// regardless of how the pushes went.
    pub async fn deliver_to_user(
        &self,
        user_id: &str,
        role: UserRole,
        title: &str,
        body: &str,
        class_id: &str,
    ) -> DeliveryReport {
        let partition = role.partition();
        let user = match UserRepository::find(&self.pool, partition, user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::info!("User not found: {} in {}", user_id, partition.as_str());
                return DeliveryReport::default();
            }
            Err(e) => {
                e.log(&format!("Failed to load user {}", user_id));
                return DeliveryReport::default();
            }
        };

        let messages: Vec<PushMessage> = user
            .push_tokens()
            .into_iter()
            .map(|token| {
                PushMessage::new(token, title, body)
                    .with_data("type", NotificationType::ClassReminder.as_str())
                    .with_data("classId", class_id)
                    .with_data("userId", user_id)
                    .with_data("userType", role.as_str())
                    .with_data("priority", PRIORITY_HIGH)
                    .with_background_delivery(REMINDER_CHANNEL_ID, true)
            })
            .collect();

        let mut report = send_each(self.push.as_ref(), messages).await;

        match NotificationRepository::create(
            &self.pool,
            CreateInAppNotification {
                user_partition: partition,
                user_id: user_id.to_string(),
                title: title.to_string(),
                body: body.to_string(),
                notification_type: NotificationType::ClassReminder,
                class_id: Some(class_id.to_string()),
                priority: Some(PRIORITY_HIGH.to_string()),
            },
        )
        .await
        {
            Ok(_) => report.in_app_written += 1,
            Err(e) => {
                tracing::error!("Error storing in-app notification for {}: {}", user_id, e);
                report.in_app_failed += 1;
            }
        }

        tracing::debug!("Reminder sent to {}: {}", role.as_str(), user_id);
        report
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::db::test_support::*;
    use crate::db::UserPartition;
    use crate::services::push::testing::RecordingGateway;
    use crate::services::schedule::display_offset;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap()
    }

    async fn setup() -> (SqlitePool, Arc<RecordingGateway>, ReminderSweeper) {
        let pool = memory_pool().await;
        let gateway = Arc::new(RecordingGateway::default());
        let sweeper = ReminderSweeper::new(
            pool.clone(),
            gateway.clone(),
            Duration::minutes(5),
            display_offset(0),
        );
        (pool, gateway, sweeper)
    }

    async fn seed_class(pool: &SqlitePool, id: &str, starts_in: Duration) {
        insert_class(
            pool,
            ClassSeed {
                id,
                title: Some("Algebra"),
                teacher_id: Some("t1"),
                teacher_name: Some("Ms. Lee"),
                subject: Some("Math"),
                scheduled_at: Some((now() + starts_in).naive_utc()),
            },
        )
        .await;
    }

    #[tokio::test]
    async fn reminds_teacher_and_enrolled_students_once() {
        let (pool, gateway, sweeper) = setup().await;
        seed_class(&pool, "C1", Duration::minutes(3)).await;
        insert_user(&pool, UserPartition::Teachers, "t1", Some("Ms. Lee"), Some(r#""t-tok""#)).await;
        insert_user(&pool, UserPartition::Students, "s1", None, Some(r#"["s1-a", "s1-b"]"#)).await;
        insert_user(&pool, UserPartition::Students, "s2", None, None).await;
        insert_enrollment(&pool, "C1", Some("s1")).await;
        insert_enrollment(&pool, "C1", Some("s2")).await;
        insert_enrollment(&pool, "C1", None).await;
        insert_enrollment(&pool, "C1", Some("ghost")).await;

        let first = sweeper.sweep_at(now()).await;
        assert_eq!(first.classes_matched, 1);
        assert_eq!(first.reminders_sent, 1);
        assert_eq!(first.delivery.push_sent, 3);
        assert_eq!(first.delivery.in_app_written, 3);

        let teacher_rows = notifications_for(&pool, UserPartition::Teachers, "t1").await;
        assert_eq!(teacher_rows.len(), 1);
        assert_eq!(teacher_rows[0].title, "Algebra");
        assert_eq!(
            teacher_rows[0].body,
            "Your class \"Algebra\" is starting in 5 minutes at 02:03 PM"
        );
        assert_eq!(teacher_rows[0].priority.as_deref(), Some("high"));
        assert_eq!(teacher_rows[0].notification_type, "class_reminder");

        let teacher_push = gateway
            .messages()
            .into_iter()
            .find(|m| m.token == "t-tok")
            .unwrap();
        assert_eq!(teacher_push.data["userType"], "teacher");
        assert_eq!(teacher_push.data["priority"], "high");
        assert_eq!(teacher_push.data["classId"], "C1");
        assert_eq!(
            teacher_push.android.as_ref().unwrap().priority.as_deref(),
            Some("HIGH")
        );

        // The next tick still sees C1 in the window but must not resend.
        let second = sweeper.sweep_at(now() + Duration::minutes(1)).await;
        assert_eq!(second.classes_matched, 1);
        assert_eq!(second.already_sent, 1);
        assert_eq!(second.delivery, DeliveryReport::default());
        assert_eq!(gateway.messages().len(), 3);
        assert_eq!(count_rows(&pool, "class_reminder_logs").await, 1);
        assert_eq!(count_rows(&pool, "notifications").await, 3);
    }

    #[tokio::test]
    async fn user_without_token_gets_in_app_row_only() {
        let (pool, gateway, sweeper) = setup().await;
        insert_user(&pool, UserPartition::Students, "s1", None, None).await;

        let report = sweeper
            .deliver_to_user("s1", UserRole::Student, "Algebra", "soon", "C1")
            .await;

        assert_eq!(report.push_attempts(), 0);
        assert_eq!(report.in_app_written, 1);
        assert!(gateway.messages().is_empty());
        assert_eq!(notifications_for(&pool, UserPartition::Students, "s1").await.len(), 1);
    }

    #[tokio::test]
    async fn failed_push_still_writes_in_app_row() {
        let (pool, _gateway, sweeper) = setup().await;
        insert_user(&pool, UserPartition::Admin, "a1", None, Some(r#""bad-token""#)).await;

        let report = sweeper
            .deliver_to_user("a1", UserRole::Admin, "Algebra", "soon", "C1")
            .await;

        assert_eq!(report.push_failed, 1);
        assert_eq!(report.in_app_written, 1);
        assert_eq!(notifications_for(&pool, UserPartition::Admin, "a1").await.len(), 1);
    }

    #[tokio::test]
    async fn classes_outside_window_are_ignored() {
        let (pool, gateway, sweeper) = setup().await;
        seed_class(&pool, "started", Duration::minutes(-1)).await;
        seed_class(&pool, "later", Duration::minutes(6)).await;
        insert_user(&pool, UserPartition::Teachers, "t1", None, Some(r#""t-tok""#)).await;

        let report = sweeper.sweep_at(now()).await;
        assert_eq!(report.classes_matched, 0);
        assert!(gateway.messages().is_empty());
        assert_eq!(count_rows(&pool, "class_reminder_logs").await, 0);
    }

    #[tokio::test]
    async fn existing_log_row_suppresses_sends() {
        let (pool, gateway, sweeper) = setup().await;
        seed_class(&pool, "C1", Duration::minutes(4)).await;
        insert_user(&pool, UserPartition::Teachers, "t1", None, Some(r#""t-tok""#)).await;
        ReminderLogRepository::create(
            &pool,
            CreateClassReminderLog {
                class_id: "C1".to_string(),
                reminder_type: CLASS_REMINDER.to_string(),
                title: "Algebra".to_string(),
                teacher_name: "Ms. Lee".to_string(),
                scheduled_at: None,
                subject: "Math".to_string(),
            },
        )
        .await
        .unwrap();

        for minute in 0..3 {
            let report = sweeper.sweep_at(now() + Duration::minutes(minute)).await;
            assert_eq!(report.already_sent, 1);
        }
        assert!(gateway.messages().is_empty());
        assert_eq!(count_rows(&pool, "class_reminder_logs").await, 1);
    }

    #[tokio::test]
    async fn log_row_snapshots_class_with_defaults() {
        let (pool, _gateway, sweeper) = setup().await;
        insert_class(
            &pool,
            ClassSeed {
                id: "bare",
                title: None,
                teacher_id: None,
                teacher_name: None,
                subject: None,
                scheduled_at: Some((now() + Duration::minutes(2)).naive_utc()),
            },
        )
        .await;

        let report = sweeper.sweep_at(now()).await;
        assert_eq!(report.reminders_sent, 1);

        let (title, teacher_name, subject): (String, String, String) = sqlx::query_as(
            "SELECT title, teacher_name, subject FROM class_reminder_logs WHERE class_id = 'bare'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(title, "Class");
        assert_eq!(teacher_name, "Unknown");
        assert_eq!(subject, "N/A");
    }

    #[tokio::test]
    async fn failed_in_app_write_is_counted_after_push() {
        let (pool, gateway, sweeper) = setup().await;
        insert_user(&pool, UserPartition::Students, "s1", None, Some(r#""s1-tok""#)).await;
        drop_table(&pool, "notifications").await;

        let report = sweeper
            .deliver_to_user("s1", UserRole::Student, "Algebra", "soon", "C1")
            .await;

        assert_eq!(report.push_sent, 1);
        assert_eq!(report.in_app_written, 0);
        assert_eq!(report.in_app_failed, 1);
        assert_eq!(gateway.tokens(), ["s1-tok"]);
    }
}
