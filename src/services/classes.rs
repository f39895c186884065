use std::sync::Arc;

use chrono::FixedOffset;
use sqlx::SqlitePool;

use crate::db::{
    CreateInAppNotification, NotificationRepository, NotificationType, UserPartition, UserRecord,
    UserRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::events::ClassCreatedEvent;
use crate::services::non_empty;
use crate::services::push::{send_each, DeliveryReport, PushGateway, PushMessage};
use crate::services::schedule::format_class_schedule;

const CLASS_CHANNEL_ID: &str = "class_notifications";

/// Title and body shared by every student's copy of an announcement.
struct Announcement<'a> {
    class_id: &'a str,
    teacher_id: &'a str,
    subject: Option<&'a str>,
    scheduled_iso: String,
    title: String,
    body: String,
}

/// Announces a newly created class to every student.
pub struct ClassAnnouncer {
    pool: SqlitePool,
    push: Arc<dyn PushGateway>,
    page_size: u32,
    offset: FixedOffset,
}

impl ClassAnnouncer {
    pub fn new(
        pool: SqlitePool,
        push: Arc<dyn PushGateway>,
        page_size: u32,
        offset: FixedOffset,
    ) -> Self {
        Self {
            pool,
            push,
            page_size: page_size.max(1),
            offset,
        }
    }

    /// Run the announcer for one event. Never fails: every error is logged here.
    pub async fn handle(&self, event: &ClassCreatedEvent) -> DeliveryReport {
        match self.announce(event).await {
            Ok(report) => report,
            Err(e) => {
                e.log(&format!("Class announcement failed for class {}", event.class_id));
                DeliveryReport::default()
            }
        }
    }

    async fn announce(&self, event: &ClassCreatedEvent) -> AppResult<DeliveryReport> {
        let class = &event.class;
        let (title, teacher_id) = match (
            non_empty(class.title.as_deref()),
            non_empty(class.teacher_id.as_deref()),
        ) {
            (Some(title), Some(teacher_id)) => (title, teacher_id),
            _ => return Err(AppError::MissingField("title or teacherId".to_string())),
        };

        let teacher = UserRepository::find(&self.pool, UserPartition::Teachers, teacher_id).await?;
        if teacher.is_none() {
            tracing::warn!("Teacher {} not found for class {}", teacher_id, event.class_id);
        }
        let teacher_name = teacher
            .as_ref()
            .and_then(UserRecord::display_name)
            .unwrap_or("Unknown Teacher");

        let subject = non_empty(class.subject.as_deref());
        let time_string = format_class_schedule(class.scheduled_date_time, self.offset);

        let announcement = Announcement {
            class_id: &event.class_id,
            teacher_id,
            subject,
            scheduled_iso: class
                .scheduled_date_time
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            title: format!("New Class: {}", title),
            body: format!(
                "{} scheduled {} on {}",
                teacher_name,
                subject.unwrap_or("a class"),
                time_string
            ),
        };

        tracing::info!("Sending class notification for: {}", title);

        let mut report = DeliveryReport::default();
        let mut students_seen = 0usize;
        let mut after: Option<String> = None;
        loop {
            let page = UserRepository::list_page(
                &self.pool,
                UserPartition::Students,
                after.as_deref(),
                i64::from(self.page_size),
            )
            .await?;

            for student in &page {
                report.merge(self.notify_student(student, &announcement).await);
            }
            students_seen += page.len();

            if page.len() < self.page_size as usize {
                break;
            }
            after = page.last().map(|s| s.id.clone());
        }

        tracing::info!(
            "Class notifications for {} done: students={}, pushes sent={}, failed={}, in-app={}",
            event.class_id,
            students_seen,
            report.push_sent,
            report.push_failed,
            report.in_app_written
        );
        Ok(report)
    }

    async fn notify_student(
        &self,
        student: &UserRecord,
        announcement: &Announcement<'_>,
    ) -> DeliveryReport {
        let messages: Vec<PushMessage> = student
            .push_tokens()
            .into_iter()
            .map(|token| {
                PushMessage::new(token, announcement.title.as_str(), announcement.body.as_str())
                    .with_data("classId", announcement.class_id)
                    .with_data("teacherId", announcement.teacher_id)
                    .with_data("type", NotificationType::ClassScheduled.as_str())
                    .with_data("subject", announcement.subject.unwrap_or(""))
                    .with_data("scheduledDateTime", announcement.scheduled_iso.as_str())
                    .with_background_delivery(CLASS_CHANNEL_ID, false)
            })
            .collect();

        let mut report = send_each(self.push.as_ref(), messages).await;

        // Written whether or not any push went out.
        match NotificationRepository::create(
            &self.pool,
            CreateInAppNotification {
                user_partition: UserPartition::Students,
                user_id: student.id.clone(),
                title: announcement.title.clone(),
                body: announcement.body.clone(),
                notification_type: NotificationType::ClassScheduled,
                class_id: Some(announcement.class_id.to_string()),
                priority: None,
            },
        )
        .await
        {
            Ok(_) => report.in_app_written += 1,
            Err(e) => {
                tracing::error!("Error storing notification for student {}: {}", student.id, e);
                report.in_app_failed += 1;
            }
        }

        report
    }
}
