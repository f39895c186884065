use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use crate::db::models::{ClassRecord, Enrollment};
use crate::error::{AppError, AppResult};

pub struct ClassRepository;

impl ClassRepository {
    /// Classes whose scheduled start lies in `[start, end]`, both ends inclusive.
    pub async fn find_scheduled_between(
        pool: &SqlitePool,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AppResult<Vec<ClassRecord>> {
        sqlx::query_as::<_, ClassRecord>(
            r#"
            SELECT id, title, teacher_id, teacher_name, subject, scheduled_at,
                   description, created_at
            FROM classes
            WHERE scheduled_at IS NOT NULL
            AND julianday(scheduled_at) >= julianday(?)
            AND julianday(scheduled_at) <= julianday(?)
            ORDER BY julianday(scheduled_at) ASC, id ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}

pub struct EnrollmentRepository;

impl EnrollmentRepository {
    pub async fn find_by_class_id(pool: &SqlitePool, class_id: &str) -> AppResult<Vec<Enrollment>> {
        sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT id, class_id, student_id, created_at
            FROM enrollments
            WHERE class_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(class_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
