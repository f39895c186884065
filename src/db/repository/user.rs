use sqlx::SqlitePool;

use crate::db::models::{UserPartition, UserRecord};
use crate::error::{AppError, AppResult};

pub struct UserRepository;

impl UserRepository {
    pub async fn find(
        pool: &SqlitePool,
        partition: UserPartition,
        id: &str,
    ) -> AppResult<Option<UserRecord>> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT partition, id, name, fcm_token, created_at
            FROM users
            WHERE partition = ? AND id = ?
            "#,
        )
        .bind(partition.as_str())
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Probe each partition in order and return the first record found.
    pub async fn find_in_partitions(
        pool: &SqlitePool,
        partitions: &[UserPartition],
        id: &str,
    ) -> AppResult<Option<UserRecord>> {
        for partition in partitions {
            if let Some(user) = Self::find(pool, *partition, id).await? {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    /// One page of a partition ordered by id, starting strictly after `after`.
    pub async fn list_page(
        pool: &SqlitePool,
        partition: UserPartition,
        after: Option<&str>,
        limit: i64,
    ) -> AppResult<Vec<UserRecord>> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT partition, id, name, fcm_token, created_at
            FROM users
            WHERE partition = ?
            AND (? IS NULL OR id > ?)
            ORDER BY id ASC
            LIMIT ?
            "#,
        )
        .bind(partition.as_str())
        .bind(after)
        .bind(after)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
