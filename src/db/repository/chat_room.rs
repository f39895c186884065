use sqlx::SqlitePool;

use crate::db::models::ChatRoom;
use crate::error::{AppError, AppResult};

pub struct ChatRoomRepository;

impl ChatRoomRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<ChatRoom>> {
        sqlx::query_as::<_, ChatRoom>(
            "SELECT id, participants, created_at FROM chat_rooms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }
}
