use std::sync::Arc;

use sqlx::SqlitePool;

use crate::db::{ChatRoomRepository, NotificationType, UserPartition, UserRepository};
use crate::error::{AppError, AppResult};
use crate::services::events::ChatMessageEvent;
use crate::services::non_empty;
use crate::services::push::{send_all_concurrently, DeliveryReport, PushGateway, PushMessage};

const CHAT_CHANNEL_ID: &str = "chat_notifications";

/// Pushes a new chat message to the other participant of the room.
pub struct ChatNotifier {
    pool: SqlitePool,
    push: Arc<dyn PushGateway>,
}

impl ChatNotifier {
    pub fn new(pool: SqlitePool, push: Arc<dyn PushGateway>) -> Self {
        Self { pool, push }
    }

    /// Run the notifier for one event. Never fails: every error is logged here.
    pub async fn handle(&self, event: &ChatMessageEvent) -> DeliveryReport {
        match self.notify(event).await {
            Ok(report) => report,
            Err(e) => {
                e.log(&format!(
                    "Chat notification skipped for message {} in room {}",
                    event.message_id, event.chat_room_id
                ));
                DeliveryReport::default()
            }
        }
    }

    async fn notify(&self, event: &ChatMessageEvent) -> AppResult<DeliveryReport> {
        let message = &event.message;
        let (sender_id, text) = match (
            non_empty(message.sender_id.as_deref()),
            non_empty(message.text.as_deref()),
        ) {
            (Some(sender_id), Some(text)) => (sender_id, text),
            _ => {
                return Err(AppError::MissingField(
                    "senderId or message text".to_string(),
                ))
            }
        };
        let sender_name = non_empty(message.sender_name.as_deref()).unwrap_or("Unknown");

        let room = ChatRoomRepository::find_by_id(&self.pool, &event.chat_room_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("chat room {}", event.chat_room_id)))?;

        let participants = room.participant_ids();
        if participants.len() != 2 {
            return Err(AppError::BadRequest(format!(
                "chat room {} has {} participants, expected 2",
                room.id,
                participants.len()
            )));
        }

        let receiver_id = participants
            .iter()
            .find(|id| id.as_str() != sender_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("receiver in chat room {}", room.id))
            })?;

        let receiver = UserRepository::find_in_partitions(
            &self.pool,
            &[UserPartition::Teachers, UserPartition::Students],
            receiver_id,
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", receiver_id)))?;

        let tokens = receiver.push_tokens();
        if tokens.is_empty() {
            tracing::warn!("No push tokens for user {}", receiver.id);
            return Ok(DeliveryReport::default());
        }

        let title = format!("New message from {}", sender_name);
        let messages: Vec<PushMessage> = tokens
            .into_iter()
            .map(|token| {
                PushMessage::new(token, title.as_str(), text)
                    .with_data("chatRoomId", event.chat_room_id.as_str())
                    .with_data("senderId", sender_id)
                    .with_data("senderName", sender_name)
                    .with_data("messageId", event.message_id.as_str())
                    .with_data("type", NotificationType::Chat.as_str())
                    .with_android_channel(CHAT_CHANNEL_ID)
            })
            .collect();

        let report = send_all_concurrently(self.push.as_ref(), messages).await;
        tracing::info!(
            "Chat notification for room {} delivered to user {}: sent={}, failed={}",
            room.id,
            receiver.id,
            report.push_sent,
            report.push_failed
        );
        Ok(report)
    }
}
