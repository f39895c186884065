use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: String,
    /// JSON array of participant ids.
    pub participants: String,
    pub created_at: NaiveDateTime,
}

impl ChatRoom {
    /// Participant ids in stored order. Malformed JSON yields an empty list so
    /// callers reject the room instead of guessing.
    pub fn participant_ids(&self) -> Vec<String> {
        serde_json::from_str::<Vec<String>>(&self.participants).unwrap_or_default()
    }
}

/// A chat message document as delivered by the message-created event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub text: Option<String>,
}
