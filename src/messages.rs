//! Message repository: append-and-list over the messages table, joined
//! with sender handles. Rows are immutable once stored.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{db, feed::Feed, ChatError};

pub const EMPTY_MESSAGE: &str = "Please enter a message";
pub const NO_RECIPIENT: &str = "Please select a recipient";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: String,
    /// Denormalized handle, resolved at list time. None when the sender
    /// has no profile row; render falls back to the support label.
    pub sender_username: Option<String>,
}

impl Message {
    pub fn sender_name(&self) -> &str {
        self.sender_username.as_deref().unwrap_or(crate::SUPPORT_TEAM)
    }
}

const SELECT_ROW: &str = "SELECT m.id, m.conversation_id, m.sender_id, m.content, \
     m.created_at, p.username AS sender_username \
     FROM messages m LEFT JOIN profiles p ON p.id = m.sender_id";

/// All messages of a conversation, earliest first. Equal timestamps keep
/// the backend's insertion order.
pub async fn list(
    pool: &SqlitePool,
    conversation_id: Uuid,
) -> Result<Vec<Message>, ChatError> {
    let rows = sqlx::query_as::<_, Message>(&format!(
        "{SELECT_ROW} WHERE m.conversation_id = ? ORDER BY m.created_at ASC"
    ))
    .bind(conversation_id.to_string())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Store one message and publish it on the feed. Content that trims to
/// nothing is rejected before any store round-trip. The conversation must
/// already exist; this never creates one.
pub async fn append(
    pool: &SqlitePool,
    feed: &Feed,
    conversation_id: Uuid,
    sender_id: &str,
    content: &str,
) -> Result<Message, ChatError> {
    if content.trim().is_empty() {
        return Err(ChatError::Validation(EMPTY_MESSAGE));
    }

    let id = Uuid::now_v7();
    sqlx::query(&format!(
        "INSERT INTO messages (id,conversation_id,sender_id,content,created_at) \
         VALUES (?,?,?,?,{})",
        db::NOW
    ))
    .bind(id.to_string())
    .bind(conversation_id.to_string())
    .bind(sender_id)
    .bind(content)
    .execute(pool)
    .await?;

    // read back for the database-assigned timestamp and joined handle
    let row = sqlx::query_as::<_, Message>(&format!("{SELECT_ROW} WHERE m.id = ?"))
        .bind(id.to_string())
        .fetch_one(pool)
        .await?;

    feed.publish(row.clone());
    Ok(row)
}
