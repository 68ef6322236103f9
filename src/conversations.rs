//! Conversation repository: find-or-create of a user's single active
//! support conversation, and fresh admin-initiated direct threads.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{db, ChatError};

pub const SUPPORT_TITLE: &str = "Support Chat";
pub const ACTIVE: &str = "active";

/// The user's active conversation, if one exists. When several qualify
/// the single-row pick is arbitrary.
pub async fn resolve_active(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<Uuid>, ChatError> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT c.id FROM conversations c \
         JOIN participants t ON t.conversation_id = c.id \
         WHERE t.user_id = ? AND c.status = ? LIMIT 1",
    )
    .bind(user_id)
    .bind(ACTIVE)
    .fetch_optional(pool)
    .await?;

    match row {
        Some((id,)) => Ok(Some(Uuid::parse_str(&id).map_err(|_| sqlx::Error::Decode(
            format!("bad conversation id {id}").into(),
        ))?)),
        None => Ok(None),
    }
}

/// Find the active conversation or create one titled "Support Chat" with
/// the user as sole participant. If the participant insert fails after
/// the conversation row landed, the conversation is not rolled back.
pub async fn resolve_or_create(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Uuid, ChatError> {
    if let Some(id) = resolve_active(pool, user_id).await? {
        return Ok(id);
    }

    let id = Uuid::now_v7();
    sqlx::query(&format!(
        "INSERT INTO conversations (id,title,status,created_at) VALUES (?,?,?,{})",
        db::NOW
    ))
    .bind(id.to_string())
    .bind(SUPPORT_TITLE)
    .bind(ACTIVE)
    .execute(pool)
    .await?;

    add_participant(pool, id, user_id).await?;

    tracing::info!(conversation_id = %id, user_id, "opened support conversation");
    Ok(id)
}

/// Always a fresh thread, titled with the recipient's handle, with both
/// the target and the initiating admin as participants. Never reuses an
/// existing conversation.
pub async fn create_direct(
    pool: &SqlitePool,
    target: &db::Profile,
    admin_id: &str,
) -> Result<Uuid, ChatError> {
    let id = Uuid::now_v7();
    sqlx::query(&format!(
        "INSERT INTO conversations (id,title,status,created_at) VALUES (?,?,?,{})",
        db::NOW
    ))
    .bind(id.to_string())
    .bind(format!("Admin Support - {}", target.username))
    .bind(ACTIVE)
    .execute(pool)
    .await?;

    add_participant(pool, id, &target.id).await?;
    add_participant(pool, id, admin_id).await?;

    tracing::info!(conversation_id = %id, target = %target.id, admin_id, "opened direct conversation");
    Ok(id)
}

async fn add_participant(
    pool: &SqlitePool,
    conversation_id: Uuid,
    user_id: &str,
) -> Result<(), ChatError> {
    sqlx::query("INSERT INTO participants (conversation_id,user_id) VALUES (?,?)")
        .bind(conversation_id.to_string())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{memory_pool, seed_profile};

    async fn count(pool: &SqlitePool, sql: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(sql).fetch_one(pool).await.unwrap();
        n
    }

    #[tokio::test]
    async fn resolve_creates_once_then_reuses() {
        let pool = memory_pool().await;

        assert!(resolve_active(&pool, "alice").await.unwrap().is_none());

        let first = resolve_or_create(&pool, "alice").await.unwrap();
        let second = resolve_or_create(&pool, "alice").await.unwrap();
        assert_eq!(first, second);

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM conversations").await, 1);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM participants").await, 1);
    }

    #[tokio::test]
    async fn created_conversation_is_titled_and_active() {
        let pool = memory_pool().await;
        let id = resolve_or_create(&pool, "alice").await.unwrap();

        let (title, status): (String, String) =
            sqlx::query_as("SELECT title,status FROM conversations WHERE id=?")
                .bind(id.to_string())
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(title, SUPPORT_TITLE);
        assert_eq!(status, ACTIVE);
    }

    #[tokio::test]
    async fn direct_conversation_is_always_fresh() {
        let pool = memory_pool().await;
        seed_profile(&pool, "bob", "bobby").await;
        let bob = db::Profile {
            id: "bob".to_owned(),
            username: "bobby".to_owned(),
            full_name: None,
        };

        let first = create_direct(&pool, &bob, "admin").await.unwrap();
        let second = create_direct(&pool, &bob, "admin").await.unwrap();
        assert_ne!(first, second);

        let (title,): (String,) =
            sqlx::query_as("SELECT title FROM conversations WHERE id=?")
                .bind(first.to_string())
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(title, "Admin Support - bobby");

        let n = count(
            &pool,
            &format!("SELECT COUNT(*) FROM participants WHERE conversation_id='{first}'"),
        )
        .await;
        assert_eq!(n, 2);
    }

    #[tokio::test]
    async fn users_do_not_share_support_conversations() {
        let pool = memory_pool().await;

        let a = resolve_or_create(&pool, "alice").await.unwrap();
        let b = resolve_or_create(&pool, "bob").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(resolve_active(&pool, "alice").await.unwrap(), Some(a));
    }
}
