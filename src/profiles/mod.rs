mod search;

use axum::{routing::get, Router};
use sqlx::SqlitePool;

use crate::db::Profile;
use crate::{AppState, ChatError};

pub fn router() -> Router<AppState> {
    Router::new().route("/search", get(search::search))
}

pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<Profile>, ChatError> {
    let row = sqlx::query_as::<_, Profile>(
        "SELECT id,username,full_name FROM profiles WHERE id=?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn find_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<Profile>, ChatError> {
    let row = sqlx::query_as::<_, Profile>(
        "SELECT id,username,full_name FROM profiles WHERE username=?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
