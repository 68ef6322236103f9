use axum::{debug_handler, extract::{Query, State}, Json};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::db::Profile;
use crate::ChatError;

/// Queries shorter than this return nothing without touching the store.
const MIN_QUERY_LEN: usize = 2;
const MAX_RESULTS: i64 = 5;

#[derive(Deserialize)]
pub(crate) struct SearchQuery {
    q: Option<String>,
}

/// Recipient picker lookup for the admin composer. Store failures are
/// logged and collapse to an empty result set.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn search(
    State(db_pool): State<SqlitePool>,
    Query(SearchQuery { q }): Query<SearchQuery>,
) -> Json<Vec<Profile>> {
    let q = q.unwrap_or_default();
    match search_users(&db_pool, &q).await {
        Ok(rows) => Json(rows),
        Err(err) => {
            tracing::error!(error = %err, "user search failed");
            Json(Vec::new())
        }
    }
}

/// Case-insensitive pattern match over username and full name.
pub(crate) async fn search_users(
    pool: &SqlitePool,
    q: &str,
) -> Result<Vec<Profile>, ChatError> {
    let q = q.trim();
    if q.len() < MIN_QUERY_LEN {
        return Ok(Vec::new());
    }

    let pattern = format!("%{q}%");
    let rows = sqlx::query_as::<_, Profile>(
        "SELECT id,username,full_name FROM profiles \
         WHERE username LIKE ? OR full_name LIKE ? LIMIT ?",
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(MAX_RESULTS)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
