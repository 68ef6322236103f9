use tower_sessions::Session;

use crate::AppResult;

pub const USER_ID: &str = "user_id";
pub const IS_ADMIN: &str = "is_admin";

/// Asynchronous "who is the current user" lookup against the session store.
pub async fn current_user(session: &Session) -> AppResult<Option<String>> {
    Ok(session.get::<String>(USER_ID).await?)
}

pub async fn is_admin(session: &Session) -> AppResult<bool> {
    Ok(session.get::<bool>(IS_ADMIN).await?.unwrap_or(false))
}
