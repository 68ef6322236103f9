pub mod auth;
pub mod chat;
pub mod conversations;
pub mod db;
pub mod feed;
pub mod messages;
pub mod profiles;
pub mod res;
pub mod session;

mod appresult;

pub use appresult::{AppError, AppResult};

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::feed::Feed;

/// Label shown for a message whose sender has no profile row. Applied at
/// render time only; the stored row keeps the raw sender id.
pub const SUPPORT_TEAM: &str = "Support Team";

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub feed: Feed,
}

/// Failures on the repository seam. Validation never reaches the store;
/// store errors are logged where caught and shown as a generic notice.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl ChatError {
    /// User-facing text for this failure. Validation messages are
    /// field-level; store failures collapse to one generic notice.
    pub fn notice(&self) -> &'static str {
        match self {
            ChatError::Validation(msg) => msg,
            ChatError::Store(_) => "Failed to send message",
        }
    }
}
