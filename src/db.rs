use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::include_res;

/// Timestamps are TEXT, UTC, millisecond precision, assigned by the
/// database at insert time so ordering never depends on client clocks.
pub const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ','now')";

pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await
}

pub async fn init(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(include_res!(str, "/schema.sql"))
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    // one connection, or every pool checkout would see its own :memory: db
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    init(&pool).await.unwrap();
    pool
}

#[cfg(test)]
pub(crate) async fn seed_profile(pool: &SqlitePool, id: &str, username: &str) {
    sqlx::query("INSERT INTO profiles (id,username,full_name) VALUES (?,?,NULL)")
        .bind(id)
        .bind(username)
        .execute(pool)
        .await
        .unwrap();
}
