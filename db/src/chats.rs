use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use common::models::{ChatRecord, ChatSummary};
use sqlx::sqlite::SqlitePool;

use crate::StoreError;

pub struct ChatFields<'a> {
    pub model: &'a str,
    pub query: &'a str,
    pub response: &'a str,
}

/// Stored timestamps are always UTC with a fixed-width fraction, so the text
/// column sorts chronologically.
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    at.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub async fn insert_chat(pool: &SqlitePool, fields: &ChatFields<'_>) -> Result<i64, StoreError> {
    insert_chat_at(pool, fields, &Utc::now()).await
}

pub async fn insert_chat_at<Tz: TimeZone>(
    pool: &SqlitePool,
    fields: &ChatFields<'_>,
    at: &DateTime<Tz>,
) -> Result<i64, StoreError> {
    let result =
        sqlx::query("INSERT INTO chats (timestamp, model, query, response) VALUES (?, ?, ?, ?)")
            .bind(format_timestamp(at))
            .bind(fields.model)
            .bind(fields.query)
            .bind(fields.response)
            .execute(pool)
            .await?;
    Ok(result.last_insert_rowid())
}

/// Overwrite model, prompt and response of a chat that has not been continued
/// yet, and mark it continued. The creation timestamp is kept.
pub async fn update_chat(
    pool: &SqlitePool,
    id: i64,
    fields: &ChatFields<'_>,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE chats SET model = ?, query = ?, response = ?, continued = 1 \
         WHERE id = ? AND continued = 0",
    )
    .bind(fields.model)
    .bind(fields.query)
    .bind(fields.response)
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(if chat_exists(pool, id).await? {
            StoreError::AlreadyContinued(id)
        } else {
            StoreError::NotFound(id)
        });
    }
    Ok(())
}

pub async fn get_chat(pool: &SqlitePool, id: i64) -> Result<ChatRecord, StoreError> {
    sqlx::query_as::<_, ChatRecord>(
        "SELECT id, timestamp, model, query, response, continued FROM chats WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound(id))
}

pub async fn chat_exists(pool: &SqlitePool, id: i64) -> Result<bool, StoreError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(row.0 > 0)
}

/// Ok when `id` exists and can still take its one follow-up write.
pub async fn check_continuable(pool: &SqlitePool, id: i64) -> Result<(), StoreError> {
    let row: Option<(bool,)> = sqlx::query_as("SELECT continued FROM chats WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    match row {
        None => Err(StoreError::NotFound(id)),
        Some((true,)) => Err(StoreError::AlreadyContinued(id)),
        Some((false,)) => Ok(()),
    }
}

pub async fn list_chats(pool: &SqlitePool) -> Result<Vec<ChatRecord>, StoreError> {
    Ok(sqlx::query_as::<_, ChatRecord>(
        "SELECT id, timestamp, model, query, response, continued FROM chats \
         ORDER BY timestamp DESC, id DESC",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn list_chat_summaries(pool: &SqlitePool) -> Result<Vec<ChatSummary>, StoreError> {
    Ok(sqlx::query_as::<_, ChatSummary>(
        "SELECT id, timestamp, model, query FROM chats ORDER BY timestamp DESC, id DESC",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn delete_chat(pool: &SqlitePool, id: i64) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM chats WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

/// Delete every chat. Returns how many were removed.
pub async fn clear_chats(pool: &SqlitePool) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM chats").execute(pool).await?;
    Ok(result.rows_affected())
}
