mod chats;

pub use chats::*;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Chat {0} not found")]
    NotFound(i64),
    #[error("Chat {0} has already been continued")]
    AlreadyContinued(i64),
    #[error("DB error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn init_pool(db_path: &str) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory pool; every connection to `sqlite::memory:`
/// is its own database, so the pool must never open a second one.
pub async fn init_memory_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    for stmt in include_str!("../../migrations/001_init.sql").split(';') {
        let stmt = stmt.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt).execute(pool).await?;
        }
    }
    Ok(())
}
