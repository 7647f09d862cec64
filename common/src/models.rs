use serde::{Deserialize, Serialize};

/// One prompt/response exchange as stored in the `chats` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatRecord {
    pub id: i64,
    pub timestamp: String,
    pub model: String,
    /// The user's prompt. Kept under the column name the browser client reads.
    pub query: String,
    pub response: String,
    /// Set once a follow-up prompt has replaced this chat; it cannot be
    /// continued again.
    pub continued: bool,
}

/// History listing row: everything except the (possibly long) response text.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatSummary {
    pub id: i64,
    pub timestamp: String,
    pub model: String,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub ram: String,
    pub description: String,
}

impl ModelSpec {
    pub fn new(name: &str, ram: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            ram: ram.to_string(),
            description: description.to_string(),
        }
    }
}
