use actix_web::{web, HttpResponse};
use common::models::ChatRecord;
use common::reasoning::{split_reasoning, SplitResponse};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::store_error;

#[derive(Deserialize)]
pub struct ChatIdRequest {
    pub chat_id: i64,
}

/// A stored chat plus its response split into reasoning and answer.
#[derive(Serialize)]
struct ChatView {
    #[serde(flatten)]
    record: ChatRecord,
    #[serde(flatten)]
    split: SplitResponse,
}

pub async fn chat_history(pool: web::Data<SqlitePool>) -> HttpResponse {
    match db::list_chat_summaries(pool.get_ref()).await {
        Ok(chats) => HttpResponse::Ok().json(chats),
        Err(e) => store_error(e),
    }
}

pub async fn get_chat(
    pool: web::Data<SqlitePool>,
    body: web::Json<ChatIdRequest>,
) -> HttpResponse {
    match db::get_chat(pool.get_ref(), body.chat_id).await {
        Ok(record) => {
            let split = split_reasoning(&record.response);
            HttpResponse::Ok().json(ChatView { record, split })
        }
        Err(e) => store_error(e),
    }
}

pub async fn delete_chat(
    pool: web::Data<SqlitePool>,
    body: web::Json<ChatIdRequest>,
) -> HttpResponse {
    match db::delete_chat(pool.get_ref(), body.chat_id).await {
        Ok(()) => {
            log::info!("Deleted chat {}", body.chat_id);
            HttpResponse::Ok().json(serde_json::json!({ "success": true }))
        }
        Err(e) => store_error(e),
    }
}

pub async fn clear_history(pool: web::Data<SqlitePool>) -> HttpResponse {
    match db::clear_chats(pool.get_ref()).await {
        Ok(n) => {
            log::info!("Cleared {} chats", n);
            HttpResponse::Ok().json(serde_json::json!({ "status": "success" }))
        }
        Err(e) => store_error(e),
    }
}
