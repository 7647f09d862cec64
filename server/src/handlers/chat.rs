use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use common::config::AppConfig;
use relay::{BackendClient, Conversation};
use serde::Deserialize;
use sqlx::SqlitePool;

use super::{backend_unavailable, json_error, store_error};
use crate::session::SessionStore;

#[derive(Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
    /// Continue (overwrite) this chat instead of starting a new one. Each
    /// chat takes at most one continuation.
    #[serde(default)]
    pub chat_id: Option<i64>,
    /// Used only when the client has no selected model.
    #[serde(default)]
    pub model: Option<String>,
    /// Backend generation options; the configured defaults apply otherwise.
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

pub async fn query(
    req: HttpRequest,
    body: web::Json<QueryRequest>,
    pool: web::Data<SqlitePool>,
    config: web::Data<AppConfig>,
    client: web::Data<BackendClient>,
    sessions: web::Data<SessionStore>,
) -> HttpResponse {
    let body = body.into_inner();
    if body.query.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "No query provided");
    }

    let model = match sessions
        .model_for(&req)
        .or_else(|| body.model.filter(|m| !m.trim().is_empty()))
    {
        Some(m) => m,
        None => return json_error(StatusCode::BAD_REQUEST, "No model selected"),
    };

    let conversation = match body.chat_id {
        None => Conversation::New {
            model,
            prompt: body.query,
        },
        Some(id) => match db::check_continuable(pool.get_ref(), id).await {
            Ok(()) => Conversation::Continue {
                id,
                model,
                prompt: body.query,
            },
            Err(e) => return store_error(e),
        },
    };

    let status = client.check_status().await;
    if !status.available {
        return backend_unavailable(status);
    }

    let options = body.options.or_else(|| config.generate_options_json());
    let (tx, rx) = relay::event_channel();
    actix_web::rt::spawn(relay::run_generation(
        client.get_ref().clone(),
        pool.get_ref().clone(),
        conversation,
        options,
        tx,
    ));
    relay::sse_response(rx)
}
