mod backend;
mod chat;
mod history;
mod views;


pub use backend::*;
pub use chat::*;
pub use history::*;
pub use views::*;

use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use db::StoreError;
use relay::{BackendError, BackendStatus};

pub fn routes(cfg: &mut web::ServiceConfig) {
    let json_cfg = web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        InternalError::from_response(err, json_error(StatusCode::BAD_REQUEST, message)).into()
    });

    cfg.app_data(json_cfg)
        .route("/", web::get().to(landing_page))
        .route("/chat", web::get().to(chat_page))
        .route("/api/status", web::get().to(backend_status))
        .route("/api/models", web::get().to(list_models))
        .route("/initialize_model", web::post().to(initialize_model))
        .route("/query", web::post().to(query))
        .route("/chat_history", web::get().to(chat_history))
        .route("/get_chat", web::post().to(get_chat))
        .route("/delete_chat", web::post().to(delete_chat))
        .route("/clear_history", web::post().to(clear_history));
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({ "error": message.into() }))
}

fn store_error(e: StoreError) -> HttpResponse {
    match e {
        StoreError::NotFound(_) => json_error(StatusCode::NOT_FOUND, e.to_string()),
        StoreError::AlreadyContinued(_) => json_error(StatusCode::CONFLICT, e.to_string()),
        StoreError::Database(_) => {
            log::error!("{}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Failed status check: answered synchronously, no stream is opened.
fn backend_unavailable(status: BackendStatus) -> HttpResponse {
    let err = BackendError::Unavailable(
        status
            .detail
            .unwrap_or_else(|| "status check failed".to_string()),
    );
    log::warn!("{}", err);
    json_error(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
}

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", location))
        .finish()
}
