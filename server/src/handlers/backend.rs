use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use common::config::AppConfig;
use relay::BackendClient;
use serde::Deserialize;

use super::{backend_unavailable, json_error};
use crate::session::{self, SessionStore};

#[derive(Deserialize)]
pub struct InitializeRequest {
    #[serde(default)]
    pub model: String,
}

pub async fn backend_status(client: web::Data<BackendClient>) -> HttpResponse {
    HttpResponse::Ok().json(client.check_status().await)
}

pub async fn list_models(config: web::Data<AppConfig>) -> HttpResponse {
    HttpResponse::Ok().json(&config.models)
}

/// Pull (if needed) and warm up a model, then make it this client's
/// selection. Slow on first use of a model.
pub async fn initialize_model(
    req: HttpRequest,
    body: web::Json<InitializeRequest>,
    config: web::Data<AppConfig>,
    client: web::Data<BackendClient>,
    sessions: web::Data<SessionStore>,
) -> HttpResponse {
    let model = body.model.trim();
    if model.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "No model specified");
    }
    if config.find_model(model).is_none() {
        log::warn!("Model {} is not in the configured catalog", model);
    }

    let status = client.check_status().await;
    if !status.available {
        return backend_unavailable(status);
    }

    log::info!("Initializing model {}", model);
    if let Err(e) = client.ensure_model_ready(model).await {
        log::error!("{}", e);
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    let (id, cookie) = session::client_id_or_new(&req);
    sessions.select_model(id, model);
    log::info!("Client {} selected model {}", id, model);

    let mut resp = HttpResponse::Ok();
    if let Some(cookie) = cookie {
        resp.cookie(cookie);
    }
    resp.json(serde_json::json!({ "success": true }))
}
