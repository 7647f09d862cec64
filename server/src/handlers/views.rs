use actix_web::{web, HttpRequest, HttpResponse};
use common::config::AppConfig;
use pages::BackendView;
use relay::BackendClient;

use super::see_other;
use crate::session::{self, SessionStore};

pub async fn landing_page(
    req: HttpRequest,
    config: web::Data<AppConfig>,
    client: web::Data<BackendClient>,
    sessions: web::Data<SessionStore>,
) -> HttpResponse {
    if sessions.model_for(&req).is_some() {
        return see_other("/chat");
    }

    let status = client.check_status().await;
    let html = pages::landing::render_landing(
        &config.models,
        &BackendView {
            available: status.available,
            detail: status.detail.as_deref(),
        },
    );

    let mut resp = HttpResponse::Ok();
    if let (_, Some(cookie)) = session::client_id_or_new(&req) {
        resp.cookie(cookie);
    }
    resp.content_type("text/html").body(html)
}

pub async fn chat_page(
    req: HttpRequest,
    client: web::Data<BackendClient>,
    sessions: web::Data<SessionStore>,
) -> HttpResponse {
    let model = match sessions.model_for(&req) {
        Some(m) => m,
        None => return see_other("/"),
    };

    let status = client.check_status().await;
    let html = pages::chat::render_chat(
        &model,
        &BackendView {
            available: status.available,
            detail: status.detail.as_deref(),
        },
    );
    HttpResponse::Ok().content_type("text/html").body(html)
}
