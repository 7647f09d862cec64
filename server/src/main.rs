mod handlers;
mod session;

use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use common::config::AppConfig;
use relay::BackendClient;

use crate::session::SessionStore;

#[derive(Parser, Clone)]
#[command(name = "chat-relay")]
pub struct Args {
    #[arg(long, default_value = "7860")]
    pub port: u16,

    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    #[arg(long, default_value = "chats.db")]
    pub db: String,

    #[arg(long, default_value = "chat-relay.toml")]
    pub config: String,

    /// Overrides `backend_url` from the config file.
    #[arg(long)]
    pub backend_url: Option<String>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = AppConfig::load(&args.config)?;
    if let Some(url) = &args.backend_url {
        config.backend_url = url.clone();
    }

    let pool = db::init_pool(&args.db).await?;
    let client = BackendClient::new(&config)?;

    let status = client.check_status().await;
    if status.available {
        log::info!("Backend reachable at {}", client.base_url());
    } else {
        log::warn!(
            "{}",
            status.detail.as_deref().unwrap_or("Backend not reachable")
        );
    }

    log::info!("Chat relay listening on http://localhost:{}", args.port);

    let config_data = web::Data::new(config);
    let pool_data = web::Data::new(pool);
    let client_data = web::Data::new(client);
    let sessions_data = web::Data::new(SessionStore::default());

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(config_data.clone())
            .app_data(pool_data.clone())
            .app_data(client_data.clone())
            .app_data(sessions_data.clone())
            .configure(handlers::routes)
    })
    .bind((args.bind.as_str(), args.port))?
    .run()
    .await?;

    Ok(())
}
