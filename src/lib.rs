pub mod config;
pub mod db;
pub mod handlers;
pub mod llm;

use actix_web::{web, App, HttpServer};
use config::Config;
use db::KnowledgeStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Shared, read-only state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Config,
    pub knowledge: Option<KnowledgeStore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let knowledge = config.database_path.clone().map(KnowledgeStore::new);
        Self { config, knowledge }
    }
}

pub async fn run() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();
    match &config.database_path {
        Some(path) => info!("Knowledge base at {}", path.display()),
        None => info!("DATABASE_URL not set, knowledge base disabled"),
    }

    let state = web::Data::new(AppState::new(config));
    info!("Listening on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
