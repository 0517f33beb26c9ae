// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

mod blob;
mod config;
mod errors;
mod handlers;
mod models;
mod payload;
mod services;
mod view;

use crate::blob::{BlobRegistry, DisplayRegistry};
use crate::config::AppConfig;
use crate::services::{
    AnalysisClient, GuidelineRepository, ImageProcessor, MemorySessionStore,
    RemoteGuidelineRepository, RedisSessionStore, SessionLocks, SessionStore,
};

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<dyn SessionStore>,
    session_locks: SessionLocks,
    analysis_client: Arc<AnalysisClient>,
    guidelines: Arc<dyn GuidelineRepository>,
    image_processor: Arc<ImageProcessor>,
    blobs: BlobRegistry,
    displays: DisplayRegistry,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("invalid configuration")?;
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    info!("Starting adlens gateway...");

    // Initialize services
    let session_ttl = Duration::from_secs(config.session_ttl_secs);
    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisSessionStore::new(url, config.session_ttl_secs)
                .await
                .context("failed to connect to Redis")?,
        ),
        None => {
            warn!("ADLENS_REDIS_URL not set; sessions are kept in memory");
            Arc::new(MemorySessionStore::new(session_ttl))
        }
    };
    let analysis_client = Arc::new(AnalysisClient::new(config.api_base_url.clone()));
    let guidelines: Arc<dyn GuidelineRepository> =
        Arc::new(RemoteGuidelineRepository::new(analysis_client.clone()));
    let image_processor = Arc::new(ImageProcessor::new(config.max_image_edge));

    let app_state = AppState {
        sessions,
        session_locks: SessionLocks::new(),
        analysis_client,
        guidelines,
        image_processor,
        blobs: BlobRegistry::new(),
        displays: DisplayRegistry::new(session_ttl),
    };

    let (host, port) = config.bind_addr();
    info!(
        "Starting HTTP server on {}:{} (review service at {})",
        host, port, config.api_base_url
    );

    let static_dir = config.static_dir.clone();
    HttpServer::new(move || {
        let app = App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::routes)
            .route("/health", web::get().to(health_check));

        // Front-end assets go last so they never shadow the API.
        match &static_dir {
            Some(dir) => app.service(actix_files::Files::new("/", dir).index_file("index.html")),
            None => app,
        }
    })
    .bind((host, port))?
    .run()
    .await?;

    Ok(())
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "adlens",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
