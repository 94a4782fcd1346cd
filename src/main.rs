mod api;
mod config;
mod error;
mod handlers;
mod models;
mod services;

use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;

use api::server::create_router;
use config::Config;
use handlers::AnalyseHandler;
use services::{AnalysisService, Database, ImageFetcher, VisionClient, VisionModel};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before the logger so RUST_LOG from .env applies
    dotenv().ok();
    env_logger::init();

    log::info!("🚀 Starting CarbScope...");

    let config = Config::from_env()?;

    // One HTTP connection pool shared by both model clients and the image fetcher
    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;

    let vision_client = |model: &str| -> Arc<dyn VisionModel> {
        Arc::new(VisionClient::new(
            http.clone(),
            config.api_key.clone(),
            config.api_url.clone(),
            model.to_string(),
            config.temperature,
            config.max_tokens,
        ))
    };
    let model_a = vision_client(&config.model_a);
    let model_b = vision_client(&config.model_b);
    log::info!("✅ Vision models: A={}, B={} (timeout {:?})", config.model_a, config.model_b, config.model_timeout);

    let db = match &config.database_url {
        Some(url) => {
            let db = Database::new(url).await.context("Failed to connect to DATABASE_URL")?;
            log::info!("✅ PostgreSQL history store initialized");
            Some(Arc::new(db))
        }
        None => {
            log::warn!("⚠️ DATABASE_URL not set, analysis history is disabled");
            None
        }
    };

    let analyse_handler = Arc::new(AnalyseHandler::new(
        ImageFetcher::new(http.clone(), config.inline_images, config.image_fetch_timeout),
        AnalysisService::new(model_a, model_b, config.model_timeout),
        db.clone(),
    ));

    let app = create_router(analyse_handler, db);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    log::info!("🌐 Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("🛑 Shutting down...");
        })
        .await?;

    Ok(())
}
