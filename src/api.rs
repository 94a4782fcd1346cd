// History and stats endpoints
pub mod history;

pub mod server {
    use axum::{
        extract::State,
        routing::{get, post},
        Json, Router,
    };
    use std::sync::Arc;
    use tower_http::cors::CorsLayer;

    use super::history::create_history_router;
    use crate::error::ApiError;
    use crate::handlers::AnalyseHandler;
    use crate::models::{AnalyseRequest, AnalysisResult};
    use crate::services::Database;

    pub struct AppState {
        pub analyse_handler: Arc<AnalyseHandler>,
    }

    pub fn create_router(handler: Arc<AnalyseHandler>, db: Option<Arc<Database>>) -> Router {
        let state = Arc::new(AppState { analyse_handler: handler });

        Router::new()
            .route("/", get(root_handler))
            .route("/analyse", post(analyse_handler))
            .route("/health", get(health_check))
            .with_state(state)
            .merge(create_history_router(db))
            .layer(CorsLayer::permissive())
    }

    async fn analyse_handler(
        State(state): State<Arc<AppState>>,
        body: String,
    ) -> Result<Json<AnalysisResult>, ApiError> {
        log::debug!("🔔 Analyse request received: {} bytes", body.len());

        let request: AnalyseRequest = serde_json::from_str(&body).map_err(|e| {
            log::warn!("⚠️ Failed to parse analyse request: {}", e);
            ApiError::InvalidRequest(format!("Invalid request body: {}", e))
        })?;

        let result = state.analyse_handler.handle(request).await?;
        Ok(Json(result))
    }

    async fn root_handler() -> &'static str {
        "CarbScope API - POST an image URL to /analyse for a carbohydrate estimate"
    }

    async fn health_check() -> &'static str {
        "OK"
    }

}
