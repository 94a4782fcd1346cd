use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{AnalyseRequest, AnalysisResult, NewAnalysis};
use crate::services::reconciler::ReconcileError;
use crate::services::{AnalysisService, Database, ImageFetcher};

/// The analyse use case: validate, resolve the image, query both models,
/// then record the result for the user's history.
pub struct AnalyseHandler {
    fetcher: ImageFetcher,
    analysis: AnalysisService,
    db: Option<Arc<Database>>,
}

impl AnalyseHandler {
    pub fn new(fetcher: ImageFetcher, analysis: AnalysisService, db: Option<Arc<Database>>) -> Self {
        Self { fetcher, analysis, db }
    }

    pub async fn handle(&self, request: AnalyseRequest) -> Result<AnalysisResult, ApiError> {
        let image_url = request
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ApiError::MissingImageUrl)?;

        log::info!(
            "📨 Analyse request - meal size: {:?}, has context: {}, user: {:?}",
            request.meal_size,
            request.user_context.is_some(),
            request.user_id
        );

        let image = self.fetcher.resolve(image_url).await?;

        let result = self
            .analysis
            .analyse(&image, request.meal_size, request.user_context.as_deref())
            .await
            .map_err(|e| match e {
                ReconcileError::NoUsableItems => ApiError::BothModelsFailed,
            })?;

        self.record(&request, image_url, &result);

        Ok(result)
    }

    /// Fire-and-forget history insert; failures are only logged.
    fn record(&self, request: &AnalyseRequest, image_url: &str, result: &AnalysisResult) {
        let (Some(db), Some(user_id)) = (self.db.clone(), request.user_id.as_deref()) else {
            return;
        };

        let stored_url = request.image_path.as_deref().unwrap_or(image_url);
        let row = match NewAnalysis::from_result(user_id, stored_url, result) {
            Ok(row) => row,
            Err(e) => {
                log::error!("❌ Failed to serialize analysis for history: {}", e);
                return;
            }
        };

        tokio::spawn(async move {
            match db.insert_analysis(&row).await {
                Ok(id) => log::info!("💾 Saved analysis {} for user {}", id, row.user_id),
                Err(e) => log::error!("❌ Failed to save analysis for user {}: {}", row.user_id, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::vision::testing::{serve, Behaviour, FakeModel};
    use axum::{http::StatusCode, routing::get, Router};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const RICE: &str = r#"{"items":[{"name":"Rice","carbs":40}]}"#;

    fn handler(a: Arc<FakeModel>, b: Arc<FakeModel>) -> AnalyseHandler {
        AnalyseHandler::new(
            ImageFetcher::new(reqwest::Client::new(), true, Duration::from_secs(5)),
            AnalysisService::new(a, b, Duration::from_millis(200)),
            None,
        )
    }

    fn request(image_url: Option<&str>) -> AnalyseRequest {
        AnalyseRequest {
            image_url: image_url.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_image_url_makes_no_model_calls() {
        let a = FakeModel::new("a", Behaviour::Reply(RICE));
        let b = FakeModel::new("b", Behaviour::Reply(RICE));
        let handler = handler(a.clone(), b.clone());

        let err = handler.handle(request(None)).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingImageUrl));

        let err = handler.handle(request(Some("   "))).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingImageUrl));

        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_both_failed_maps_to_api_error() {
        let handler = handler(FakeModel::new("a", Behaviour::Fail), FakeModel::new("b", Behaviour::Reply("no idea")));

        let err = handler
            .handle(request(Some("data:image/jpeg;base64,/9j/")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BothModelsFailed));
    }

    #[tokio::test]
    async fn test_success_without_storage() {
        let handler = handler(FakeModel::new("a", Behaviour::Reply(RICE)), FakeModel::new("b", Behaviour::Fail));

        let mut req = request(Some("data:image/jpeg;base64,/9j/"));
        req.user_id = Some("user-1".to_string());

        let result = handler.handle(req).await.unwrap();
        assert_eq!(result.total_carbs, 40);
    }

    #[tokio::test]
    async fn test_unreachable_image_is_a_bad_request_without_model_calls() {
        let base = serve(Router::new().route("/gone.jpg", get(|| async { StatusCode::NOT_FOUND }))).await;
        let a = FakeModel::new("a", Behaviour::Reply(RICE));
        let b = FakeModel::new("b", Behaviour::Reply(RICE));
        let handler = handler(a.clone(), b.clone());

        let err = handler
            .handle(request(Some(&format!("{}/gone.jpg", base))))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::ImageFetch(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }
}
