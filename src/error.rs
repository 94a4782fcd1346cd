use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Errors that reach the HTTP caller. Per-model failures never end up here,
/// they are absorbed as sentinels before reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing imageUrl")]
    MissingImageUrl,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Failed to fetch image: {0}")]
    ImageFetch(String),

    #[error("Both AI models failed to provide an analysis.")]
    BothModelsFailed,

    #[error("History storage is not configured")]
    StorageUnavailable,

    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingImageUrl | ApiError::InvalidRequest(_) | ApiError::ImageFetch(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::BothModelsFailed | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Message shown to the caller. Image fetch and internal details stay in the log.
    fn public_message(&self) -> String {
        match self {
            ApiError::ImageFetch(_) => "Failed to fetch image".to_string(),
            ApiError::Internal(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(e) => log::error!("❌ Internal error: {:#}", e),
            ApiError::ImageFetch(reason) => log::warn!("⚠️ Image fetch failed: {}", reason),
            ApiError::BothModelsFailed => log::error!("❌ Both models failed, no analysis available"),
            _ => log::debug!("Request rejected: {}", self),
        }

        let body = Json(serde_json::json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}
