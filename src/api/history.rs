use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{AnalysisRecord, CarbStats};
use crate::services::{Database, StatsService};

#[derive(Clone)]
pub struct HistoryState {
    pub db: Option<Arc<Database>>,
    pub stats: Option<Arc<StatsService>>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    user_id: String,
    date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct UserQuery {
    user_id: String,
}

#[derive(Deserialize)]
pub struct StatsQuery {
    user_id: String,
    tz: Option<String>,
}

/// History routes. Without a database every route answers 503.
pub fn create_history_router(db: Option<Arc<Database>>) -> Router {
    let stats = db.clone().map(|db| Arc::new(StatsService::new(db)));
    let state = HistoryState { db, stats };

    Router::new()
        .route("/history", get(get_history))
        .route("/history/:id", delete(delete_entry))
        .route("/stats", get(get_stats))
        .with_state(state)
}

fn parse_timezone(tz: Option<&str>) -> Result<Tz, ApiError> {
    match tz.map(str::trim).filter(|tz| !tz.is_empty()) {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| ApiError::InvalidRequest(format!("Unknown timezone: {}", name))),
        None => Ok(chrono_tz::UTC),
    }
}

/// A user's analyses, newest first
async fn get_history(
    Query(query): Query<HistoryQuery>,
    State(state): State<HistoryState>,
) -> Result<Json<Vec<AnalysisRecord>>, ApiError> {
    let db = state.db.ok_or(ApiError::StorageUnavailable)?;

    let records = db.get_history(&query.user_id, query.date).await?;
    log::debug!("📜 {} history entries for {}", records.len(), query.user_id);

    Ok(Json(records))
}

async fn delete_entry(
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
    State(state): State<HistoryState>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.ok_or(ApiError::StorageUnavailable)?;

    if !db.delete_analysis(id, &query.user_id).await? {
        return Err(ApiError::NotFound);
    }

    log::info!("🗑️ Deleted analysis {} for user {}", id, query.user_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn get_stats(
    Query(query): Query<StatsQuery>,
    State(state): State<HistoryState>,
) -> Result<Json<CarbStats>, ApiError> {
    let stats = state.stats.ok_or(ApiError::StorageUnavailable)?;
    let tz = parse_timezone(query.tz.as_deref())?;

    Ok(Json(stats.get_stats(&query.user_id, tz).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone(None).unwrap(), chrono_tz::UTC);
        assert_eq!(parse_timezone(Some("")).unwrap(), chrono_tz::UTC);
        assert_eq!(parse_timezone(Some("Europe/London")).unwrap(), chrono_tz::Europe::London);
        assert!(matches!(parse_timezone(Some("Mars/Olympus")), Err(ApiError::InvalidRequest(_))));
    }

    #[test]
    fn test_history_query_deserialization() {
        let query: HistoryQuery = serde_json::from_str(r#"{"user_id": "u1", "date": "2026-10-15"}"#).unwrap();
        assert_eq!(query.user_id, "u1");
        assert_eq!(query.date, NaiveDate::from_ymd_opt(2026, 10, 15));
    }
}
