use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::models::{AnalysisRecord, NewAnalysis};

/// Analysis history in PostgreSQL.
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let db = Database { pool };
        db.init_tables().await?;
        Ok(db)
    }

    async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analyses (
                id SERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                image_url TEXT NOT NULL,
                result_summary TEXT NOT NULL,
                result_details TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_analyses_user_created ON analyses (user_id, created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn insert_analysis(&self, analysis: &NewAnalysis) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO analyses (user_id, image_url, result_summary, result_details)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&analysis.user_id)
        .bind(&analysis.image_url)
        .bind(&analysis.result_summary)
        .bind(&analysis.result_details)
        .fetch_one(&self.pool)
        .await?;

        let id: i32 = result.get(0);
        Ok(id as i64)
    }

    /// Newest first, optionally limited to one UTC calendar day.
    pub async fn get_history(&self, user_id: &str, date: Option<NaiveDate>) -> Result<Vec<AnalysisRecord>> {
        let window = date.map(utc_day_bounds);
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, image_url, result_summary, result_details, created_at
            FROM analyses
            WHERE user_id = $1
                AND ($2::TIMESTAMPTZ IS NULL OR (
                    created_at >= $2::TIMESTAMPTZ
                    AND created_at < $3::TIMESTAMPTZ
                ))
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(window.map(|(start, _)| start))
        .bind(window.map(|(_, end)| end))
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .into_iter()
            .map(|row| AnalysisRecord {
                id: row.get::<i32, _>(0) as i64,
                user_id: row.get(1),
                image_url: row.get(2),
                result_summary: row.get(3),
                result_details: row.get(4),
                created_at: row.get(5),
            })
            .collect();

        Ok(records)
    }

    /// `(created_at, result_summary)` pairs, oldest first.
    pub async fn get_summaries(&self, user_id: &str) -> Result<Vec<(DateTime<Utc>, String)>> {
        let rows = sqlx::query(
            r#"
            SELECT created_at, result_summary
            FROM analyses
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| (row.get(0), row.get(1))).collect())
    }

    /// Returns false when the row doesn't exist or belongs to someone else.
    pub async fn delete_analysis(&self, id: i64, user_id: &str) -> Result<bool> {
        let Ok(id) = i32::try_from(id) else {
            return Ok(false);
        };

        let result = sqlx::query("DELETE FROM analyses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// `[midnight, next midnight)` of `date` in UTC, independent of the session time zone.
fn utc_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_utc_day_bounds() {
        let (start, end) = utc_day_bounds(NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());

        assert_eq!(start, Utc.with_ymd_and_hms(2026, 10, 15, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_utc_day_bounds_across_month_end() {
        let (start, end) = utc_day_bounds(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());

        assert_eq!(start.to_rfc3339(), "2026-02-28T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-03-01T00:00:00+00:00");
    }
}
