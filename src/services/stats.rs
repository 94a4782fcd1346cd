use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{CarbStats, DailyTotal};
use crate::services::Database;

const CHART_DAYS: usize = 7;

pub struct StatsService {
    db: Arc<Database>,
}

impl StatsService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn get_stats(&self, user_id: &str, tz: Tz) -> Result<CarbStats> {
        let rows = self.db.get_summaries(user_id).await?;
        let stats = summarize(&rows, tz);

        log::info!(
            "📊 Stats for {}: entries={}, days={}, avg={}g",
            user_id,
            stats.total_entries,
            stats.daily.len(),
            stats.average_daily
        );

        Ok(stats)
    }
}

/// Buckets entries by local calendar day in `tz`. Rows whose summary isn't
/// numeric still count as entries but add nothing to any day.
pub fn summarize(rows: &[(DateTime<Utc>, String)], tz: Tz) -> CarbStats {
    let mut totals_by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for (created_at, summary) in rows {
        if let Some(carbs) = parse_summary(summary) {
            let day = created_at.with_timezone(&tz).date_naive();
            *totals_by_day.entry(day).or_insert(0.0) += carbs;
        }
    }

    let days: Vec<DailyTotal> = totals_by_day
        .iter()
        .map(|(date, total)| DailyTotal {
            date: *date,
            total_carbs: total.round() as i64,
        })
        .collect();

    let average_daily = if totals_by_day.is_empty() {
        0
    } else {
        (totals_by_day.values().sum::<f64>() / totals_by_day.len() as f64).round() as i64
    };

    // Earliest day wins a tie
    let highest_day = totals_by_day
        .iter()
        .fold(None::<(NaiveDate, f64)>, |best, (date, total)| match best {
            Some((_, best_total)) if *total <= best_total => best,
            _ => Some((*date, *total)),
        })
        .map(|(date, total)| DailyTotal {
            date,
            total_carbs: total.round() as i64,
        });

    let skip = days.len().saturating_sub(CHART_DAYS);

    CarbStats {
        daily: days.into_iter().skip(skip).collect(),
        average_daily,
        total_entries: rows.len(),
        highest_day,
    }
}

/// Leading decimal number of a stored summary ("42", "42.5g"), like a lenient float parse.
pub fn parse_summary(summary: &str) -> Option<f64> {
    let trimmed = summary.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    for (i, c) in trimmed.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }

    if !seen_digit {
        return None;
    }

    trimmed[..end].parse::<f64>().ok()
}
