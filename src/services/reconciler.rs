//! Merges the two models' answers into one [`AnalysisResult`].
//!
//! Model A's items are the base list. Each of model B's items is matched
//! against the merged list by token Jaccard similarity of the names, taking
//! the first item (in list order) whose similarity exceeds
//! [`NAME_SIMILARITY_THRESHOLD`]. Matched pairs are averaged, unmatched
//! items are appended. The total is the rounded sum of the merged carbs.

use std::collections::HashSet;

use crate::models::{AnalysisDetails, AnalysisResult, FoodItem, ModelResult};

/// Similarity must be strictly greater than this for two names to match.
pub const NAME_SIMILARITY_THRESHOLD: f64 = 0.3;

const MODEL_A_TAG: &str = "[Model A]";
const MODEL_B_TAG: &str = "[Model B]";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReconcileError {
    #[error("no model produced any usable food items")]
    NoUsableItems,
}

/// Lowercased word tokens with punctuation removed.
pub fn tokenize(name: &str) -> HashSet<String> {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();

    intersection as f64 / union as f64
}

pub fn names_match(a: &str, b: &str) -> bool {
    jaccard_similarity(a, b) > NAME_SIMILARITY_THRESHOLD
}

/// Folds `incoming` into `base`. First match wins, not best match.
pub fn merge_items(base: Vec<FoodItem>, incoming: Vec<FoodItem>) -> Vec<FoodItem> {
    let mut merged = base;

    for item in incoming {
        match merged.iter_mut().find(|existing| names_match(&existing.name, &item.name)) {
            Some(existing) => {
                log::debug!("🔗 Merging '{}' into '{}'", item.name, existing.name);
                merge_pair(existing, item);
            }
            None => merged.push(item),
        }
    }

    merged
}

fn merge_pair(existing: &mut FoodItem, other: FoodItem) {
    existing.carbs = mean_rounded(existing.carbs, other.carbs);

    existing.weight_g = match (existing.weight_g, other.weight_g) {
        (Some(a), Some(b)) => Some(mean_rounded(a, b)),
        (a, b) => a.or(b),
    };

    existing.reasoning = merge_reasoning(existing.reasoning.take(), other.reasoning);

    if other.name.chars().count() > existing.name.chars().count() {
        existing.name = other.name;
    }

    if existing.portion_desc.is_none() {
        existing.portion_desc = other.portion_desc;
    }
}

fn merge_reasoning(existing: Option<String>, other: Option<String>) -> Option<String> {
    if existing.is_none() && other.is_none() {
        return None;
    }

    let existing = existing.unwrap_or_default();
    let other = other.unwrap_or_default();

    // Already tagged by an earlier merge: only add B's part.
    if existing.starts_with(MODEL_A_TAG) {
        return Some(format!("{} | {}: {}", existing, MODEL_B_TAG, other));
    }

    Some(format!("{}: {} | {}: {}", MODEL_A_TAG, existing, MODEL_B_TAG, other))
}

fn mean_rounded(a: f64, b: f64) -> f64 {
    ((a + b) / 2.0).round()
}

pub fn total_carbs(items: &[FoodItem]) -> i64 {
    items.iter().map(|item| item.carbs).sum::<f64>().round() as i64
}

/// Combines both models' results. An empty merged list is an error, since a
/// zero total would read as "this meal has no carbs".
pub fn reconcile(model_a: ModelResult, model_b: ModelResult) -> Result<AnalysisResult, ReconcileError> {
    for result in [&model_a, &model_b] {
        if let Some(reported) = result.reported_total {
            let item_sum = total_carbs(&result.items);
            log::debug!("📊 {} reported total {}g, items sum to {}g", result.model, reported, item_sum);
        }
    }

    let items = merge_items(model_a.items, model_b.items);

    if items.is_empty() {
        return Err(ReconcileError::NoUsableItems);
    }

    Ok(AnalysisResult {
        total_carbs: total_carbs(&items),
        items,
        details: AnalysisDetails {
            model_a_summary: model_a.summary_text,
            model_b_summary: model_b.summary_text,
        },
    })
}
