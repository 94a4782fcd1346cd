//! Tolerant parsing of a model's JSON answer into a [`ModelResult`].
//!
//! Models are asked for strict JSON but routinely wrap it in Markdown fences,
//! prepend chatter, or emit numbers as strings. Anything that cannot be read
//! as an object with an `items` array is an error, which the caller turns
//! into the failure sentinel.

use anyhow::{Context, Result};
use serde_json::Value;

use crate::models::{FoodItem, ModelResult};

pub fn parse_model_output(model: &str, raw: &str) -> Result<ModelResult> {
    let value = extract_json_object(raw).context("No valid JSON object in model output")?;

    let object = value.as_object().context("Model output is not a JSON object")?;
    let raw_items = object
        .get("items")
        .and_then(Value::as_array)
        .context("Model output has no items array")?;

    let mut items = Vec::with_capacity(raw_items.len());
    for raw_item in raw_items {
        match parse_item(raw_item) {
            Some(item) => items.push(item),
            None => log::warn!("⚠️ {}: dropping item without usable carbs: {}", model, raw_item),
        }
    }

    let reported_total = object
        .get("total_carbs")
        .or_else(|| object.get("totalCarbs"))
        .and_then(coerce_number);

    let summary_text = object
        .get("summary")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| describe_items(&items));

    Ok(ModelResult {
        model: model.to_string(),
        items,
        summary_text,
        reported_total,
        succeeded: true,
    })
}

/// First complete JSON object in the text. Leading chatter, code fences
/// and anything after the object (even with braces) are ignored.
fn extract_json_object(raw: &str) -> Option<Value> {
    raw.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&raw[start..])
            .into_iter::<Value>()
            .next()
            .and_then(|parsed| parsed.ok())
            .filter(Value::is_object)
    })
}

fn parse_item(value: &Value) -> Option<FoodItem> {
    let object = value.as_object()?;
    let carbs = object.get("carbs").and_then(coerce_number)?;

    let name = object
        .get("name")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let mut item = FoodItem::new(name, carbs);
    if let Some(weight) = object.get("weight_g").and_then(coerce_number) {
        item = item.with_weight(weight);
    }
    if let Some(portion) = non_empty_str(object.get("portion_desc")) {
        item = item.with_portion(portion);
    }
    if let Some(reasoning) = non_empty_str(object.get("reasoning")) {
        item = item.with_reasoning(reasoning);
    }

    Some(item)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Numbers pass through, numeric strings ("25", "25 g") are parsed.
/// Anything else, including negative or non-finite values, is absent.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            let trimmed = trimmed
                .strip_suffix('g')
                .or_else(|| trimmed.strip_suffix('G'))
                .unwrap_or(trimmed)
                .trim();
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };

    (number.is_finite() && number >= 0.0).then_some(number)
}

fn describe_items(items: &[FoodItem]) -> String {
    if items.is_empty() {
        return "No food items identified.".to_string();
    }

    items
        .iter()
        .map(|item| format!("{}: {}g carbs", item.name, item.carbs))
        .collect::<Vec<_>>()
        .join("; ")
}
