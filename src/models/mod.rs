use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One dish identified by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_g: Option<f64>,
    pub carbs: f64,  // grams, always >= 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portion_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl FoodItem {
    pub fn new(name: impl Into<String>, carbs: f64) -> Self {
        Self {
            name: name.into(),
            weight_g: None,
            carbs,
            portion_desc: None,
            reasoning: None,
        }
    }

    pub fn with_weight(mut self, weight_g: f64) -> Self {
        self.weight_g = Some(weight_g);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_portion(mut self, portion_desc: impl Into<String>) -> Self {
        self.portion_desc = Some(portion_desc.into());
        self
    }
}

/// A single model's complete answer, or the failure sentinel standing in for it.
#[derive(Debug, Clone)]
pub struct ModelResult {
    pub model: String,
    pub items: Vec<FoodItem>,
    pub summary_text: String,
    pub reported_total: Option<f64>,  // model's own grand total, informational only
    pub succeeded: bool,
}

impl ModelResult {
    /// Empty contribution with a placeholder narrative naming the model.
    pub fn failed(model: &str) -> Self {
        Self {
            model: model.to_string(),
            items: Vec::new(),
            summary_text: format!("{} failed to provide an analysis.", model),
            reported_total: None,
            succeeded: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDetails {
    pub model_a_summary: String,
    pub model_b_summary: String,
}

/// Final reconciled answer returned by `POST /analyse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub total_carbs: i64,
    pub items: Vec<FoodItem>,
    pub details: AnalysisDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSize {
    Small,
    Standard,
    Large,
}

impl std::fmt::Display for MealSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MealSize::Small => "small",
            MealSize::Standard => "standard",
            MealSize::Large => "large",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyseRequest {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub user_context: Option<String>,
    #[serde(default)]
    pub meal_size: Option<MealSize>,
    #[serde(default)]
    pub user_id: Option<String>,     // tags the persisted history row
    #[serde(default)]
    pub image_path: Option<String>,  // storage object path, preferred over the signed URL when persisting
}

/// A persisted analysis row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub user_id: String,
    pub image_url: String,
    pub result_summary: String,
    pub result_details: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub user_id: String,
    pub image_url: String,
    pub result_summary: String,
    pub result_details: String,
}

impl NewAnalysis {
    pub fn from_result(user_id: &str, image_url: &str, result: &AnalysisResult) -> serde_json::Result<Self> {
        let details = serde_json::json!({
            "items": result.items,
            "details": result.details,
        });

        Ok(Self {
            user_id: user_id.to_string(),
            image_url: image_url.to_string(),
            result_summary: result.total_carbs.to_string(),
            result_details: serde_json::to_string(&details)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total_carbs: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarbStats {
    pub daily: Vec<DailyTotal>,  // last 7 days with entries, oldest first
    pub average_daily: i64,
    pub total_entries: usize,
    pub highest_day: Option<DailyTotal>,
}
