use std::sync::Arc;
use std::time::Duration;

use super::parser::parse_model_output;
use super::reconciler::{reconcile, ReconcileError};
use super::vision::{ImageReference, VisionModel};
use crate::models::{AnalysisResult, MealSize, ModelResult};

/// Queries both vision models concurrently and reconciles their answers.
pub struct AnalysisService {
    model_a: Arc<dyn VisionModel>,
    model_b: Arc<dyn VisionModel>,
    timeout: Duration,
}

impl AnalysisService {
    pub fn new(model_a: Arc<dyn VisionModel>, model_b: Arc<dyn VisionModel>, timeout: Duration) -> Self {
        Self {
            model_a,
            model_b,
            timeout,
        }
    }

    pub async fn analyse(
        &self,
        image: &ImageReference,
        meal_size: Option<MealSize>,
        user_context: Option<&str>,
    ) -> Result<AnalysisResult, ReconcileError> {
        let prompt = build_prompt(meal_size, user_context);

        // A stays the base list whichever call finishes first
        let (result_a, result_b) = tokio::join!(
            run_model(self.model_a.as_ref(), &prompt, image, self.timeout),
            run_model(self.model_b.as_ref(), &prompt, image, self.timeout),
        );

        log::info!(
            "🤝 Models finished: {}={} ({} items), {}={} ({} items)",
            result_a.model,
            if result_a.succeeded { "ok" } else { "failed" },
            result_a.items.len(),
            result_b.model,
            if result_b.succeeded { "ok" } else { "failed" },
            result_b.items.len(),
        );

        let result = reconcile(result_a, result_b)?;
        log::info!("✅ Reconciled {} items, total {}g carbs", result.items.len(), result.total_carbs);

        Ok(result)
    }
}

/// One model call under a deadline. Every failure becomes the sentinel.
async fn run_model(
    model: &dyn VisionModel,
    prompt: &str,
    image: &ImageReference,
    timeout: Duration,
) -> ModelResult {
    let model_id = model.model_id();

    let raw = match tokio::time::timeout(timeout, model.complete(prompt, image)).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            log::error!("❌ {} request failed: {:#}", model_id, e);
            return ModelResult::failed(model_id);
        }
        Err(_) => {
            log::error!("⏱️ {} did not answer within {:?}", model_id, timeout);
            return ModelResult::failed(model_id);
        }
    };

    match parse_model_output(model_id, &raw) {
        Ok(result) => result,
        Err(e) => {
            log::warn!("⚠️ {} returned unusable output: {:#}", model_id, e);
            log::debug!("📄 Raw output from {}: {}", model_id, raw);
            ModelResult::failed(model_id)
        }
    }
}

pub fn build_prompt(meal_size: Option<MealSize>, user_context: Option<&str>) -> String {
    let mut prompt = String::from(
        "You are a nutrition expert analysing a photo of a meal. Identify every food item \
         visible in the image and estimate its weight and carbohydrate content.\n\
         \n\
         Respond with ONLY a JSON object, no Markdown and no other text, in exactly this shape:\n\
         {\n\
           \"items\": [\n\
             {\n\
               \"name\": \"<food item name>\",\n\
               \"weight_g\": <estimated weight in grams, number>,\n\
               \"carbs\": <estimated carbohydrates in grams, number>,\n\
               \"portion_desc\": \"<short portion description>\",\n\
               \"reasoning\": \"<how the estimate was derived>\"\n\
             }\n\
           ],\n\
           \"total_carbs\": <sum of item carbs in grams, number>,\n\
           \"summary\": \"<two or three sentence human-readable summary>\"\n\
         }\n\
         \n\
         Use plain numbers without units for weight_g, carbs and total_carbs. \
         If you cannot identify any food, return an empty items array.",
    );

    if let Some(size) = meal_size {
        prompt.push_str(&format!("\n\nThe portion size is: {}.", size));
    }

    if let Some(context) = user_context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str(&format!("\n\nAdditional user-provided context: \"{}\"", context));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FoodItem;
    use crate::services::vision::testing::{Behaviour, FakeModel};
    use std::sync::atomic::Ordering;

    fn image() -> ImageReference {
        ImageReference::Url("data:image/jpeg;base64,/9j/".to_string())
    }

    fn service(a: Arc<FakeModel>, b: Arc<FakeModel>) -> AnalysisService {
        AnalysisService::new(a, b, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_both_models_merge() {
        let a = FakeModel::new("a", Behaviour::Reply(r#"{"items":[{"name":"Fried Rice","carbs":50,"weight_g":200}],"summary":"rice"}"#));
        let b = FakeModel::new("b", Behaviour::Reply(r#"{"items":[{"name":"fried rice with peas","carbs":60,"weight_g":260},{"name":"Spring Roll","carbs":"12"}]}"#));

        let result = service(a.clone(), b.clone()).analyse(&image(), None, None).await.unwrap();

        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].name, "fried rice with peas");
        assert_eq!(result.items[0].carbs, 55.0);
        assert_eq!(result.items[0].weight_g, Some(230.0));
        assert_eq!(result.items[1], FoodItem::new("Spring Roll", 12.0));
        assert_eq!(result.total_carbs, 67);
        assert_eq!(result.details.model_a_summary, "rice");
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_the_other() {
        let a = FakeModel::new("a", Behaviour::Fail);
        let b = FakeModel::new("b", Behaviour::Reply(r#"{"items":[{"name":"Rice","carbs":40}]}"#));

        let result = service(a, b).analyse(&image(), None, None).await.unwrap();

        assert_eq!(result.items, vec![FoodItem::new("Rice", 40.0)]);
        assert_eq!(result.details.model_a_summary, "a failed to provide an analysis.");
    }

    #[tokio::test]
    async fn test_timeout_becomes_sentinel() {
        let a = FakeModel::new("a", Behaviour::Reply(r#"{"items":[{"name":"Toast","carbs":15}]}"#));
        let b = FakeModel::new("b", Behaviour::Hang);

        let result = service(a, b).analyse(&image(), None, None).await.unwrap();

        assert_eq!(result.total_carbs, 15);
        assert_eq!(result.details.model_b_summary, "b failed to provide an analysis.");
    }

    #[tokio::test]
    async fn test_both_unparseable_is_an_error() {
        let a = FakeModel::new("a", Behaviour::Reply("I think this is about 40g of carbs."));
        let b = FakeModel::new("b", Behaviour::Reply("```json\n{ broken\n```"));

        let err = service(a, b).analyse(&image(), None, None).await.unwrap_err();
        assert_eq!(err, ReconcileError::NoUsableItems);
    }

    #[test]
    fn test_prompt_includes_optional_context() {
        let plain = build_prompt(None, None);
        assert!(plain.contains("\"items\""));
        assert!(!plain.contains("portion size is"));
        assert!(!plain.contains("user-provided context"));

        let full = build_prompt(Some(MealSize::Large), Some("  no dressing "));
        assert!(full.contains("The portion size is: large."));
        assert!(full.contains("Additional user-provided context: \"no dressing\""));

        let blank = build_prompt(None, Some("   "));
        assert!(!blank.contains("user-provided context"));
    }
}
