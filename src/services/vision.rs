use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Image handed to a vision model: either a URL the provider can read
/// (remote or `data:`), or bytes we fetched and encoded ourselves.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageReference {
    Url(String),
    Inline { mime_type: String, base64_data: String },
}

impl ImageReference {
    pub fn to_url(&self) -> String {
        match self {
            ImageReference::Url(url) => url.clone(),
            ImageReference::Inline { mime_type, base64_data } => {
                format!("data:{};base64,{}", mime_type, base64_data)
            }
        }
    }
}

/// A multimodal chat-completion backend.
#[async_trait::async_trait]
pub trait VisionModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// Returns the raw response text. Empty responses are errors.
    async fn complete(&self, prompt: &str, image: &ImageReference) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        #[serde(rename = "type")]
        content_type: String,
        text: String,
    },
    ImageUrl {
        #[serde(rename = "type")]
        content_type: String,
        image_url: ImageData,
    },
}

#[derive(Debug, Serialize)]
struct ImageData {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completions endpoint (Groq, OpenRouter, ...).
pub struct VisionClient {
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl VisionClient {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        endpoint: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            api_key,
            endpoint,
            model,
            temperature,
            max_tokens,
            client,
        }
    }

    fn build_request(&self, prompt: &str, image: &ImageReference) -> ChatRequest {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: vec![
                ContentPart::Text {
                    content_type: "text".to_string(),
                    text: prompt.to_string(),
                },
                ContentPart::ImageUrl {
                    content_type: "image_url".to_string(),
                    image_url: ImageData { url: image.to_url() },
                },
            ],
        }];

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Pulls the first choice's text out of a chat-completions body.
fn extract_content(response_text: &str) -> Result<String> {
    let chat_response: ChatResponse = serde_json::from_str(response_text)?;

    let content = chat_response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();

    if content.trim().is_empty() {
        anyhow::bail!("Empty response content");
    }

    Ok(content)
}

#[async_trait::async_trait]
impl VisionModel for VisionClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, image: &ImageReference) -> Result<String> {
        let request = self.build_request(prompt, image);

        log::info!("🤖 Sending request to vision API with model: {}", self.model);
        log::debug!("📤 Request payload size: {} bytes", serde_json::to_string(&request)?.len());

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 {} response status: {}", self.model, status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("❌ Vision API error response from {}: {}", self.model, error_text);
            anyhow::bail!("Vision API error ({}): {}", status, error_text);
        }

        let response_text = response.text().await?;
        log::debug!("📄 Raw response size from {}: {} bytes", self.model, response_text.len());

        let content = extract_content(&response_text)?;
        log::debug!("💬 {} response content: {}", self.model, content);

        Ok(content)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::testing::serve;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    fn client_for(endpoint: String) -> VisionClient {
        VisionClient::new(
            reqwest::Client::new(),
            "test_key".to_string(),
            endpoint,
            "test_model".to_string(),
            0.2,
            1024,
        )
    }

    fn client() -> VisionClient {
        client_for("http://localhost/v1/chat/completions".to_string())
    }

    async fn chat_host() -> String {
        let app = Router::new()
            .route(
                "/ok/chat/completions",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    let authorized = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        == Some("Bearer test_key");
                    if !authorized {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"})));
                    }
                    let content = format!("{{\"items\":[],\"summary\":\"{}\"}}", body["model"].as_str().unwrap_or(""));
                    (StatusCode::OK, Json(json!({"choices": [{"message": {"content": content}}]})))
                }),
            )
            .route(
                "/broken/chat/completions",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
            );
        serve(app).await
    }

    fn meal() -> ImageReference {
        ImageReference::Url("https://img.example/meal.jpg".to_string())
    }

    #[test]
    fn test_inline_image_becomes_data_url() {
        let image = ImageReference::Inline {
            mime_type: "image/png".to_string(),
            base64_data: "AAAA".to_string(),
        };
        assert_eq!(image.to_url(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_request_shape() {
        let request = client().build_request(
            "how many carbs?",
            &ImageReference::Url("https://img.example/meal.jpg".to_string()),
        );
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "test_model");
        assert_eq!(json["max_tokens"], 1024);
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);

        let content = &json["messages"][0]["content"];
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "how many carbs?");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "https://img.example/meal.jpg");
    }

    #[test]
    fn test_extract_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"items\":[]}"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), r#"{"items":[]}"#);
    }

    #[test]
    fn test_extract_content_rejects_empty() {
        assert!(extract_content(r#"{"choices":[]}"#).is_err());
        assert!(extract_content(r#"{"choices":[{"message":{"content":null}}]}"#).is_err());
        assert!(extract_content(r#"{"choices":[{"message":{"content":"  "}}]}"#).is_err());
        assert!(extract_content("not json").is_err());
    }

    #[tokio::test]
    async fn test_complete_returns_message_content() {
        let base = chat_host().await;
        let client = client_for(format!("{}/ok/chat/completions", base));

        let content = client.complete("carbs?", &meal()).await.unwrap();

        assert_eq!(content, r#"{"items":[],"summary":"test_model"}"#);
    }

    #[tokio::test]
    async fn test_complete_fails_on_server_error() {
        let base = chat_host().await;
        let client = client_for(format!("{}/broken/chat/completions", base));

        let err = client.complete("carbs?", &meal()).await.unwrap_err();

        assert!(err.to_string().contains("500"));
    }
}
