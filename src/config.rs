use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL_A: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
const DEFAULT_MODEL_B: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub model_a: String,
    pub model_b: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub model_timeout: Duration,
    pub image_fetch_timeout: Duration,
    pub inline_images: bool,
    pub database_url: Option<String>,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("VISION_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .context("VISION_API_KEY must be set in .env file")?;

        let string_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            api_key,
            api_url: string_or("VISION_API_URL", DEFAULT_API_URL),
            model_a: string_or("MODEL_A", DEFAULT_MODEL_A),
            model_b: string_or("MODEL_B", DEFAULT_MODEL_B),
            temperature: parse_or(&lookup, "VISION_TEMPERATURE", 0.2)?,
            max_tokens: parse_or(&lookup, "VISION_MAX_TOKENS", 1024)?,
            model_timeout: Duration::from_secs(parse_or(&lookup, "MODEL_TIMEOUT_SECS", 60)?),
            image_fetch_timeout: Duration::from_secs(parse_or(&lookup, "IMAGE_FETCH_TIMEOUT_SECS", 20)?),
            inline_images: parse_or(&lookup, "INLINE_IMAGES", true)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            bind_addr: string_or("BIND_ADDR", "0.0.0.0:8080"),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
