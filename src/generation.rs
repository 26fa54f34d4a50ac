//! Text-generation clients implementing [`SchemaGenerator`].
//!
//! Both clients ask the model for a bare JSON answer (`responseMimeType`
//! on Gemini, `response_format` on OpenAI); parsing stays in
//! `formsmith_core::generation`.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use formsmith_core::generation::SchemaGenerator;

use crate::config::{GenerationConfig, Secrets};
use crate::remote;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Build the generator selected by `config.provider`.
pub fn create_generator(
    config: &GenerationConfig,
    secrets: &Secrets,
) -> Result<Arc<dyn SchemaGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config, secrets)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config, secrets)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

fn required_model(config: &GenerationConfig, provider: &str) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow!("generation.model required for {} provider", provider))
}

/// Always fails; used when no generation provider is configured.
pub struct DisabledGenerator;

#[async_trait]
impl SchemaGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _instruction: &str) -> Result<String> {
        bail!("Generation provider is disabled")
    }
}

/// Gemini `generateContent` client.
pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig, secrets: &Secrets) -> Result<Self> {
        let api_key = secrets
            .gemini_api_key
            .clone()
            .ok_or_else(|| anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: remote::client(config.timeout_secs)?,
            base_url: remote::base_url(config.url.as_deref(), GEMINI_BASE_URL),
            api_key,
            model: required_model(config, "Gemini")?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl SchemaGenerator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, instruction: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": instruction }] }],
            "generationConfig": { "responseMimeType": "application/json" },
        });

        let json = remote::send_json("Gemini API", self.max_retries, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await?;

        parse_gemini_response(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_response(json: &Value) -> Result<String> {
    if let Some(reason) = json
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        bail!("Gemini blocked the prompt: {}", reason);
    }

    let parts = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing candidates[0].content.parts"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.trim().is_empty() {
        bail!("Invalid Gemini response: empty text");
    }
    Ok(text)
}

/// OpenAI chat-completions client.
pub struct OpenAIGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig, secrets: &Secrets) -> Result<Self> {
        let api_key = secrets
            .openai_api_key
            .clone()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: remote::client(config.timeout_secs)?,
            base_url: remote::base_url(config.url.as_deref(), OPENAI_BASE_URL),
            api_key,
            model: required_model(config, "OpenAI")?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl SchemaGenerator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, instruction: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": instruction }],
            "response_format": { "type": "json_object" },
        });

        let json = remote::send_json("OpenAI API", self.max_retries, || {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
        })
        .await?;

        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}
