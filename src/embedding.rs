//! Embedding provider implementations.
//!
//! Every provider implements [`Embedder`] from `formsmith-core`:
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - **[`GeminiEmbedder`]**: calls `models/{model}:embedContent` on the Gemini API.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI `/v1/embeddings` endpoint.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//!
//! Use [`create_embedder`] to build the configured provider once at startup.
//! Retries follow [`crate::remote::send_json`].

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use formsmith_core::embedding::Embedder;

use crate::config::{EmbeddingConfig, Secrets};
use crate::remote;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Build the embedder selected by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig, secrets: &Secrets) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "gemini" => Ok(Arc::new(GeminiEmbedder::new(config, secrets)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config, secrets)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

fn required_model(config: &EmbeddingConfig, provider: &str) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow!("embedding.model required for {} provider", provider))
}

fn to_vector(values: &Value, what: &str) -> Result<Vec<f32>> {
    let values = values
        .as_array()
        .ok_or_else(|| anyhow!("Invalid {} response: embedding is not an array", what))?;
    let vec: Vec<f32> = values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect();
    if vec.is_empty() {
        bail!("Invalid {} response: empty embedding", what);
    }
    Ok(vec)
}

fn check_dims(vec: Vec<f32>, expected: Option<usize>) -> Result<Vec<f32>> {
    match expected {
        Some(dims) if dims != vec.len() => bail!(
            "embedding has {} dimensions, expected {} (check embedding.dims)",
            vec.len(),
            dims
        ),
        _ => Ok(vec),
    }
}

// ============ Disabled ============

/// A no-op embedder that always returns errors.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Gemini ============

/// Embedder backed by the Gemini `embedContent` endpoint.
///
/// Requires `GEMINI_API_KEY`.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: Option<usize>,
    max_retries: u32,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig, secrets: &Secrets) -> Result<Self> {
        let api_key = secrets
            .gemini_api_key
            .clone()
            .ok_or_else(|| anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: remote::client(config.timeout_secs)?,
            base_url: remote::base_url(config.url.as_deref(), GEMINI_BASE_URL),
            api_key,
            model: required_model(config, "Gemini")?,
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims.unwrap_or(0)
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/v1beta/models/{}:embedContent",
            self.base_url, self.model
        );
        let body = json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
        });

        let json = remote::send_json("Gemini API", self.max_retries, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await?;

        check_dims(parse_gemini_response(&json)?, self.dims)
    }
}

/// Extract `embedding.values` from an `embedContent` response.
fn parse_gemini_response(json: &Value) -> Result<Vec<f32>> {
    let values = json
        .get("embedding")
        .and_then(|e| e.get("values"))
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embedding.values"))?;
    to_vector(values, "Gemini")
}

// ============ OpenAI ============

/// Embedder backed by the OpenAI embeddings API.
///
/// Requires `OPENAI_API_KEY`.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: Option<usize>,
    max_retries: u32,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig, secrets: &Secrets) -> Result<Self> {
        let api_key = secrets
            .openai_api_key
            .clone()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: remote::client(config.timeout_secs)?,
            base_url: remote::base_url(config.url.as_deref(), OPENAI_BASE_URL),
            api_key,
            model: required_model(config, "OpenAI")?,
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims.unwrap_or(0)
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": [text],
        });

        let json = remote::send_json("OpenAI API", self.max_retries, || {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
        })
        .await?;

        check_dims(parse_openai_response(&json)?, self.dims)
    }
}

/// Extract `data[0].embedding` from an embeddings response.
fn parse_openai_response(json: &Value) -> Result<Vec<f32>> {
    let first = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;
    let embedding = first
        .get("embedding")
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
    to_vector(embedding, "OpenAI")
}

// ============ Ollama ============

/// Embedder backed by a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default: `http://localhost:11434`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: Option<usize>,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: remote::client(config.timeout_secs)?,
            base_url: remote::base_url(config.url.as_deref(), OLLAMA_BASE_URL),
            model: required_model(config, "Ollama")?,
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims.unwrap_or(0)
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);
        let body = json!({
            "model": self.model,
            "input": [text],
        });

        let json = remote::send_json("Ollama API", self.max_retries, || {
            self.client.post(&url).json(&body)
        })
        .await
        .with_context(|| format!("Ollama embedding failed (is Ollama running at {}?)", self.base_url))?;

        check_dims(parse_ollama_response(&json)?, self.dims)
    }
}

fn parse_ollama_response(json: &Value) -> Result<Vec<f32>> {
    let first = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|e| e.first())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;
    to_vector(first, "Ollama")
}
