//! Configuration loading and secrets.
//!
//! Settings come from a TOML file (`config/formsmith.toml` by default).
//! Credentials never live in the file: they are read from the environment
//! (optionally seeded from a `.env` file) into [`Secrets`].
//!
//! ```toml
//! [db]
//! path = "./data/formsmith.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:5000"
//! frontend_url = "http://localhost:5173"
//!
//! [embedding]
//! provider = "gemini"
//! model = "text-embedding-004"
//! dims = 768
//!
//! [generation]
//! provider = "gemini"
//! model = "gemini-1.5-flash"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub images: ImagesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Origin allowed by CORS (credentials included).
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            frontend_url: default_frontend_url(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}
fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}
fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_hours: default_token_ttl_hours(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

fn default_token_ttl_hours() -> u64 {
    24 * 7
}
fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of prior forms handed to the generator as context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    formsmith_core::retrieval::DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Expected vector length. Responses of another length are rejected.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (tests, proxies, self-hosted Ollama).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            timeout_secs: default_embedding_timeout(),
            max_retries: 0,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            timeout_secs: default_generation_timeout(),
            max_retries: 0,
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImagesConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Remote folder uploads are placed in.
    #[serde(default = "default_images_folder")]
    pub folder: String,
    #[serde(default = "default_image_max_bytes")]
    pub max_bytes: usize,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_images_timeout")]
    pub timeout_secs: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            folder: default_images_folder(),
            max_bytes: default_image_max_bytes(),
            url: None,
            timeout_secs: default_images_timeout(),
        }
    }
}

fn default_images_folder() -> String {
    "form-uploads".to_string()
}
fn default_image_max_bytes() -> usize {
    5 * 1024 * 1024
}
fn default_images_timeout() -> u64 {
    60
}

impl Config {
    /// Defaults for everything, with the database at `db_path`.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            images: ImagesConfig::default(),
        }
    }

    /// Check values that serde alone cannot.
    pub fn validate(&self) -> Result<()> {
        if self.server.body_limit_bytes == 0 {
            bail!("server.body_limit_bytes must be > 0");
        }
        if self.auth.token_ttl_hours == 0 {
            bail!("auth.token_ttl_hours must be > 0");
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            bail!("auth.bcrypt_cost must be in [4, 31]");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "gemini" | "openai" | "ollama" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, gemini, openai, or ollama.",
                other
            ),
        }
        if self.embedding.is_enabled() && self.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                self.embedding.provider
            );
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0 when set");
        }

        match self.generation.provider.as_str() {
            "disabled" | "gemini" | "openai" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be disabled, gemini, or openai.",
                other
            ),
        }
        if self.generation.is_enabled() && self.generation.model.is_none() {
            bail!(
                "generation.model must be specified when provider is '{}'",
                self.generation.provider
            );
        }

        match self.images.provider.as_str() {
            "disabled" | "cloudinary" => {}
            other => bail!(
                "Unknown images provider: '{}'. Must be disabled or cloudinary.",
                other
            ),
        }
        if self.images.max_bytes == 0 {
            bail!("images.max_bytes must be > 0");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Signing secret used when `JWT_SECRET` is unset. Development only.
pub const DEV_JWT_SECRET: &str = "formsmith-dev-secret-change-me";

/// Cloudinary account credentials.
#[derive(Debug, Clone)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Credentials read from the environment.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub jwt_secret: String,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub cloudinary: Option<CloudinaryCredentials>,
}

impl Secrets {
    /// Read secrets from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read secrets through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET is not set; using the development signing secret");
            DEV_JWT_SECRET.to_string()
        });

        let cloudinary = match (
            get("CLOUDINARY_CLOUD_NAME"),
            get("CLOUDINARY_API_KEY"),
            get("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryCredentials {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        Self {
            jwt_secret,
            gemini_api_key: get("GEMINI_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            cloudinary,
        }
    }

    /// Environment variables the configured providers need but are absent.
    pub fn missing_for(&self, config: &Config) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let providers = [
            config.embedding.provider.as_str(),
            config.generation.provider.as_str(),
        ];
        if providers.contains(&"gemini") && self.gemini_api_key.is_none() {
            missing.push("GEMINI_API_KEY");
        }
        if providers.contains(&"openai") && self.openai_api_key.is_none() {
            missing.push("OPENAI_API_KEY");
        }
        if config.images.provider == "cloudinary" && self.cloudinary.is_none() {
            missing.push("CLOUDINARY_CLOUD_NAME / CLOUDINARY_API_KEY / CLOUDINARY_API_SECRET");
        }
        missing
    }
}
