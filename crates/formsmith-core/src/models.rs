//! Core data models used throughout Formsmith.
//!
//! Timestamps are Unix seconds (UTC). JSON documents produced by the
//! generation model or submitted by the public are kept as
//! [`serde_json::Value`] so they round-trip untouched.

use serde::Serialize;
use serde_json::Value;

/// A registered account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    /// Normalized (trimmed, lower-cased) email address.
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
}

/// A generated form owned by a user.
#[derive(Debug, Clone)]
pub struct Form {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub prompt: String,
    /// Schema document exactly as returned by the generation model.
    pub form_schema: Value,
    /// Public identifier used in share links.
    pub shareable_id: String,
    /// Free-form JSON object.
    pub metadata: Value,
    /// Prompt embedding, or empty for forms created before embeddings existed.
    pub embedding: Vec<f32>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Form {
    /// `metadata.description`, or an empty string.
    pub fn description(&self) -> &str {
        self.metadata
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("")
    }
}

/// A public response to a form. Never modified after creation.
#[derive(Debug, Clone)]
pub struct FormSubmission {
    pub id: String,
    pub form_id: String,
    /// Field id → submitted value.
    pub responses: serde_json::Map<String, Value>,
    pub image_urls: Vec<String>,
    pub submitted_at: i64,
}

/// A submission together with the title of the form it belongs to.
#[derive(Debug, Clone)]
pub struct OwnedSubmission {
    pub submission: FormSubmission,
    pub form_title: String,
}

/// Compact description of a prior form, handed to the generation model as
/// context.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RetrievalResult {
    pub id: String,
    pub title: String,
    pub metadata: Value,
    /// Cosine similarity to the prompt, in `[-1.0, 1.0]`.
    pub score: f32,
}

/// Render a Unix timestamp as ISO 8601 (`2024-01-31T12:00:00Z`).
pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
