//! Form generation pipeline.
//!
//! Ties the retriever, the schema generator, and the store together:
//!
//! 1. Embed the prompt (once; the same vector is stored on the new form).
//! 2. Retrieve the user's most similar forms as context.
//! 3. Generate and parse the schema document.
//! 4. Build and insert the [`Form`].
//!
//! Steps 1–3 can fail without side effects; the insert is the only write.

use anyhow::{Context, Result};
use rand::Rng;
use serde_json::{json, Value};
use tracing::info;

use crate::embedding::Embedder;
use crate::generation::{generate_schema, SchemaGenerator};
use crate::models::Form;
use crate::retrieval::retrieve_with_embedding;
use crate::store::Store;

/// Length of public share identifiers.
pub const SHARE_ID_LEN: usize = 10;

const SHARE_ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Title used when neither the request nor the schema provides one.
pub const FALLBACK_TITLE: &str = "Untitled form";

/// Inputs for [`generate_form`].
#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    pub user_id: &'a str,
    pub prompt: &'a str,
    /// Explicit title; blank values are ignored.
    pub title: Option<&'a str>,
    /// Number of prior forms passed as context.
    pub top_k: usize,
}

/// Random URL-safe share identifier.
pub fn new_share_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SHARE_ID_LEN)
        .map(|_| SHARE_ID_ALPHABET[rng.gen_range(0..SHARE_ID_ALPHABET.len())] as char)
        .collect()
}

fn pick_title(requested: Option<&str>, schema: &Value) -> String {
    requested
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            schema
                .get("title")
                .and_then(|t| t.as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty())
        })
        .unwrap_or(FALLBACK_TITLE)
        .to_string()
}

fn initial_metadata(schema: &Value) -> Value {
    match schema.get("description").and_then(|d| d.as_str()) {
        Some(description) if !description.trim().is_empty() => {
            json!({ "description": description })
        }
        _ => json!({}),
    }
}

/// Run the full generation pipeline and persist the resulting form.
pub async fn generate_form<S: Store + ?Sized>(
    store: &S,
    embedder: &dyn Embedder,
    generator: &dyn SchemaGenerator,
    req: &GenerateRequest<'_>,
) -> Result<Form> {
    let embedding = embedder
        .embed(req.prompt)
        .await
        .context("failed to embed prompt")?;

    let context = retrieve_with_embedding(store, req.user_id, &embedding, req.top_k).await?;

    let form_schema = generate_schema(generator, req.prompt, &context).await?;

    let now = chrono::Utc::now().timestamp();
    let form = Form {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: req.user_id.to_string(),
        title: pick_title(req.title, &form_schema),
        prompt: req.prompt.to_string(),
        metadata: initial_metadata(&form_schema),
        form_schema,
        shareable_id: new_share_id(),
        embedding,
        created_at: now,
        updated_at: now,
    };

    store
        .insert_form(&form)
        .await
        .context("failed to save generated form")?;

    info!(
        form_id = %form.id,
        user_id = %form.user_id,
        context_forms = context.len(),
        "generated form"
    );
    Ok(form)
}
