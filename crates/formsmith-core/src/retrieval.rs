//! Relevant-form retrieval.
//!
//! Picks the prior forms of a user that are most similar to a new prompt,
//! to be handed to the schema generator as context.
//!
//! # Algorithm
//!
//! 1. Embed the prompt.
//! 2. Load every form owned by the user (no pagination).
//! 3. Score each form by cosine similarity between the prompt embedding and
//!    the form's stored embedding. Forms without an embedding score `0.0`
//!    and stay in the ranking.
//! 4. Stable sort by score, descending. Equal scores keep the store's
//!    order (newest form first).
//! 5. Truncate to `top_k` and drop the vectors.
//!
//! Any failure in steps 1–2 is returned as-is; there is no partial result.

use anyhow::{Context, Result};
use tracing::debug;

use crate::embedding::{cosine_similarity, Embedder};
use crate::models::{Form, RetrievalResult};
use crate::store::Store;

/// Default number of forms handed to the generator.
pub const DEFAULT_TOP_K: usize = 5;

/// Embed `prompt` and return up to `top_k` of the user's most similar forms.
pub async fn retrieve_relevant_forms<S: Store + ?Sized>(
    store: &S,
    embedder: &dyn Embedder,
    user_id: &str,
    prompt: &str,
    top_k: usize,
) -> Result<Vec<RetrievalResult>> {
    let query_vec = embedder
        .embed(prompt)
        .await
        .context("failed to embed prompt")?;
    retrieve_with_embedding(store, user_id, &query_vec, top_k).await
}

/// Like [`retrieve_relevant_forms`], with the prompt embedding already
/// computed.
pub async fn retrieve_with_embedding<S: Store + ?Sized>(
    store: &S,
    user_id: &str,
    query_vec: &[f32],
    top_k: usize,
) -> Result<Vec<RetrievalResult>> {
    let forms = store
        .forms_by_owner(user_id)
        .await
        .context("failed to load candidate forms")?;
    let results = rank_forms(query_vec, &forms, top_k);
    debug!(
        user_id,
        candidates = forms.len(),
        returned = results.len(),
        "ranked candidate forms"
    );
    Ok(results)
}

/// Score, sort, and truncate `forms` against `query_vec`.
///
/// Returns exactly `min(top_k, forms.len())` results with non-increasing
/// scores.
pub fn rank_forms(query_vec: &[f32], forms: &[Form], top_k: usize) -> Vec<RetrievalResult> {
    let mut scored: Vec<(&Form, f32)> = forms
        .iter()
        .map(|form| {
            let score = if form.embedding.is_empty() {
                0.0
            } else {
                cosine_similarity(query_vec, &form.embedding)
            };
            (form, score)
        })
        .collect();

    // `sort_by` is stable: ties keep fetch order.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(form, score)| RetrievalResult {
            id: form.id.clone(),
            title: form.title.clone(),
            metadata: if form.metadata.is_null() {
                serde_json::json!({})
            } else {
                form.metadata.clone()
            },
            score,
        })
        .collect()
}
