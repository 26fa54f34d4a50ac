//! Form generation, listing and deletion for the authenticated user.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use formsmith_core::forms::{generate_form, GenerateRequest};
use formsmith_core::models::{format_ts_iso, Form};

use super::error::{bad_request, internal, not_found, AppError};
use super::{AppState, AuthUser};

/// A form as returned to its owner. The embedding is never exposed.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormView {
    id: String,
    user_id: String,
    title: String,
    prompt: String,
    form_schema: Value,
    shareable_id: String,
    metadata: Value,
    created_at: String,
    updated_at: String,
}

impl From<Form> for FormView {
    fn from(form: Form) -> Self {
        Self {
            id: form.id,
            user_id: form.user_id,
            title: form.title,
            prompt: form.prompt,
            form_schema: form.form_schema,
            shareable_id: form.shareable_id,
            metadata: form.metadata,
            created_at: format_ts_iso(form.created_at),
            updated_at: format_ts_iso(form.updated_at),
        }
    }
}

#[derive(Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    title: Option<String>,
}

pub async fn generate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<GenerateBody>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if body.prompt.is_empty() {
        return Err(bad_request("Prompt is required"));
    }

    let request = GenerateRequest {
        user_id: &user.user_id,
        prompt: &body.prompt,
        title: body.title.as_deref(),
        top_k: state.config.retrieval.top_k,
    };
    let form = generate_form(
        state.store.as_ref(),
        state.embedder.as_ref(),
        state.generator.as_ref(),
        &request,
    )
    .await
    .map_err(|e| internal("Internal Server Error", e))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Form generated",
            "form": FormView::from(form),
        })),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let forms = state
        .store
        .forms_by_owner(&user.user_id)
        .await
        .map_err(|e| internal("Failed to fetch forms", e))?;
    let forms: Vec<FormView> = forms.into_iter().map(FormView::from).collect();

    Ok(Json(json!({
        "success": true,
        "data": { "forms": forms },
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let deleted = state
        .store
        .delete_form(&id, &user.user_id)
        .await
        .map_err(|e| internal("Failed to delete form", e))?;
    if !deleted {
        return Err(not_found("Form not found"));
    }

    info!(form_id = %id, user_id = %user.user_id, "deleted form");
    Ok(Json(json!({
        "success": true,
        "message": "Form deleted successfully",
    })))
}
