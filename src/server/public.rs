//! Unauthenticated access through a form's share id.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use formsmith_core::models::{format_ts_iso, FormSubmission};
use formsmith_core::schema::{validate_responses, FormSchema};

use super::error::{bad_request, internal, not_found, validation_failed, AppError};
use super::AppState;

pub async fn view(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let form = state
        .store
        .find_form_by_share_id(&share_id)
        .await
        .map_err(|e| internal("Failed to fetch form", e))?
        .ok_or_else(|| not_found("Form not found"))?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "form": {
                "id": form.id,
                "title": form.title,
                "description": form.description(),
                "schema": form.form_schema,
                "createdAt": format_ts_iso(form.created_at),
            },
        },
    })))
}

#[derive(Deserialize)]
pub struct SubmitBody {
    #[serde(default)]
    responses: Value,
    #[serde(default, rename = "imageUrls")]
    image_urls: Value,
}

pub async fn submit(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Value::Object(responses) = body.responses else {
        return Err(bad_request("Responses must be an object"));
    };

    let form = state
        .store
        .find_form_by_share_id(&share_id)
        .await
        .map_err(|e| internal("Failed to submit form", e))?
        .ok_or_else(|| not_found("Form not found"))?;

    let schema = FormSchema::from_value(&form.form_schema);
    let errors = validate_responses(&schema, &responses);
    if !errors.is_empty() {
        return Err(validation_failed(errors));
    }

    // Non-array values and non-string entries are dropped.
    let image_urls: Vec<String> = match body.image_urls {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let submission = FormSubmission {
        id: uuid::Uuid::new_v4().to_string(),
        form_id: form.id,
        responses,
        image_urls,
        submitted_at: chrono::Utc::now().timestamp(),
    };
    state
        .store
        .insert_submission(&submission)
        .await
        .map_err(|e| internal("Failed to submit form", e))?;

    info!(submission_id = %submission.id, form_id = %submission.form_id, "form submission created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Form submitted successfully",
            "data": { "submissionId": submission.id },
        })),
    ))
}
