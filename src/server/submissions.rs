//! Submission listing and CSV export for form owners.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use formsmith_core::export::{export_file_name, submissions_to_csv};
use formsmith_core::models::{format_ts_iso, Form, FormSubmission};

use super::error::{internal, not_found, AppError};
use super::{AppState, AuthUser};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionView {
    id: String,
    form_id: String,
    responses: Map<String, Value>,
    image_urls: Vec<String>,
    submitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    form: Option<FormRef>,
}

#[derive(Serialize)]
struct FormRef {
    id: String,
    title: String,
}

impl SubmissionView {
    fn new(submission: FormSubmission, form: Option<FormRef>) -> Self {
        Self {
            id: submission.id,
            form_id: submission.form_id,
            responses: submission.responses,
            image_urls: submission.image_urls,
            submitted_at: format_ts_iso(submission.submitted_at),
            form,
        }
    }
}

async fn owned_form(state: &AppState, form_id: &str, user_id: &str) -> Result<Form, AppError> {
    state
        .store
        .find_owned_form(form_id, user_id)
        .await
        .map_err(|e| internal("Failed to fetch submissions", e))?
        .ok_or_else(|| not_found("Form not found"))
}

pub async fn for_form(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(form_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let form = owned_form(&state, &form_id, &user.user_id).await?;
    let submissions = state
        .store
        .submissions_for_form(&form.id)
        .await
        .map_err(|e| internal("Failed to fetch submissions", e))?;

    let count = submissions.len();
    let submissions: Vec<SubmissionView> = submissions
        .into_iter()
        .map(|s| SubmissionView::new(s, None))
        .collect();
    let form = FormRef {
        id: form.id,
        title: form.title,
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "form": form,
            "submissions": submissions,
            "count": count,
        },
    })))
}

pub async fn export_csv(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(form_id): Path<String>,
) -> Result<Response, AppError> {
    let form = owned_form(&state, &form_id, &user.user_id).await?;
    let submissions = state
        .store
        .submissions_for_form(&form.id)
        .await
        .map_err(|e| internal("Failed to export submissions", e))?;

    let csv = submissions_to_csv(&submissions);
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(&form.title)
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

pub async fn for_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let owned = state
        .store
        .submissions_for_owner(&user.user_id)
        .await
        .map_err(|e| internal("Failed to fetch submissions", e))?;

    let count = owned.len();
    let submissions: Vec<SubmissionView> = owned
        .into_iter()
        .map(|o| {
            let form = FormRef {
                id: o.submission.form_id.clone(),
                title: o.form_title,
            };
            SubmissionView::new(o.submission, Some(form))
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": { "submissions": submissions, "count": count },
    })))
}
