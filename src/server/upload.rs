//! Image upload and deletion.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::images::validate_image;

use super::error::{bad_request, internal, payload_too_large, AppError};
use super::AppState;

const IMAGE_FIELD: &str = "image";

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        payload_too_large("Request body is too large")
    } else {
        bad_request(format!("Invalid multipart body: {}", e.body_text()))
    }
}

pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        file = Some((file_name, content_type, bytes));
        break;
    }

    let (file_name, content_type, bytes) =
        file.ok_or_else(|| bad_request("No image file provided"))?;
    validate_image(&content_type, bytes.len(), state.config.images.max_bytes)
        .map_err(|e| bad_request(e.to_string()))?;

    let image = state
        .images
        .upload(bytes.to_vec(), &file_name, &content_type)
        .await
        .map_err(|e| internal("Failed to upload image", e))?;

    Ok(Json(json!({
        "success": true,
        "message": "Image uploaded successfully",
        "data": image,
    })))
}

#[derive(Deserialize)]
pub struct DeleteImageBody {
    #[serde(default, rename = "publicId")]
    public_id: String,
}

pub async fn delete_image(
    State(state): State<AppState>,
    Json(body): Json<DeleteImageBody>,
) -> Result<Json<Value>, AppError> {
    let public_id = body.public_id.trim();
    if public_id.is_empty() {
        return Err(bad_request("publicId is required"));
    }

    state
        .images
        .delete(public_id)
        .await
        .map_err(|e| internal("Failed to delete image", e))?;

    Ok(Json(json!({
        "success": true,
        "message": "Image deleted successfully",
    })))
}
