//! Registration, login and the bearer-token middleware.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use formsmith_core::models::User;
use formsmith_core::schema::looks_like_email;

use super::error::{bad_request, internal, unauthorized, AppError};
use super::AppState;
use crate::auth::{hash_password, normalize_email, verify_password, TokenError, MIN_PASSWORD_LEN};

/// The authenticated caller, inserted into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Reject requests without a valid `Authorization: Bearer <token>` header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| unauthorized("No token provided. Please log in."))?;

    let claims = state.tokens.verify(token).map_err(|e| match e {
        TokenError::Expired => unauthorized("Token expired. Please log in again."),
        TokenError::Invalid => unauthorized("Invalid token. Please log in again."),
    })?;

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
    });
    Ok(next.run(req).await)
}

#[derive(Deserialize)]
pub struct Credentials {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

fn session_body(message: &str, token: String, user: &User) -> serde_json::Value {
    json!({
        "success": true,
        "message": message,
        "data": {
            "token": token,
            "user": { "id": user.id, "email": user.email },
        },
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Response, AppError> {
    let email = normalize_email(&body.email);
    if !looks_like_email(&email) {
        return Err(bad_request("Please provide a valid email"));
    }
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(bad_request(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }

    let existing = state
        .store
        .find_user_by_email(&email)
        .await
        .map_err(|e| internal("Failed to register user", e))?;
    if existing.is_some() {
        return Err(bad_request("User with this email already exists"));
    }

    let password_hash = hash_password(body.password, state.config.auth.bcrypt_cost)
        .await
        .map_err(|e| internal("Failed to register user", e))?;
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        password_hash,
        created_at: chrono::Utc::now().timestamp(),
    };
    state
        .store
        .insert_user(&user)
        .await
        .map_err(|e| internal("Failed to register user", e))?;

    let token = state
        .tokens
        .issue(&user.id)
        .map_err(|e| internal("Failed to register user", e))?;

    info!(user_id = %user.id, "registered user");
    Ok((
        StatusCode::CREATED,
        Json(session_body("User registered successfully", token, &user)),
    )
        .into_response())
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = normalize_email(&body.email);
    if !looks_like_email(&email) {
        return Err(bad_request("Please provide a valid email"));
    }
    if body.password.is_empty() {
        return Err(bad_request("Password is required"));
    }

    let user = state
        .store
        .find_user_by_email(&email)
        .await
        .map_err(|e| internal("Failed to login", e))?
        .ok_or_else(|| unauthorized("Invalid email or password"))?;

    let valid = verify_password(body.password, user.password_hash.clone())
        .await
        .map_err(|e| internal("Failed to login", e))?;
    if !valid {
        return Err(unauthorized("Invalid email or password"));
    }

    let token = state
        .tokens
        .issue(&user.id)
        .map_err(|e| internal("Failed to login", e))?;

    Ok(Json(session_body("Login successful", token, &user)))
}
