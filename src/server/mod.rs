//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`  | `/health` | | Health check (returns version) |
//! | `POST` | `/api/auth/register` | | Create an account, returns a token |
//! | `POST` | `/api/auth/login` | | Exchange credentials for a token |
//! | `POST` | `/api/forms/generate` | ✓ | Generate a form from a prompt |
//! | `GET`  | `/api/forms`, `/api/forms/forms` | ✓ | The caller's forms, newest first |
//! | `DELETE` | `/api/forms/{id}` | ✓ | Delete a form and its submissions |
//! | `GET`  | `/api/public/form/{shareId}` | | Public view of a form |
//! | `POST` | `/api/public/form/{shareId}/submit` | | Submit a response |
//! | `GET`  | `/api/submissions/form/{formId}` | ✓ | Submissions of one form |
//! | `GET`  | `/api/submissions/form/{formId}/export` | ✓ | Submissions as CSV |
//! | `GET`  | `/api/submissions/user` | ✓ | Submissions across the caller's forms |
//! | `POST` | `/api/upload/image` | ✓ | Upload an image (multipart field `image`) |
//! | `DELETE` | `/api/upload/image` | ✓ | Delete an uploaded image |
//!
//! Authenticated routes expect `Authorization: Bearer <token>`. Errors use
//! the body described in [`error`].
//!
//! # CORS
//!
//! Only `server.frontend_url` is allowed, with credentials.

mod auth;
pub mod error;
mod forms;
mod public;
mod submissions;
mod upload;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use formsmith_core::embedding::Embedder;
use formsmith_core::generation::SchemaGenerator;
use formsmith_core::store::Store;

use crate::auth::TokenKeys;
use crate::config::{Config, Secrets};
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::images::{create_image_host, ImageHost};
use crate::sqlite_store::SqliteStore;

pub use auth::AuthUser;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn SchemaGenerator>,
    pub images: Arc<dyn ImageHost>,
    pub tokens: Arc<TokenKeys>,
}

impl AppState {
    /// Build every external client once from configuration.
    pub fn from_config(config: &Config, secrets: &Secrets, store: Arc<dyn Store>) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config.clone()),
            store,
            embedder: create_embedder(&config.embedding, secrets)?,
            generator: create_generator(&config.generation, secrets)?,
            images: create_image_host(&config.images, secrets)?,
            tokens: Arc::new(TokenKeys::new(
                &secrets.jwt_secret,
                config.auth.token_ttl_hours,
            )),
        })
    }
}

/// Assemble the router with all routes and middleware.
pub fn build_router(state: AppState) -> Result<Router> {
    let origin = HeaderValue::from_str(&state.config.server.frontend_url)
        .with_context(|| format!("invalid server.frontend_url: {}", state.config.server.frontend_url))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    let protected = Router::new()
        .route("/api/forms/generate", post(forms::generate))
        .route("/api/forms", get(forms::list))
        .route("/api/forms/forms", get(forms::list))
        .route("/api/forms/{id}", axum::routing::delete(forms::remove))
        .route("/api/submissions/form/{form_id}", get(submissions::for_form))
        .route(
            "/api/submissions/form/{form_id}/export",
            get(submissions::export_csv),
        )
        .route("/api/submissions/user", get(submissions::for_user))
        .route(
            "/api/upload/image",
            post(upload::upload_image).delete(upload::delete_image),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let body_limit = state.config.server.body_limit_bytes;

    Ok(Router::new()
        .route("/health", get(handle_health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/public/form/{share_id}", get(public::view))
        .route("/api/public/form/{share_id}/submit", post(public::submit))
        .merge(protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

/// Start the HTTP server on `server.bind` and run until terminated.
pub async fn run_server(config: &Config) -> Result<()> {
    let secrets = Secrets::from_env();
    for var in secrets.missing_for(config) {
        warn!(var, "required environment variable is not set");
    }

    let store = SqliteStore::open(config).await?;
    let state = AppState::from_config(config, &secrets, Arc::new(store))?;
    info!(
        embedding = state.embedder.model_name(),
        embedding_dims = state.embedder.dims(),
        generation = state.generator.model_name(),
        "providers ready"
    );

    let app = build_router(state)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    info!(bind = %config.server.bind, "formsmith server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
