//! # Formsmith Core
//!
//! Shared domain logic for Formsmith: data models, the relevant-form
//! retriever, the store abstraction, schema generation helpers, submission
//! validation, and CSV export.
//!
//! This crate contains no tokio, sqlx, reqwest, or axum dependencies.
//! Everything that talks to the outside world is reached through the
//! [`store::Store`], [`embedding::Embedder`], and
//! [`generation::SchemaGenerator`] traits, which the application crate
//! implements.

pub mod embedding;
pub mod export;
pub mod forms;
pub mod generation;
pub mod models;
pub mod retrieval;
pub mod schema;
pub mod store;
