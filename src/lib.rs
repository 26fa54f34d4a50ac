//! # Formsmith
//!
//! Backend for an AI-assisted form builder. A user describes a form in
//! plain language; the server retrieves that user's most similar earlier
//! forms, asks a generation model for a schema with them as context, and
//! stores the result under a public share link that collects submissions.
//!
//! Domain logic (retrieval, validation, export) lives in
//! [`formsmith_core`]; this crate wires it to SQLite, the model and image
//! providers, and an axum HTTP server.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment secrets |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite implementation of the `Store` trait |
//! | [`remote`] | HTTP client and retry helpers |
//! | [`embedding`] | Gemini / OpenAI / Ollama embedders |
//! | [`generation`] | Gemini / OpenAI schema generators |
//! | [`images`] | Image validation and Cloudinary hosting |
//! | [`auth`] | Password hashing and JWT sessions |
//! | [`server`] | HTTP API |
//! | [`forms_cmd`] | CLI listing, retrieval and export commands |

pub mod auth;
pub mod config;
pub mod db;
pub mod embedding;
pub mod forms_cmd;
pub mod generation;
pub mod images;
pub mod migrate;
pub mod remote;
pub mod server;
pub mod sqlite_store;
