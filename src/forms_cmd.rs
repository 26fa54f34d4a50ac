//! CLI commands for inspecting stored forms.
//!
//! - `formsmith forms --user <email>`: list a user's forms, newest first.
//! - `formsmith retrieve --user <email> <prompt>`: run the relevant-form
//!   retriever and print the ranked context the generator would see.
//! - `formsmith export <form-id>`: write a form's submissions as CSV.

use anyhow::{anyhow, Context, Result};
use std::path::Path;

use formsmith_core::export::submissions_to_csv;
use formsmith_core::models::{format_ts_iso, User};
use formsmith_core::retrieval::retrieve_relevant_forms;
use formsmith_core::store::Store;

use crate::auth::normalize_email;
use crate::config::{Config, Secrets};
use crate::embedding::create_embedder;
use crate::sqlite_store::SqliteStore;

async fn find_user(store: &SqliteStore, email: &str) -> Result<User> {
    let email = normalize_email(email);
    store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| anyhow!("No user with email: {}", email))
}

pub async fn run_list_forms(config: &Config, email: &str) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let user = find_user(&store, email).await?;
    let forms = store.forms_by_owner(&user.id).await?;

    if forms.is_empty() {
        println!("No forms for {}.", user.email);
        return Ok(());
    }

    for form in &forms {
        let embedded = if form.embedding.is_empty() {
            "no embedding".to_string()
        } else {
            format!("{} dims", form.embedding.len())
        };
        println!(
            "{}  {}  share={}  {}  ({})",
            format_ts_iso(form.created_at),
            form.id,
            form.shareable_id,
            form.title,
            embedded
        );
    }
    println!("\n{} form(s).", forms.len());
    Ok(())
}

pub async fn run_retrieve(
    config: &Config,
    email: &str,
    prompt: &str,
    limit: Option<usize>,
) -> Result<()> {
    let secrets = Secrets::from_env();
    let embedder = create_embedder(&config.embedding, &secrets)?;
    let store = SqliteStore::open(config).await?;
    let user = find_user(&store, email).await?;

    let top_k = limit.unwrap_or(config.retrieval.top_k);
    let results =
        retrieve_relevant_forms(&store, embedder.as_ref(), &user.id, prompt, top_k).await?;

    if results.is_empty() {
        println!("No forms to rank.");
        return Ok(());
    }

    let dims = match embedder.dims() {
        0 => "dims unchecked".to_string(),
        n => format!("{} dims", n),
    };
    println!("Ranked with {} ({}):", embedder.model_name(), dims);
    for (i, result) in results.iter().enumerate() {
        println!("{}. [{:.4}] {}  {}", i + 1, result.score, result.title, result.id);
    }
    Ok(())
}

pub async fn run_export(config: &Config, form_id: &str, output: Option<&Path>) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let form = store
        .find_form(form_id)
        .await?
        .ok_or_else(|| anyhow!("No form with id: {}", form_id))?;
    let submissions = store.submissions_for_form(&form.id).await?;
    let csv = submissions_to_csv(&submissions);

    match output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", csv))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "Exported {} submission(s) of \"{}\" to {}",
                submissions.len(),
                form.title,
                path.display()
            );
        }
        None => println!("{}", csv),
    }
    Ok(())
}
