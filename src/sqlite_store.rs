//! SQLite-backed [`Store`].
//!
//! JSON documents are stored as TEXT, embeddings as little-endian `f32`
//! BLOBs. "Newest first" orders by timestamp, then by `rowid` so rows
//! written within the same second keep their insertion order.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use formsmith_core::embedding::{blob_to_vec, vec_to_blob};
use formsmith_core::models::{Form, FormSubmission, OwnedSubmission, User};
use formsmith_core::store::Store;

use crate::config::Config;
use crate::{db, migrate};

const FORM_COLUMNS: &str = "id, user_id, title, prompt, schema_json, shareable_id, \
    metadata_json, embedding, created_at, updated_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn form_from_row(row: &SqliteRow) -> Result<Form> {
    let id: String = row.get("id");
    let schema_json: String = row.get("schema_json");
    let metadata_json: String = row.get("metadata_json");
    let embedding: Option<Vec<u8>> = row.get("embedding");

    Ok(Form {
        form_schema: serde_json::from_str(&schema_json)
            .with_context(|| format!("corrupt schema for form {}", id))?,
        metadata: serde_json::from_str(&metadata_json)
            .with_context(|| format!("corrupt metadata for form {}", id))?,
        embedding: embedding.as_deref().map(blob_to_vec).unwrap_or_default(),
        user_id: row.get("user_id"),
        title: row.get("title"),
        prompt: row.get("prompt"),
        shareable_id: row.get("shareable_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        id,
    })
}

fn submission_from_row(row: &SqliteRow) -> Result<FormSubmission> {
    let id: String = row.get("id");
    let responses_json: String = row.get("responses_json");
    let image_urls_json: String = row.get("image_urls_json");

    let responses = match serde_json::from_str(&responses_json)
        .with_context(|| format!("corrupt responses for submission {}", id))?
    {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };

    Ok(FormSubmission {
        responses,
        image_urls: serde_json::from_str(&image_urls_json)
            .with_context(|| format!("corrupt image urls for submission {}", id))?,
        form_id: row.get("form_id"),
        submitted_at: row.get("submitted_at"),
        id,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)")
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to insert user {}", user.email))?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            created_at: row.get("created_at"),
        }))
    }

    async fn insert_form(&self, form: &Form) -> Result<()> {
        let embedding = if form.embedding.is_empty() {
            None
        } else {
            Some(vec_to_blob(&form.embedding))
        };

        sqlx::query(
            r#"
            INSERT INTO forms (id, user_id, title, prompt, schema_json, shareable_id,
                               metadata_json, embedding, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&form.id)
        .bind(&form.user_id)
        .bind(&form.title)
        .bind(&form.prompt)
        .bind(serde_json::to_string(&form.form_schema)?)
        .bind(&form.shareable_id)
        .bind(serde_json::to_string(&form.metadata)?)
        .bind(embedding)
        .bind(form.created_at)
        .bind(form.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert form {}", form.id))?;
        Ok(())
    }

    async fn forms_by_owner(&self, user_id: &str) -> Result<Vec<Form>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM forms WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
            FORM_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(form_from_row).collect()
    }

    async fn find_owned_form(&self, form_id: &str, user_id: &str) -> Result<Option<Form>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM forms WHERE id = ? AND user_id = ?",
            FORM_COLUMNS
        ))
        .bind(form_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(form_from_row).transpose()
    }

    async fn find_form_by_share_id(&self, shareable_id: &str) -> Result<Option<Form>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM forms WHERE shareable_id = ?",
            FORM_COLUMNS
        ))
        .bind(shareable_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(form_from_row).transpose()
    }

    async fn find_form(&self, form_id: &str) -> Result<Option<Form>> {
        let row = sqlx::query(&format!("SELECT {} FROM forms WHERE id = ?", FORM_COLUMNS))
            .bind(form_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(form_from_row).transpose()
    }

    async fn delete_form(&self, form_id: &str, user_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let owned: Option<String> =
            sqlx::query_scalar("SELECT id FROM forms WHERE id = ? AND user_id = ?")
                .bind(form_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if owned.is_none() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM form_submissions WHERE form_id = ?")
            .bind(form_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM forms WHERE id = ?")
            .bind(form_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn insert_submission(&self, submission: &FormSubmission) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO form_submissions (id, form_id, responses_json, image_urls_json, submitted_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&submission.id)
        .bind(&submission.form_id)
        .bind(serde_json::to_string(&submission.responses)?)
        .bind(serde_json::to_string(&submission.image_urls)?)
        .bind(submission.submitted_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert submission {}", submission.id))?;
        Ok(())
    }

    async fn submissions_for_form(&self, form_id: &str) -> Result<Vec<FormSubmission>> {
        let rows = sqlx::query(
            r#"
            SELECT id, form_id, responses_json, image_urls_json, submitted_at
            FROM form_submissions
            WHERE form_id = ?
            ORDER BY submitted_at DESC, rowid DESC
            "#,
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(submission_from_row).collect()
    }

    async fn submissions_for_owner(&self, user_id: &str) -> Result<Vec<OwnedSubmission>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.form_id, s.responses_json, s.image_urls_json, s.submitted_at,
                   f.title AS form_title
            FROM form_submissions s
            JOIN forms f ON f.id = s.form_id
            WHERE f.user_id = ?
            ORDER BY s.submitted_at DESC, s.rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(OwnedSubmission {
                    submission: submission_from_row(row)?,
                    form_title: row.get("form_title"),
                })
            })
            .collect()
    }
}
