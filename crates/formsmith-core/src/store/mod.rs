//! Storage abstraction for Formsmith.
//!
//! The [`Store`] trait covers every persistence operation the retriever,
//! the generation pipeline, and the HTTP handlers need. The application
//! crate provides a SQLite implementation; [`memory::InMemoryStore`] backs
//! tests.
//!
//! Implementations must be `Send + Sync` to be shared across requests.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Form, FormSubmission, OwnedSubmission, User};

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_user`](Store::insert_user) | Create an account |
/// | [`find_user_by_email`](Store::find_user_by_email) | Look up an account for login |
/// | [`insert_form`](Store::insert_form) | Persist a generated form |
/// | [`forms_by_owner`](Store::forms_by_owner) | All forms of a user, newest first |
/// | [`find_owned_form`](Store::find_owned_form) | A form by id, only if owned by the user |
/// | [`find_form_by_share_id`](Store::find_form_by_share_id) | Public lookup |
/// | [`find_form`](Store::find_form) | A form by id, regardless of owner |
/// | [`delete_form`](Store::delete_form) | Remove a form and its submissions |
/// | [`insert_submission`](Store::insert_submission) | Persist a submission |
/// | [`submissions_for_form`](Store::submissions_for_form) | Submissions of one form, newest first |
/// | [`submissions_for_owner`](Store::submissions_for_owner) | Submissions across a user's forms, newest first |
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<()>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn insert_form(&self, form: &Form) -> Result<()>;

    /// Returns every form owned by `user_id`, newest first (ties broken by
    /// insertion order, newest first). An unknown user yields an empty list.
    async fn forms_by_owner(&self, user_id: &str) -> Result<Vec<Form>>;

    async fn find_owned_form(&self, form_id: &str, user_id: &str) -> Result<Option<Form>>;

    async fn find_form_by_share_id(&self, shareable_id: &str) -> Result<Option<Form>>;

    async fn find_form(&self, form_id: &str) -> Result<Option<Form>>;

    /// Deletes the form and all of its submissions. Returns `false` when no
    /// form with that id is owned by `user_id`.
    async fn delete_form(&self, form_id: &str, user_id: &str) -> Result<bool>;

    async fn insert_submission(&self, submission: &FormSubmission) -> Result<()>;

    async fn submissions_for_form(&self, form_id: &str) -> Result<Vec<FormSubmission>>;

    async fn submissions_for_owner(&self, user_id: &str) -> Result<Vec<OwnedSubmission>>;
}
