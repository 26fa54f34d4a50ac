//! In-memory [`Store`] implementation for tests and local experiments.
//!
//! Rows live in `Vec`s behind `std::sync::RwLock`, in insertion order, so
//! "newest first" is simply a reverse walk with a timestamp sort on top.

use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{Form, FormSubmission, OwnedSubmission, User};

use super::Store;

/// In-memory store. Cheap to construct; nothing is persisted.
pub struct InMemoryStore {
    users: RwLock<Vec<User>>,
    forms: RwLock<Vec<Form>>,
    submissions: RwLock<Vec<FormSubmission>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            forms: RwLock::new(Vec::new()),
            submissions: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored forms, across all users.
    pub fn form_count(&self) -> usize {
        self.forms.read().map(|f| f.len()).unwrap_or(0)
    }

    /// Number of stored submissions, across all forms.
    pub fn submission_count(&self) -> usize {
        self.submissions.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().map_err(poisoned)?;
        if users.iter().any(|u| u.email == user.email) {
            bail!("user already exists: {}", user.email);
        }
        users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_form(&self, form: &Form) -> Result<()> {
        let mut forms = self.forms.write().map_err(poisoned)?;
        if forms.iter().any(|f| f.shareable_id == form.shareable_id) {
            bail!("shareable id already in use: {}", form.shareable_id);
        }
        forms.push(form.clone());
        Ok(())
    }

    async fn forms_by_owner(&self, user_id: &str) -> Result<Vec<Form>> {
        let forms = self.forms.read().map_err(poisoned)?;
        let mut owned: Vec<Form> = forms
            .iter()
            .rev()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn find_owned_form(&self, form_id: &str, user_id: &str) -> Result<Option<Form>> {
        let forms = self.forms.read().map_err(poisoned)?;
        Ok(forms
            .iter()
            .find(|f| f.id == form_id && f.user_id == user_id)
            .cloned())
    }

    async fn find_form_by_share_id(&self, shareable_id: &str) -> Result<Option<Form>> {
        let forms = self.forms.read().map_err(poisoned)?;
        Ok(forms
            .iter()
            .find(|f| f.shareable_id == shareable_id)
            .cloned())
    }

    async fn find_form(&self, form_id: &str) -> Result<Option<Form>> {
        let forms = self.forms.read().map_err(poisoned)?;
        Ok(forms.iter().find(|f| f.id == form_id).cloned())
    }

    async fn delete_form(&self, form_id: &str, user_id: &str) -> Result<bool> {
        let mut forms = self.forms.write().map_err(poisoned)?;
        let before = forms.len();
        forms.retain(|f| !(f.id == form_id && f.user_id == user_id));
        if forms.len() == before {
            return Ok(false);
        }
        drop(forms);

        let mut subs = self.submissions.write().map_err(poisoned)?;
        subs.retain(|s| s.form_id != form_id);
        Ok(true)
    }

    async fn insert_submission(&self, submission: &FormSubmission) -> Result<()> {
        let mut subs = self.submissions.write().map_err(poisoned)?;
        subs.push(submission.clone());
        Ok(())
    }

    async fn submissions_for_form(&self, form_id: &str) -> Result<Vec<FormSubmission>> {
        let subs = self.submissions.read().map_err(poisoned)?;
        let mut found: Vec<FormSubmission> = subs
            .iter()
            .rev()
            .filter(|s| s.form_id == form_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(found)
    }

    async fn submissions_for_owner(&self, user_id: &str) -> Result<Vec<OwnedSubmission>> {
        let forms = self.forms.read().map_err(poisoned)?;
        let subs = self.submissions.read().map_err(poisoned)?;
        let mut found: Vec<OwnedSubmission> = subs
            .iter()
            .rev()
            .filter_map(|s| {
                forms
                    .iter()
                    .find(|f| f.id == s.form_id && f.user_id == user_id)
                    .map(|f| OwnedSubmission {
                        submission: s.clone(),
                        form_title: f.title.clone(),
                    })
            })
            .collect();
        found.sort_by(|a, b| b.submission.submitted_at.cmp(&a.submission.submitted_at));
        Ok(found)
    }
}
