//! Author registry - who or what produced a change
//!
//! Pure attribution, no accounts: `authors/<kind>/<slug>.json` is written the
//! first time an author is used and never rewritten after that.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::changes::ChangeTracker;
use super::fsio::{read_json, walk_documents, write_json_atomic};
use super::identifiers::AuthorId;
use super::layout::{StoreLayout, AUTHORS_DIR};
use super::version::Author;
use crate::error::Result;

pub struct AuthorRegistry {
    layout: StoreLayout,
    changes: Arc<ChangeTracker>,
}

impl AuthorRegistry {
    pub fn new(layout: StoreLayout, changes: Arc<ChangeTracker>) -> Self {
        Self { layout, changes }
    }

    pub fn get(&self, id: &AuthorId) -> Result<Option<Author>> {
        read_json(&self.layout.absolute(&self.layout.author_path(id)))
    }

    /// Return the registered author, registering it on first use
    pub fn ensure(&self, id: &AuthorId, name: Option<&str>) -> Result<Author> {
        if let Some(existing) = self.get(id)? {
            return Ok(existing);
        }

        let author = Author {
            id: id.to_string(),
            name: name.map(str::to_string),
            created_at: Utc::now(),
        };
        let relative = self.layout.author_path(id);
        write_json_atomic(&self.layout.absolute(&relative), &author)?;
        self.changes.mark(&relative);
        info!(author = %id, "registered author");
        Ok(author)
    }

    /// Every registered author, ordered by id
    pub fn list(&self) -> Result<Vec<Author>> {
        let mut authors = Vec::new();
        for path in walk_documents(&self.layout.root().join(AUTHORS_DIR))? {
            if let Some(author) = read_json::<Author>(&path)? {
                authors.push(author);
            }
        }
        authors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(authors)
    }
}
