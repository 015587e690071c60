//! Author management service

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, ConflictReason, EntityKind},
    models::author::{Author, AuthorWithBooks, AuthorWithCount, CreateAuthor, UpdateAuthor},
    repository::{AuthorStore, DeleteOutcome},
};

#[derive(Clone)]
pub struct AuthorsService {
    authors: Arc<dyn AuthorStore>,
}

impl AuthorsService {
    pub fn new(authors: Arc<dyn AuthorStore>) -> Self {
        Self { authors }
    }

    pub async fn create(&self, input: CreateAuthor) -> AppResult<Author> {
        let now = Utc::now();
        let author = Author {
            id: Uuid::new_v4(),
            name: input.name,
            bio: input.bio,
            created_at: now,
            updated_at: now,
        };

        let author = self.authors.create(&author).await?;
        tracing::info!(author_id = %author.id, "Author created: {}", author.name);
        Ok(author)
    }

    /// All authors, newest first, with their book counts
    pub async fn list(&self) -> AppResult<Vec<AuthorWithCount>> {
        self.authors.list().await
    }

    /// Author with all of their books
    pub async fn get(&self, id: Uuid) -> AppResult<AuthorWithBooks> {
        let author = self
            .authors
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::Author, id))?;
        let books = self.authors.books_of(id).await?;

        Ok(AuthorWithBooks { author, books })
    }

    pub async fn update(&self, id: Uuid, changes: UpdateAuthor) -> AppResult<Author> {
        self.authors
            .update(id, &changes, Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::Author, id))
    }

    /// Delete an author who no longer has any books
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        match self.authors.delete(id).await? {
            DeleteOutcome::Deleted => {
                tracing::info!(author_id = %id, "Author deleted");
                Ok(())
            }
            DeleteOutcome::Missing => Err(AppError::not_found(EntityKind::Author, id)),
            DeleteOutcome::Referenced => Err(AppError::Conflict(ConflictReason::AuthorHasBooks)),
        }
    }
}
