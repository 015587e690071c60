//! Catalog service for book management

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, ConflictReason, EntityKind},
    models::book::{Book, BookChanges, BookWithAuthor, NewBook},
    repository::{AuthorStore, BookStore, DeleteOutcome},
};

#[derive(Clone)]
pub struct CatalogService {
    authors: Arc<dyn AuthorStore>,
    books: Arc<dyn BookStore>,
}

impl CatalogService {
    pub fn new(authors: Arc<dyn AuthorStore>, books: Arc<dyn BookStore>) -> Self {
        Self { authors, books }
    }

    /// Create a book for an existing author
    pub async fn create_book(&self, new_book: NewBook) -> AppResult<BookWithAuthor> {
        let author = self
            .authors
            .get(new_book.author_id)
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::Author, new_book.author_id))?;

        let now = Utc::now();
        let book = Book {
            id: Uuid::new_v4(),
            title: new_book.title,
            isbn: new_book.isbn,
            published_at: new_book.published_at,
            author_id: author.id,
            created_at: now,
            updated_at: now,
        };

        let book = self.books.create(&book).await?;
        tracing::info!(book_id = %book.id, author_id = %author.id, "Catalog create: book '{}'", book.title);

        Ok(BookWithAuthor { book, author })
    }

    /// Apply a partial update; moving a book to another author requires that author to exist
    pub async fn update_book(&self, id: Uuid, changes: BookChanges) -> AppResult<BookWithAuthor> {
        if let Some(author_id) = changes.author_id {
            self.authors
                .get(author_id)
                .await?
                .ok_or_else(|| AppError::not_found(EntityKind::Author, author_id))?;
        }

        let book = self
            .books
            .update(id, &changes, Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::Book, id))?;

        let author = self.authors.get(book.author_id).await?.ok_or_else(|| {
            AppError::Internal(format!("Author {} of book {} is missing", book.author_id, id))
        })?;

        Ok(BookWithAuthor { book, author })
    }

    /// Delete a book and its closed borrow history. Refused while the book is out.
    pub async fn delete_book(&self, id: Uuid) -> AppResult<()> {
        match self.books.delete(id).await? {
            DeleteOutcome::Deleted => {
                tracing::info!(book_id = %id, "Catalog delete: book removed");
                Ok(())
            }
            DeleteOutcome::Missing => Err(AppError::not_found(EntityKind::Book, id)),
            DeleteOutcome::Referenced => Err(AppError::Conflict(ConflictReason::BookHasOpenBorrow)),
        }
    }
}
