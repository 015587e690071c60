//! Availability projection over the catalog.
//!
//! A book is available when it has no open borrow record. Availability is
//! never stored or cached; every call derives it from the ledger.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, EntityKind},
    models::book::{AnnotatedBook, BookFilter, BookPage, PageMeta},
    repository::BookStore,
};

#[derive(Clone)]
pub struct AvailabilityProjector {
    books: Arc<dyn BookStore>,
}

impl AvailabilityProjector {
    pub fn new(books: Arc<dyn BookStore>) -> Self {
        Self { books }
    }

    /// One page of books matching `filter`, each flagged with `isAvailable`.
    ///
    /// The availability criterion is applied by the store before paging, so
    /// `meta.total` counts exactly the books the filter selects.
    pub async fn list_books(&self, filter: &BookFilter) -> AppResult<BookPage> {
        let total = self.books.count(filter).await?;
        let listings = self.books.page(filter).await?;

        let data = listings
            .into_iter()
            .map(|listing| AnnotatedBook::from_listing(listing, false))
            .collect();

        Ok(BookPage {
            data,
            meta: PageMeta::new(total, filter.page, filter.limit),
        })
    }

    /// A single book, with its current borrower when it is out
    pub async fn find_one(&self, id: Uuid) -> AppResult<AnnotatedBook> {
        let listing = self
            .books
            .find_listing(id)
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::Book, id))?;

        Ok(AnnotatedBook::from_listing(listing, true))
    }
}
