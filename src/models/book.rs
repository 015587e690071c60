//! Book (catalog entry) model, availability annotations and list filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::author::Author;
use super::user::UserSummary;
use crate::{config::CatalogConfig, error::AppResult, validation};

/// Book row from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub isbn: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Book joined with its author
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BookWithAuthor {
    #[serde(flatten)]
    pub book: Book,
    pub author: Author,
}

/// The open borrow record of a book, if any, with its borrower
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenBorrow {
    /// Borrow record id
    pub id: Uuid,
    pub borrowed_at: DateTime<Utc>,
    pub user: UserSummary,
}

/// Store-level row: a book and its open borrow record.
#[derive(Debug, Clone, PartialEq)]
pub struct BookListing {
    pub book: BookWithAuthor,
    pub open_borrow: Option<OpenBorrow>,
}

/// Book annotated with its derived availability
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedBook {
    #[serde(flatten)]
    pub book: BookWithAuthor,
    pub is_available: bool,
    /// Present on the detail view when the book is out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_borrow: Option<OpenBorrow>,
}

impl AnnotatedBook {
    /// Derive availability from a listing row. List rows only carry the flag.
    pub fn from_listing(listing: BookListing, keep_borrow: bool) -> Self {
        let is_available = listing.open_borrow.is_none();
        Self {
            book: listing.book,
            is_available,
            current_borrow: if keep_borrow { listing.open_borrow } else { None },
        }
    }
}

/// Raw book list query string, validated into a [`BookFilter`]
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BookListQuery {
    /// Case-insensitive substring of the title or ISBN
    pub search: Option<String>,
    /// Only books by this author
    pub author_id: Option<String>,
    /// `true`: only books on the shelf, `false`: only borrowed books
    pub available: Option<String>,
    /// Inclusive lower bound on the publication date (ISO 8601)
    pub published_from: Option<String>,
    /// Inclusive upper bound on the publication date (ISO 8601)
    pub published_to: Option<String>,
    /// Page number, starting at 1
    pub page: Option<String>,
    /// Books per page
    pub limit: Option<String>,
}

impl BookListQuery {
    pub fn into_filter(self, catalog: &CatalogConfig) -> AppResult<BookFilter> {
        validation::book_filter(self, catalog)
    }
}

/// Validated book list filter
#[derive(Debug, Clone, PartialEq)]
pub struct BookFilter {
    pub search: Option<String>,
    pub author_id: Option<Uuid>,
    pub available: Option<bool>,
    pub published_from: Option<DateTime<Utc>>,
    pub published_to: Option<DateTime<Utc>>,
    pub page: i64,
    pub limit: i64,
}

impl BookFilter {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Whether a listing row satisfies every criterion of this filter.
    ///
    /// Used by stores that cannot push the predicate down to a query engine.
    pub fn matches(&self, listing: &BookListing) -> bool {
        let book = &listing.book.book;

        if let Some(ref search) = self.search {
            let needle = search.to_lowercase();
            let in_title = book.title.to_lowercase().contains(&needle);
            let in_isbn = book
                .isbn
                .as_deref()
                .map(|isbn| isbn.to_lowercase().contains(&needle))
                .unwrap_or(false);
            if !in_title && !in_isbn {
                return false;
            }
        }

        if let Some(author_id) = self.author_id {
            if book.author_id != author_id {
                return false;
            }
        }

        if self.published_from.is_some() || self.published_to.is_some() {
            let Some(published_at) = book.published_at else {
                return false;
            };
            if self.published_from.map(|from| published_at < from).unwrap_or(false) {
                return false;
            }
            if self.published_to.map(|to| published_at > to).unwrap_or(false) {
                return false;
            }
        }

        match self.available {
            Some(available) => listing.open_borrow.is_none() == available,
            None => true,
        }
    }
}

impl Default for BookFilter {
    fn default() -> Self {
        Self {
            search: None,
            author_id: None,
            available: None,
            published_from: None,
            published_to: None,
            page: 1,
            limit: CatalogConfig::default().default_page_size,
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        Self {
            total,
            page,
            limit,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

/// One page of annotated books
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookPage {
    pub data: Vec<AnnotatedBook>,
    pub meta: PageMeta,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    pub isbn: Option<String>,
    /// Publication date (ISO 8601)
    #[validate(custom(function = validation::validate_iso_date))]
    pub published_at: Option<String>,
    #[validate(custom(function = validation::validate_uuid))]
    pub author_id: String,
}

impl CreateBook {
    pub fn into_new_book(self) -> AppResult<NewBook> {
        Ok(NewBook {
            published_at: self
                .published_at
                .as_deref()
                .map(|date| validation::parse_date("publishedAt", date))
                .transpose()?,
            author_id: validation::parse_uuid("authorId", &self.author_id)?,
            title: self.title,
            isbn: self.isbn,
        })
    }
}

/// Update book request; absent fields are left untouched
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: Option<String>,
    pub isbn: Option<String>,
    #[validate(custom(function = validation::validate_iso_date))]
    pub published_at: Option<String>,
    #[validate(custom(function = validation::validate_uuid))]
    pub author_id: Option<String>,
}

impl UpdateBook {
    pub fn into_changes(self) -> AppResult<BookChanges> {
        Ok(BookChanges {
            published_at: self
                .published_at
                .as_deref()
                .map(|date| validation::parse_date("publishedAt", date))
                .transpose()?,
            author_id: self
                .author_id
                .as_deref()
                .map(|id| validation::parse_uuid("authorId", id))
                .transpose()?,
            title: self.title,
            isbn: self.isbn,
        })
    }
}

/// Validated book creation input
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub isbn: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub author_id: Uuid,
}

/// Validated partial book update
#[derive(Debug, Clone, Default)]
pub struct BookChanges {
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub author_id: Option<Uuid>,
}

impl BookChanges {
    pub fn apply(&self, book: &mut Book, now: DateTime<Utc>) {
        if let Some(ref title) = self.title {
            book.title = title.clone();
        }
        if let Some(ref isbn) = self.isbn {
            book.isbn = Some(isbn.clone());
        }
        if let Some(published_at) = self.published_at {
            book.published_at = Some(published_at);
        }
        if let Some(author_id) = self.author_id {
            book.author_id = author_id;
        }
        book.updated_at = now;
    }
}
