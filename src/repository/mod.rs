//! Storage ports and their adapters.
//!
//! Services only talk to the traits below. [`Repository::postgres`] wires the
//! sqlx adapters, [`Repository::in_memory`] the [`memory::MemoryStore`].

pub mod authors;
pub mod books;
pub mod borrowed_books;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        author::{Author, AuthorWithCount, UpdateAuthor},
        book::{Book, BookChanges, BookFilter, BookListing, BookWithAuthor},
        borrowed_book::{BorrowRecord, BorrowRecordDetails},
        user::User,
    },
};

/// Result of a delete guarded by a reference check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Missing,
    /// Something still depends on the row; nothing was deleted
    Referenced,
}

/// Result of trying to open a borrow record
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    Opened(BorrowRecord),
    /// The book already has an open record; nothing was written
    AlreadyOpen,
}

/// Result of trying to close a borrow record
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    /// The closed record with book, author and borrower, read in the same step as the update
    Closed(BorrowRecordDetails),
    AlreadyClosed,
    Missing,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorStore: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<Author>>;
    /// Newest first, with book counts
    async fn list(&self) -> AppResult<Vec<AuthorWithCount>>;
    async fn books_of(&self, id: Uuid) -> AppResult<Vec<Book>>;
    async fn create(&self, author: &Author) -> AppResult<Author>;
    async fn update(
        &self,
        id: Uuid,
        changes: &UpdateAuthor,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Author>>;
    /// Refuses to delete an author that still owns books
    async fn delete(&self, id: Uuid) -> AppResult<DeleteOutcome>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<BookWithAuthor>>;
    /// Book with its open borrow record and borrower
    async fn find_listing(&self, id: Uuid) -> AppResult<Option<BookListing>>;
    /// Number of books matching every criterion of `filter`, availability included
    async fn count(&self, filter: &BookFilter) -> AppResult<i64>;
    /// One page of matching books, newest first
    async fn page(&self, filter: &BookFilter) -> AppResult<Vec<BookListing>>;
    async fn create(&self, book: &Book) -> AppResult<Book>;
    async fn update(
        &self,
        id: Uuid,
        changes: &BookChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Book>>;
    /// Refuses to delete a book with an open borrow record; closed records go with it
    async fn delete(&self, id: Uuid) -> AppResult<DeleteOutcome>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn list(&self) -> AppResult<Vec<User>>;
    /// Fails with `Conflict(UserExists)` when the username or email is taken
    async fn create(&self, user: &User, password_hash: &str) -> AppResult<User>;
}

/// Borrow ledger storage.
///
/// `open` must be atomic per book: of any number of concurrent calls for the
/// same book with no open record, exactly one returns `Opened`. It fails with
/// `NotFound` when the book or the user does not exist at insert time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn open(
        &self,
        book_id: Uuid,
        user_id: Uuid,
        borrowed_at: DateTime<Utc>,
    ) -> AppResult<OpenOutcome>;
    /// Sets `returned_at` only if the record is still open
    async fn close(&self, id: Uuid, returned_at: DateTime<Utc>) -> AppResult<CloseOutcome>;
    /// All records of a user, open and returned, most recent first (no borrower)
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<BorrowRecordDetails>>;
    /// Every open record, most recent first
    async fn list_open(&self) -> AppResult<Vec<BorrowRecordDetails>>;
}

/// Store handles shared by the services
#[derive(Clone)]
pub struct Repository {
    pub authors: Arc<dyn AuthorStore>,
    pub books: Arc<dyn BookStore>,
    pub users: Arc<dyn UserStore>,
    pub ledger: Arc<dyn LedgerStore>,
}

impl Repository {
    /// Repository backed by PostgreSQL
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            authors: Arc::new(authors::AuthorsRepository::new(pool.clone())),
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool.clone())),
            ledger: Arc::new(borrowed_books::BorrowedBooksRepository::new(pool)),
        }
    }

    /// Repository backed by a process-local store
    pub fn in_memory(store: memory::MemoryStore) -> Self {
        Self {
            authors: Arc::new(store.clone()),
            books: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            ledger: Arc::new(store),
        }
    }
}
