//! In-memory store implementing every storage port.
//!
//! All state sits behind one lock, so each port call is atomic with respect
//! to every other call. Used by the `memory` database backend and by tests.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AuthorStore, BookStore, CloseOutcome, DeleteOutcome, LedgerStore, OpenOutcome, UserStore,
};
use crate::{
    error::{AppError, AppResult, ConflictReason, EntityKind},
    models::{
        author::{Author, AuthorWithCount, UpdateAuthor},
        book::{Book, BookChanges, BookFilter, BookListing, BookWithAuthor, OpenBorrow},
        borrowed_book::{BorrowRecord, BorrowRecordDetails},
        user::{User, UserSummary},
    },
};

#[derive(Default)]
struct MemoryState {
    authors: HashMap<Uuid, Author>,
    books: HashMap<Uuid, Book>,
    users: HashMap<Uuid, User>,
    password_hashes: HashMap<Uuid, String>,
    borrows: Vec<BorrowRecord>,
}

impl MemoryState {
    fn book_with_author(&self, book: &Book) -> Option<BookWithAuthor> {
        let author = self.authors.get(&book.author_id)?;
        Some(BookWithAuthor {
            book: book.clone(),
            author: author.clone(),
        })
    }

    fn open_borrow_of(&self, book_id: Uuid) -> Option<&BorrowRecord> {
        self.borrows
            .iter()
            .find(|r| r.book_id == book_id && r.is_open())
    }

    fn listing(&self, book: &Book) -> Option<BookListing> {
        let open_borrow = self.open_borrow_of(book.id).and_then(|record| {
            let user = self.users.get(&record.user_id)?;
            Some(OpenBorrow {
                id: record.id,
                borrowed_at: record.borrowed_at,
                user: UserSummary::from(user.clone()),
            })
        });

        Some(BookListing {
            book: self.book_with_author(book)?,
            open_borrow,
        })
    }

    fn details(&self, record: &BorrowRecord, with_user: bool) -> Option<BorrowRecordDetails> {
        let book = self.books.get(&record.book_id)?;
        let user = if with_user {
            Some(UserSummary::from(self.users.get(&record.user_id)?.clone()))
        } else {
            None
        };
        Some(BorrowRecordDetails {
            record: record.clone(),
            book: self.book_with_author(book)?,
            user,
        })
    }

    /// Records matching `keep`, most recent first
    fn details_where(
        &self,
        keep: impl Fn(&BorrowRecord) -> bool,
        with_user: bool,
    ) -> Vec<BorrowRecordDetails> {
        let mut records: Vec<&BorrowRecord> = self.borrows.iter().filter(|r| keep(*r)).collect();
        records.sort_by(|a, b| (b.borrowed_at, b.id).cmp(&(a.borrowed_at, a.id)));
        records
            .into_iter()
            .filter_map(|r| self.details(r, with_user))
            .collect()
    }

    /// Matching listings, newest book first
    fn matching(&self, filter: &BookFilter) -> Vec<BookListing> {
        let mut books: Vec<&Book> = self.books.values().collect();
        books.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        books
            .into_iter()
            .filter_map(|book| self.listing(book))
            .filter(|listing| filter.matches(listing))
            .collect()
    }
}

/// Process-local store; clones share the same state
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user account (accounts are normally provisioned by the auth service)
    pub async fn add_user(&self, username: &str, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        self.state.write().await.users.insert(user.id, user.clone());
        user
    }

    /// Store preloaded with a demo catalog and one librarian account
    pub async fn with_demo_data() -> Self {
        let store = Self::new();
        store.add_user("librarian", "librarian@bibliotheca.local").await;

        let catalog = [
            (
                "J.K. Rowling",
                "British author, best known for the Harry Potter series.",
                "Harry Potter and the Philosopher's Stone",
                "978-0747532699",
                (1997, 6, 26),
            ),
            (
                "George R.R. Martin",
                "American novelist and short story writer, known for A Song of Ice and Fire.",
                "A Game of Thrones",
                "978-0553103540",
                (1996, 8, 1),
            ),
            (
                "J.R.R. Tolkien",
                "English writer and philologist, best known for The Hobbit and The Lord of the Rings.",
                "The Hobbit",
                "978-0547928227",
                (1937, 9, 21),
            ),
        ];

        let mut state = store.state.write().await;
        for (name, bio, title, isbn, (year, month, day)) in catalog {
            let now = Utc::now();
            let author = Author {
                id: Uuid::new_v4(),
                name: name.to_string(),
                bio: Some(bio.to_string()),
                created_at: now,
                updated_at: now,
            };
            let book = Book {
                id: Uuid::new_v4(),
                title: title.to_string(),
                isbn: Some(isbn.to_string()),
                published_at: Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single(),
                author_id: author.id,
                created_at: now,
                updated_at: now,
            };
            state.authors.insert(author.id, author);
            state.books.insert(book.id, book);
        }
        drop(state);

        store
    }
}

#[async_trait]
impl AuthorStore for MemoryStore {
    async fn get(&self, id: Uuid) -> AppResult<Option<Author>> {
        Ok(self.state.read().await.authors.get(&id).cloned())
    }

    async fn list(&self) -> AppResult<Vec<AuthorWithCount>> {
        let state = self.state.read().await;
        let mut authors: Vec<AuthorWithCount> = state
            .authors
            .values()
            .map(|author| AuthorWithCount {
                author: author.clone(),
                book_count: state.books.values().filter(|b| b.author_id == author.id).count() as i64,
            })
            .collect();
        authors.sort_by(|a, b| {
            (b.author.created_at, b.author.id).cmp(&(a.author.created_at, a.author.id))
        });
        Ok(authors)
    }

    async fn books_of(&self, id: Uuid) -> AppResult<Vec<Book>> {
        let state = self.state.read().await;
        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|b| b.author_id == id)
            .cloned()
            .collect();
        books.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(books)
    }

    async fn create(&self, author: &Author) -> AppResult<Author> {
        self.state
            .write()
            .await
            .authors
            .insert(author.id, author.clone());
        Ok(author.clone())
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &UpdateAuthor,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Author>> {
        let mut state = self.state.write().await;
        let Some(author) = state.authors.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(ref name) = changes.name {
            author.name = name.clone();
        }
        if let Some(ref bio) = changes.bio {
            author.bio = Some(bio.clone());
        }
        author.updated_at = now;
        Ok(Some(author.clone()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<DeleteOutcome> {
        let mut state = self.state.write().await;
        if !state.authors.contains_key(&id) {
            return Ok(DeleteOutcome::Missing);
        }
        if state.books.values().any(|b| b.author_id == id) {
            return Ok(DeleteOutcome::Referenced);
        }
        state.authors.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn get(&self, id: Uuid) -> AppResult<Option<BookWithAuthor>> {
        let state = self.state.read().await;
        Ok(state.books.get(&id).and_then(|b| state.book_with_author(b)))
    }

    async fn find_listing(&self, id: Uuid) -> AppResult<Option<BookListing>> {
        let state = self.state.read().await;
        Ok(state.books.get(&id).and_then(|b| state.listing(b)))
    }

    async fn count(&self, filter: &BookFilter) -> AppResult<i64> {
        Ok(self.state.read().await.matching(filter).len() as i64)
    }

    async fn page(&self, filter: &BookFilter) -> AppResult<Vec<BookListing>> {
        let listings = self.state.read().await.matching(filter);
        Ok(listings
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn create(&self, book: &Book) -> AppResult<Book> {
        self.state.write().await.books.insert(book.id, book.clone());
        Ok(book.clone())
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &BookChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Book>> {
        let mut state = self.state.write().await;
        let Some(book) = state.books.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply(book, now);
        Ok(Some(book.clone()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<DeleteOutcome> {
        let mut state = self.state.write().await;
        if !state.books.contains_key(&id) {
            return Ok(DeleteOutcome::Missing);
        }
        if state.open_borrow_of(id).is_some() {
            return Ok(DeleteOutcome::Referenced);
        }
        state.books.remove(&id);
        state.borrows.retain(|r| r.book_id != id);
        Ok(DeleteOutcome::Deleted)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(users)
    }

    async fn create(&self, user: &User, password_hash: &str) -> AppResult<User> {
        let mut state = self.state.write().await;
        let taken = state
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if taken {
            return Err(AppError::Conflict(ConflictReason::UserExists));
        }
        state.users.insert(user.id, user.clone());
        state.password_hashes.insert(user.id, password_hash.to_string());
        Ok(user.clone())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn open(
        &self,
        book_id: Uuid,
        user_id: Uuid,
        borrowed_at: DateTime<Utc>,
    ) -> AppResult<OpenOutcome> {
        // Existence checks and insert under the same write guard.
        let mut state = self.state.write().await;
        if !state.books.contains_key(&book_id) {
            return Err(AppError::not_found(EntityKind::Book, book_id));
        }
        if !state.users.contains_key(&user_id) {
            return Err(AppError::not_found(EntityKind::User, user_id));
        }
        if state.open_borrow_of(book_id).is_some() {
            return Ok(OpenOutcome::AlreadyOpen);
        }
        let record = BorrowRecord {
            id: Uuid::new_v4(),
            book_id,
            user_id,
            borrowed_at,
            returned_at: None,
        };
        state.borrows.push(record.clone());
        Ok(OpenOutcome::Opened(record))
    }

    async fn close(&self, id: Uuid, returned_at: DateTime<Utc>) -> AppResult<CloseOutcome> {
        let mut state = self.state.write().await;
        let Some(record) = state.borrows.iter_mut().find(|r| r.id == id) else {
            return Ok(CloseOutcome::Missing);
        };
        if !record.is_open() {
            return Ok(CloseOutcome::AlreadyClosed);
        }
        record.returned_at = Some(returned_at);
        let record = record.clone();

        let details = state.details(&record, true).ok_or_else(|| {
            AppError::Internal(format!("Borrow record {} has no book or borrower", id))
        })?;
        Ok(CloseOutcome::Closed(details))
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<BorrowRecordDetails>> {
        Ok(self
            .state
            .read()
            .await
            .details_where(|r| r.user_id == user_id, false))
    }

    async fn list_open(&self) -> AppResult<Vec<BorrowRecordDetails>> {
        Ok(self.state.read().await.details_where(BorrowRecord::is_open, true))
    }
}
