//! Lending ledger: borrow and return books

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, ConflictReason, EntityKind},
    models::borrowed_book::BorrowRecordDetails,
    repository::{BookStore, CloseOutcome, LedgerStore, OpenOutcome, UserStore},
};

#[derive(Clone)]
pub struct LendingLedger {
    books: Arc<dyn BookStore>,
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn LedgerStore>,
}

impl LendingLedger {
    pub fn new(
        books: Arc<dyn BookStore>,
        users: Arc<dyn UserStore>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Self {
        Self { books, users, ledger }
    }

    /// Borrow a book for a user.
    ///
    /// Checks, in order, that the book exists, that the user exists and that the
    /// book has no open borrow record. The last check is made by the store in
    /// the same step as the insert.
    pub async fn borrow(&self, book_id: Uuid, user_id: Uuid) -> AppResult<BorrowRecordDetails> {
        let book = self
            .books
            .get(book_id)
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::Book, book_id))?;

        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::User, user_id))?;

        let record = match self.ledger.open(book_id, user_id, Utc::now()).await? {
            OpenOutcome::Opened(record) => record,
            OpenOutcome::AlreadyOpen => {
                tracing::debug!(%book_id, %user_id, "Borrow refused: book already borrowed");
                return Err(AppError::Conflict(ConflictReason::AlreadyBorrowed));
            }
        };

        tracing::info!(borrow_id = %record.id, %book_id, %user_id, "Book borrowed");

        Ok(BorrowRecordDetails {
            record,
            book,
            user: Some(user.into()),
        })
    }

    /// Return a borrowed book, closing its record
    pub async fn return_book(&self, borrow_id: Uuid) -> AppResult<BorrowRecordDetails> {
        match self.ledger.close(borrow_id, Utc::now()).await? {
            CloseOutcome::Closed(details) => {
                tracing::info!(%borrow_id, book_id = %details.record.book_id, "Book returned");
                Ok(details)
            }
            CloseOutcome::AlreadyClosed => {
                tracing::debug!(%borrow_id, "Return refused: already returned");
                Err(AppError::Conflict(ConflictReason::AlreadyReturned))
            }
            CloseOutcome::Missing => Err(AppError::not_found(EntityKind::BorrowRecord, borrow_id)),
        }
    }

    /// Every borrow record of a user, open and returned, most recent first
    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<BorrowRecordDetails>> {
        // Verify user exists
        self.users
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(EntityKind::User, user_id))?;

        self.ledger.list_for_user(user_id).await
    }

    /// Every open borrow record, most recent first
    pub async fn list_all_open(&self) -> AppResult<Vec<BorrowRecordDetails>> {
        self.ledger.list_open().await
    }
}
