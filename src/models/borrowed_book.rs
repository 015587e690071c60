//! Borrow record model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::book::BookWithAuthor;
use super::user::UserSummary;

/// Borrow record from database. `returned_at = None` means the book is out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRecord {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub borrowed_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl BorrowRecord {
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// Borrow record with its book (and author) and, where relevant, the borrower
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BorrowRecordDetails {
    #[serde(flatten)]
    pub record: BorrowRecord,
    pub book: BookWithAuthor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}
