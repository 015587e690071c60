//! Borrowed books (ledger) repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use super::{
    books::{book_with_author_from_row, BOOK_WITH_AUTHOR_COLUMNS},
    CloseOutcome, LedgerStore, OpenOutcome,
};
use crate::{
    error::{AppError, AppResult, EntityKind},
    models::{
        borrowed_book::{BorrowRecord, BorrowRecordDetails},
        user::UserSummary,
    },
};

const RECORD_COLUMNS: &str = "id, book_id, user_id, borrowed_at, returned_at";

fn details_from_row(row: &PgRow, with_user: bool) -> BorrowRecordDetails {
    let record = BorrowRecord {
        id: row.get("id"),
        // b.id AS book_id
        book_id: row.get("book_id"),
        user_id: row.get("user_id"),
        borrowed_at: row.get("borrowed_at"),
        returned_at: row.get("returned_at"),
    };

    let user = with_user.then(|| UserSummary {
        id: record.user_id,
        username: row.get("username"),
        email: row.get("email"),
    });

    BorrowRecordDetails {
        record,
        book: book_with_author_from_row(row),
        user,
    }
}

#[derive(Clone)]
pub struct BorrowedBooksRepository {
    pool: Pool<Postgres>,
}

impl BorrowedBooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn details_select() -> String {
        format!(
            r#"
            SELECT bb.id, bb.user_id, bb.borrowed_at, bb.returned_at,
                   u.username, u.email,
                   {BOOK_WITH_AUTHOR_COLUMNS}
            FROM borrowed_books bb
            JOIN books b ON b.id = bb.book_id
            JOIN authors a ON a.id = b.author_id
            JOIN users u ON u.id = bb.user_id
            "#
        )
    }
}

#[async_trait]
impl LedgerStore for BorrowedBooksRepository {
    async fn open(
        &self,
        book_id: Uuid,
        user_id: Uuid,
        borrowed_at: DateTime<Utc>,
    ) -> AppResult<OpenOutcome> {
        // The partial unique index on open records arbitrates concurrent borrows.
        let inserted = sqlx::query_as::<_, BorrowRecord>(&format!(
            r#"
            INSERT INTO borrowed_books (id, book_id, user_id, borrowed_at, returned_at)
            VALUES ($1, $2, $3, $4, NULL)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(book_id)
        .bind(user_id)
        .bind(borrowed_at)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(record) => Ok(OpenOutcome::Opened(record)),
            Err(e) => {
                let Some(db) = e.as_database_error() else {
                    return Err(AppError::Database(e));
                };
                if db.is_unique_violation() {
                    return Ok(OpenOutcome::AlreadyOpen);
                }
                if db.is_foreign_key_violation() {
                    let missing = if db.constraint().is_some_and(|c| c.contains("book_id")) {
                        AppError::not_found(EntityKind::Book, book_id)
                    } else {
                        AppError::not_found(EntityKind::User, user_id)
                    };
                    return Err(missing);
                }
                Err(AppError::Database(e))
            }
        }
    }

    async fn close(&self, id: Uuid, returned_at: DateTime<Utc>) -> AppResult<CloseOutcome> {
        // The closed record is read back before commit, so a book delete
        // cascading right after the return cannot hide it.
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE borrowed_books SET returned_at = $2
            WHERE id = $1 AND returned_at IS NULL
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(returned_at)
        .fetch_optional(&mut *tx)
        .await?;

        if closed.is_none() {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM borrowed_books WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;

            return Ok(if exists {
                CloseOutcome::AlreadyClosed
            } else {
                CloseOutcome::Missing
            });
        }

        let row = sqlx::query(&format!("{} WHERE bb.id = $1", Self::details_select()))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(CloseOutcome::Closed(details_from_row(&row, true)))
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<BorrowRecordDetails>> {
        let rows = sqlx::query(&format!(
            "{} WHERE bb.user_id = $1 ORDER BY bb.borrowed_at DESC, bb.id DESC",
            Self::details_select()
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| details_from_row(r, false)).collect())
    }

    async fn list_open(&self) -> AppResult<Vec<BorrowRecordDetails>> {
        let rows = sqlx::query(&format!(
            "{} WHERE bb.returned_at IS NULL ORDER BY bb.borrowed_at DESC, bb.id DESC",
            Self::details_select()
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| details_from_row(r, true)).collect())
    }
}
