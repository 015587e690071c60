//! Books repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Pool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{BookStore, DeleteOutcome};
use crate::{
    error::{AppError, AppResult, EntityKind},
    models::{
        author::Author,
        book::{Book, BookChanges, BookFilter, BookListing, BookWithAuthor, OpenBorrow},
        user::UserSummary,
    },
};

/// Book and author columns, aliased for [`book_with_author_from_row`]
pub(crate) const BOOK_WITH_AUTHOR_COLUMNS: &str = r#"
    b.id AS book_id, b.title AS book_title, b.isbn AS book_isbn,
    b.published_at AS book_published_at, b.author_id AS book_author_id,
    b.created_at AS book_created_at, b.updated_at AS book_updated_at,
    a.name AS author_name, a.bio AS author_bio,
    a.created_at AS author_created_at, a.updated_at AS author_updated_at
"#;

/// Books joined with their author and, when out, the open borrow and borrower
const LISTING_FROM: &str = r#"
    FROM books b
    JOIN authors a ON a.id = b.author_id
    LEFT JOIN borrowed_books bb ON bb.book_id = b.id AND bb.returned_at IS NULL
    LEFT JOIN users u ON u.id = bb.user_id
"#;

const BOOK_COLUMNS: &str = "id, title, isbn, published_at, author_id, created_at, updated_at";

pub(crate) fn book_with_author_from_row(row: &PgRow) -> BookWithAuthor {
    let author_id: Uuid = row.get("book_author_id");
    BookWithAuthor {
        book: Book {
            id: row.get("book_id"),
            title: row.get("book_title"),
            isbn: row.get("book_isbn"),
            published_at: row.get("book_published_at"),
            author_id,
            created_at: row.get("book_created_at"),
            updated_at: row.get("book_updated_at"),
        },
        author: Author {
            id: author_id,
            name: row.get("author_name"),
            bio: row.get("author_bio"),
            created_at: row.get("author_created_at"),
            updated_at: row.get("author_updated_at"),
        },
    }
}

fn listing_from_row(row: &PgRow) -> BookListing {
    let borrow_id: Option<Uuid> = row.get("borrow_id");
    let open_borrow = borrow_id.map(|id| OpenBorrow {
        id,
        borrowed_at: row.get("borrow_borrowed_at"),
        user: UserSummary {
            id: row.get("borrower_id"),
            username: row.get("borrower_username"),
            email: row.get("borrower_email"),
        },
    });

    BookListing {
        book: book_with_author_from_row(row),
        open_borrow,
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Append the WHERE clause for `filter`. Availability is part of the
/// predicate so counts and pages agree.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &BookFilter) {
    builder.push(" WHERE 1=1");

    if let Some(ref search) = filter.search {
        let pattern = format!("%{}%", escape_like(search));
        builder
            .push(" AND (b.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR b.isbn ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(author_id) = filter.author_id {
        builder.push(" AND b.author_id = ").push_bind(author_id);
    }

    if let Some(from) = filter.published_from {
        builder.push(" AND b.published_at >= ").push_bind(from);
    }

    if let Some(to) = filter.published_to {
        builder.push(" AND b.published_at <= ").push_bind(to);
    }

    match filter.available {
        Some(true) => {
            builder.push(" AND bb.id IS NULL");
        }
        Some(false) => {
            builder.push(" AND bb.id IS NOT NULL");
        }
        None => {}
    }
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn listing_select() -> String {
        format!(
            r#"
            SELECT {BOOK_WITH_AUTHOR_COLUMNS},
                   bb.id AS borrow_id, bb.borrowed_at AS borrow_borrowed_at,
                   u.id AS borrower_id, u.username AS borrower_username, u.email AS borrower_email
            {LISTING_FROM}
            "#
        )
    }
}

#[async_trait]
impl BookStore for BooksRepository {
    async fn get(&self, id: Uuid) -> AppResult<Option<BookWithAuthor>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {BOOK_WITH_AUTHOR_COLUMNS}
            FROM books b
            JOIN authors a ON a.id = b.author_id
            WHERE b.id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(book_with_author_from_row))
    }

    async fn find_listing(&self, id: Uuid) -> AppResult<Option<BookListing>> {
        let row = sqlx::query(&format!("{} WHERE b.id = $1", Self::listing_select()))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(listing_from_row))
    }

    async fn count(&self, filter: &BookFilter) -> AppResult<i64> {
        let mut builder = QueryBuilder::new(format!("SELECT COUNT(*) {LISTING_FROM}"));
        push_filter(&mut builder, filter);

        let total = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn page(&self, filter: &BookFilter) -> AppResult<Vec<BookListing>> {
        let mut builder = QueryBuilder::new(Self::listing_select());
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY b.created_at DESC, b.id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset());

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(listing_from_row).collect())
    }

    async fn create(&self, book: &Book) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books ({BOOK_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(book.published_at)
        .bind(book.author_id)
        .bind(book.created_at)
        .bind(book.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| missing_author(e, book.author_id))?;

        Ok(created)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &BookChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Book>> {
        let updated = sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                isbn = COALESCE($3, isbn),
                published_at = COALESCE($4, published_at),
                author_id = COALESCE($5, author_id),
                updated_at = $6
            WHERE id = $1
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.isbn)
        .bind(changes.published_at)
        .bind(changes.author_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match changes.author_id {
            Some(author_id) => missing_author(e, author_id),
            None => AppError::Database(e),
        })?;

        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> AppResult<DeleteOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock: a concurrent borrow's FK check waits for us, and we wait for it.
        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Ok(DeleteOutcome::Missing);
        }

        let borrowed: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM borrowed_books WHERE book_id = $1 AND returned_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if borrowed {
            return Ok(DeleteOutcome::Referenced);
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(DeleteOutcome::Deleted)
    }
}

/// A foreign-key failure on `author_id` means the author vanished meanwhile.
fn missing_author(error: sqlx::Error, author_id: Uuid) -> AppError {
    match error.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => AppError::not_found(EntityKind::Author, author_id),
        _ => AppError::Database(error),
    }
}
