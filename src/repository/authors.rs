//! Authors repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use super::{AuthorStore, DeleteOutcome};
use crate::{
    error::AppResult,
    models::{
        author::{Author, AuthorWithCount, UpdateAuthor},
        book::Book,
    },
};

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorStore for AuthorsRepository {
    async fn get(&self, id: Uuid) -> AppResult<Option<Author>> {
        let author = sqlx::query_as::<_, Author>(
            "SELECT id, name, bio, created_at, updated_at FROM authors WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(author)
    }

    async fn list(&self) -> AppResult<Vec<AuthorWithCount>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.name, a.bio, a.created_at, a.updated_at,
                   COUNT(b.id) AS book_count
            FROM authors a
            LEFT JOIN books b ON b.author_id = a.id
            GROUP BY a.id
            ORDER BY a.created_at DESC, a.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| AuthorWithCount {
                author: Author {
                    id: r.get("id"),
                    name: r.get("name"),
                    bio: r.get("bio"),
                    created_at: r.get("created_at"),
                    updated_at: r.get("updated_at"),
                },
                book_count: r.get("book_count"),
            })
            .collect())
    }

    async fn books_of(&self, id: Uuid) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, title, isbn, published_at, author_id, created_at, updated_at
            FROM books
            WHERE author_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn create(&self, author: &Author) -> AppResult<Author> {
        let created = sqlx::query_as::<_, Author>(
            r#"
            INSERT INTO authors (id, name, bio, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, bio, created_at, updated_at
            "#,
        )
        .bind(author.id)
        .bind(&author.name)
        .bind(&author.bio)
        .bind(author.created_at)
        .bind(author.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &UpdateAuthor,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Author>> {
        let updated = sqlx::query_as::<_, Author>(
            r#"
            UPDATE authors SET
                name = COALESCE($2, name),
                bio = COALESCE($3, bio),
                updated_at = $4
            WHERE id = $1
            RETURNING id, name, bio, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.bio)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> AppResult<DeleteOutcome> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM authors WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Ok(DeleteOutcome::Missing);
        }

        let has_books: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE author_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if has_books {
            return Ok(DeleteOutcome::Referenced);
        }

        sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(DeleteOutcome::Deleted)
    }
}
