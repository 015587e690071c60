//! Ledger behaviour against a real Postgres database.
//!
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored postgres

use std::sync::Arc;

use bibliotheca_server::{
    error::{AppError, ConflictReason, EntityKind},
    models::{
        author::CreateAuthor,
        book::{BookWithAuthor, NewBook},
        user::{CreateUser, UserSummary},
    },
    repository::{LedgerStore, OpenOutcome, Repository},
    services::Services,
};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

struct Database {
    repository: Repository,
    services: Arc<Services>,
}

async fn connect() -> Database {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for Postgres tests");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("connect to DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");

    let repository = Repository::postgres(pool);
    Database {
        services: Arc::new(Services::new(repository.clone())),
        repository,
    }
}

impl Database {
    /// A fresh book under a fresh author, so reruns never collide
    async fn book(&self) -> BookWithAuthor {
        let author = self
            .services
            .authors
            .create(CreateAuthor {
                name: format!("Author {}", Uuid::new_v4()),
                bio: None,
            })
            .await
            .unwrap();
        self.services
            .catalog
            .create_book(NewBook {
                title: format!("Book {}", Uuid::new_v4()),
                isbn: None,
                published_at: None,
                author_id: author.id,
            })
            .await
            .unwrap()
    }

    async fn user(&self) -> UserSummary {
        let tag = Uuid::new_v4().simple().to_string();
        self.services
            .users
            .create(CreateUser {
                username: format!("reader-{tag}"),
                email: format!("{tag}@bibliotheca.test"),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn postgres_concurrent_borrows_admit_exactly_one() {
    let db = connect().await;
    let book = db.book().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let reader = db.user().await;
        let services = db.services.clone();
        let book_id = book.book.id;
        handles.push(tokio::spawn(async move {
            services.ledger.borrow(book_id, reader.id).await
        }));
    }

    let mut borrowed = Vec::new();
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(details) => borrowed.push(details),
            Err(AppError::Conflict(ConflictReason::AlreadyBorrowed)) => refused += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(borrowed.len(), 1);
    assert_eq!(refused, 7);

    let ledger = &db.services.ledger;
    let record_id = borrowed[0].record.id;
    let returned = ledger.return_book(record_id).await.unwrap();
    assert!(returned.record.returned_at.is_some());
    assert_eq!(returned.book.book.id, book.book.id);

    let err = ledger.return_book(record_id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(ConflictReason::AlreadyReturned)));
}

#[tokio::test]
#[ignore]
async fn postgres_open_maps_foreign_keys_to_the_missing_entity() {
    let db = connect().await;
    let book = db.book().await;
    let reader = db.user().await;
    let ledger = &db.repository.ledger;

    let err = ledger
        .open(book.book.id, Uuid::new_v4(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(EntityKind::User, _)));

    let err = ledger
        .open(Uuid::new_v4(), reader.id, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(EntityKind::Book, _)));

    let outcome = ledger.open(book.book.id, reader.id, Utc::now()).await.unwrap();
    assert!(matches!(outcome, OpenOutcome::Opened(_)));
    let outcome = ledger.open(book.book.id, reader.id, Utc::now()).await.unwrap();
    assert!(matches!(outcome, OpenOutcome::AlreadyOpen));
}
