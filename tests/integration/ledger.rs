//! Lending ledger properties over the in-memory store

use bibliotheca_server::{
    error::{AppError, ConflictReason, EntityKind},
    models::book::BookFilter,
};
use uuid::Uuid;

use crate::common::TestApp;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_borrows_of_one_book_admit_exactly_one() {
    let app = TestApp::new().await;
    let tolkien = app.author("J.R.R. Tolkien").await;
    let hobbit = app.book("The Hobbit", &tolkien, 1937).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let reader = app.user(&format!("reader{i}")).await;
        let services = app.state.services.clone();
        let book_id = hobbit.book.id;
        handles.push(tokio::spawn(async move {
            services.ledger.borrow(book_id, reader.id).await
        }));
    }

    let mut borrowed = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => borrowed += 1,
            Err(AppError::Conflict(ConflictReason::AlreadyBorrowed)) => refused += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(borrowed, 1);
    assert_eq!(refused, 15);
    assert_eq!(app.state.services.ledger.list_all_open().await.unwrap().len(), 1);
}

#[tokio::test]
async fn borrow_return_borrow_again() {
    let app = TestApp::new().await;
    let tolkien = app.author("J.R.R. Tolkien").await;
    let hobbit = app.book("The Hobbit", &tolkien, 1937).await;
    let (bilbo, frodo) = (app.user("bilbo").await, app.user("frodo").await);
    let ledger = &app.state.services.ledger;

    let first = ledger.borrow(hobbit.book.id, bilbo.id).await.unwrap();
    assert!(first.record.returned_at.is_none());

    let returned = ledger.return_book(first.record.id).await.unwrap();
    assert!(returned.record.returned_at.is_some());

    let second = ledger.borrow(hobbit.book.id, frodo.id).await.unwrap();
    assert_ne!(second.record.id, first.record.id);
    assert_eq!(second.user.unwrap().username, "frodo");
}

#[tokio::test]
async fn double_return_conflicts() {
    let app = TestApp::new().await;
    let tolkien = app.author("J.R.R. Tolkien").await;
    let hobbit = app.book("The Hobbit", &tolkien, 1937).await;
    let bilbo = app.user("bilbo").await;
    let ledger = &app.state.services.ledger;

    let record = ledger.borrow(hobbit.book.id, bilbo.id).await.unwrap();
    let returned = ledger.return_book(record.record.id).await.unwrap();
    let returned_at = returned.record.returned_at;

    let err = ledger.return_book(record.record.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(ConflictReason::AlreadyReturned)));

    // The first return time is kept.
    let history = ledger.list_for_user(bilbo.id).await.unwrap();
    assert_eq!(history[0].record.returned_at, returned_at);
}

#[tokio::test]
async fn borrow_of_unknown_book_creates_no_record() {
    let app = TestApp::new().await;
    let bilbo = app.user("bilbo").await;
    let ledger = &app.state.services.ledger;

    let err = ledger.borrow(Uuid::new_v4(), bilbo.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(EntityKind::Book, _)));
    assert!(ledger.list_for_user(bilbo.id).await.unwrap().is_empty());
    assert!(ledger.list_all_open().await.unwrap().is_empty());
}

#[tokio::test]
async fn borrow_for_unknown_user_is_not_found() {
    let app = TestApp::new().await;
    let tolkien = app.author("J.R.R. Tolkien").await;
    let hobbit = app.book("The Hobbit", &tolkien, 1937).await;

    let err = app
        .state
        .services
        .ledger
        .borrow(hobbit.book.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(EntityKind::User, _)));
}

#[tokio::test]
async fn user_history_keeps_returned_records_most_recent_first() {
    let app = TestApp::new().await;
    let tolkien = app.author("J.R.R. Tolkien").await;
    let hobbit = app.book("The Hobbit", &tolkien, 1937).await;
    let silmarillion = app.book("The Silmarillion", &tolkien, 1977).await;
    let bilbo = app.user("bilbo").await;
    let ledger = &app.state.services.ledger;

    let first = ledger.borrow(hobbit.book.id, bilbo.id).await.unwrap();
    ledger.return_book(first.record.id).await.unwrap();
    let second = ledger.borrow(silmarillion.book.id, bilbo.id).await.unwrap();

    let history = ledger.list_for_user(bilbo.id).await.unwrap();
    let ids: Vec<Uuid> = history.iter().map(|r| r.record.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.record.id) && ids.contains(&second.record.id));
    assert!(history[0].record.borrowed_at >= history[1].record.borrowed_at);
    assert!(history.iter().all(|r| r.user.is_none()));
}

#[tokio::test]
async fn hobbit_availability_follows_the_ledger() {
    let app = TestApp::new().await;
    let tolkien = app.author("Tolkien").await;
    let hobbit = app.book("Hobbit", &tolkien, 1937).await;
    let reader = app.user("userA").await;
    let services = &app.state.services;

    let titles = move |available: Option<bool>| {
        let filter = BookFilter {
            available,
            ..BookFilter::default()
        };
        async move {
            services
                .availability
                .list_books(&filter)
                .await
                .unwrap()
                .data
                .into_iter()
                .map(|b| (b.book.book.title, b.is_available))
                .collect::<Vec<_>>()
        }
    };

    assert_eq!(titles(None).await, vec![("Hobbit".to_string(), true)]);

    let record = services.ledger.borrow(hobbit.book.id, reader.id).await.unwrap();
    assert!(record.record.returned_at.is_none());
    assert!(titles(Some(true)).await.is_empty());
    assert_eq!(titles(Some(false)).await, vec![("Hobbit".to_string(), false)]);

    services.ledger.return_book(record.record.id).await.unwrap();
    assert_eq!(titles(Some(true)).await, vec![("Hobbit".to_string(), true)]);
    assert!(titles(Some(false)).await.is_empty());
}
