//! Full router tests over the in-memory store

use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::common::{token_for, TestApp};

#[tokio::test]
async fn health_and_readiness() {
    let app = TestApp::new().await;

    let (status, body) = app.call(Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.call(Method::GET, "/api/v1/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn ledger_routes_require_a_valid_token() {
    let app = TestApp::new().await;

    let (status, body) = app.call(Method::GET, "/api/v1/borrowed-books", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthenticated");

    let mallory = app.user("mallory").await;
    let forged = token_for(&mallory, "another-secret");
    let (status, _) = app
        .call_with_token(Method::GET, "/api/v1/borrowed-books", &forged)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call_auth(Method::GET, "/api/v1/borrowed-books", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn borrow_and_return_over_http() {
    let app = TestApp::new().await;
    let tolkien = app.author("J.R.R. Tolkien").await;
    let hobbit = app.book("The Hobbit", &tolkien, 1937).await;
    let bilbo = app.user("bilbo").await;

    let borrow = json!({ "bookId": hobbit.book.id, "userId": bilbo.id });
    let (status, record) = app
        .call_auth(Method::POST, "/api/v1/borrowed-books/borrow", Some(borrow.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["bookId"], hobbit.book.id.to_string());
    assert_eq!(record["returnedAt"], serde_json::Value::Null);
    assert_eq!(record["book"]["title"], "The Hobbit");
    assert_eq!(record["book"]["author"]["name"], "J.R.R. Tolkien");
    assert_eq!(record["user"]["username"], "bilbo");

    let (status, body) = app
        .call_auth(Method::POST, "/api/v1/borrowed-books/borrow", Some(borrow))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "BookAlreadyBorrowed");

    let (status, detail) = app
        .call(Method::GET, &format!("/api/v1/books/{}", hobbit.book.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["isAvailable"], false);
    assert_eq!(detail["currentBorrow"]["user"]["username"], "bilbo");

    let ret = json!({ "borrowedBookId": record["id"] });
    let (status, returned) = app
        .call_auth(Method::POST, "/api/v1/borrowed-books/return", Some(ret.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(returned["returnedAt"].is_string());

    let (status, body) = app
        .call_auth(Method::POST, "/api/v1/borrowed-books/return", Some(ret))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "BookAlreadyReturned");

    let (status, history) = app
        .call_auth(Method::GET, &format!("/api/v1/borrowed-books/user/{}", bilbo.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert!(history[0].get("user").is_none());
}

#[tokio::test]
async fn malformed_borrow_requests_are_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call_auth(
            Method::POST,
            "/api/v1/borrowed-books/borrow",
            Some(json!({ "bookId": "not-a-uuid", "userId": uuid::Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
    assert!(body["message"].as_str().unwrap().contains("bookId"));

    let (status, _) = app
        .call_auth(Method::POST, "/api/v1/borrowed-books/borrow", Some(json!({ "bookId": uuid::Uuid::new_v4() })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call_auth(
            Method::POST,
            "/api/v1/borrowed-books/borrow",
            Some(json!({ "bookId": uuid::Uuid::new_v4(), "userId": uuid::Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchBook");

    let (status, body) = app
        .call_auth(Method::GET, "/api/v1/borrowed-books/user/nobody", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchUser");
}

#[tokio::test]
async fn second_page_of_fifteen_books() {
    let app = TestApp::new().await;
    let author = app.author("Terry Pratchett").await;
    for i in 0..15 {
        app.book(&format!("Discworld {i}"), &author, 1983 + i).await;
    }

    let (status, body) = app.call(Method::GET, "/api/v1/books?limit=10&page=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
    assert_eq!(body["meta"]["total"], 15);
    assert_eq!(body["meta"]["totalPages"], 2);
    assert_eq!(body["meta"]["page"], 2);
}

#[tokio::test]
async fn availability_filter_drives_meta() {
    let app = TestApp::new().await;
    let author = app.author("Ursula K. Le Guin").await;
    let reader = app.user("ged").await;
    for i in 0..12 {
        let book = app.book(&format!("Earthsea {i}"), &author, 1968 + i).await;
        if i % 3 == 0 {
            app.state.services.ledger.borrow(book.book.id, reader.id).await.unwrap();
        }
    }

    let (_, out) = app.call(Method::GET, "/api/v1/books?available=false&limit=3", None).await;
    assert_eq!(out["meta"]["total"], 4);
    assert_eq!(out["meta"]["totalPages"], 2);
    assert!(out["data"].as_array().unwrap().iter().all(|b| b["isAvailable"] == false));

    let (_, on_shelf) = app.call(Method::GET, "/api/v1/books?available=true", None).await;
    assert_eq!(on_shelf["meta"]["total"], 8);
    assert_eq!(on_shelf["data"].as_array().unwrap().len(), 8);
    assert!(on_shelf["data"].as_array().unwrap().iter().all(|b| b["isAvailable"] == true));

    // Empty values are ignored
    let (status, all) = app.call(Method::GET, "/api/v1/books?available=&search=", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["meta"]["total"], 12);
}

#[tokio::test]
async fn book_list_filters_and_bad_queries() {
    let app = TestApp::new().await;
    let tolkien = app.author("J.R.R. Tolkien").await;
    let martin = app.author("George R.R. Martin").await;
    app.book("The Hobbit", &tolkien, 1937).await;
    app.book("The Silmarillion", &tolkien, 1977).await;
    app.book("A Game of Thrones", &martin, 1996).await;

    let (_, body) = app
        .call(Method::GET, &format!("/api/v1/books?authorId={}", tolkien.id), None)
        .await;
    assert_eq!(body["meta"]["total"], 2);

    let (_, body) = app.call(Method::GET, "/api/v1/books?search=THRONES", None).await;
    assert_eq!(body["data"][0]["title"], "A Game of Thrones");

    let (_, body) = app
        .call(Method::GET, "/api/v1/books?publishedFrom=1950-01-01&publishedTo=1990-12-31", None)
        .await;
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["title"], "The Silmarillion");

    for query in [
        "limit=0",
        "limit=101",
        "page=abc",
        "page=9223372036854775807",
        "available=maybe",
        "authorId=42",
        "publishedFrom=yesterday",
    ] {
        let (status, body) = app.call(Method::GET, &format!("/api/v1/books?{query}"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {query}");
        assert_eq!(body["error"], "BadValue");
    }

    let (status, _) = app.call(Method::GET, "/api/v1/books/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn book_delete_respects_open_borrows() {
    let app = TestApp::new().await;
    let tolkien = app.author("J.R.R. Tolkien").await;
    let hobbit = app.book("The Hobbit", &tolkien, 1937).await;
    let bilbo = app.user("bilbo").await;
    let record = app.state.services.ledger.borrow(hobbit.book.id, bilbo.id).await.unwrap();
    let uri = format!("/api/v1/books/{}", hobbit.book.id);

    let (status, body) = app.call_auth(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "BookHasOpenBorrow");

    app.state.services.ledger.return_book(record.record.id).await.unwrap();
    let (status, _) = app.call_auth(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.state.services.ledger.list_for_user(bilbo.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn catalog_management_round() {
    let app = TestApp::new().await;

    let (status, _) = app
        .call(Method::POST, "/api/v1/authors", Some(json!({ "name": "Anonymous" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call_auth(Method::POST, "/api/v1/authors", Some(json!({ "name": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("name"));

    let (status, author) = app
        .call_auth(Method::POST, "/api/v1/authors", Some(json!({ "name": "Frank Herbert" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let author_id = author["id"].as_str().unwrap().to_string();

    let (status, book) = app
        .call_auth(
            Method::POST,
            "/api/v1/books",
            Some(json!({ "title": "Dune", "isbn": "978-0441013593", "publishedAt": "1965-08-01", "authorId": author_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(book["publishedAt"], "1965-08-01T00:00:00Z");
    let book_uri = format!("/api/v1/books/{}", book["id"].as_str().unwrap());

    let (status, body) = app
        .call_auth(
            Method::POST,
            "/api/v1/books",
            Some(json!({ "title": "Orphan", "authorId": uuid::Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchAuthor");

    let (status, updated) = app
        .call_auth(Method::PATCH, &book_uri, Some(json!({ "title": "Dune Messiah" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Dune Messiah");
    assert_eq!(updated["isbn"], "978-0441013593");

    let (_, authors) = app.call(Method::GET, "/api/v1/authors", None).await;
    assert_eq!(authors[0]["bookCount"], 1);

    let author_uri = format!("/api/v1/authors/{author_id}");
    let (_, detail) = app.call(Method::GET, &author_uri, None).await;
    assert_eq!(detail["books"][0]["title"], "Dune Messiah");

    let (status, body) = app.call_auth(Method::DELETE, &author_uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AuthorHasBooks");

    let (status, _) = app.call_auth(Method::DELETE, &book_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call_auth(Method::DELETE, &author_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn user_directory() {
    let app = TestApp::new().await;
    let bilbo = app.user("bilbo").await;

    let (status, users) = app.call_auth(Method::GET, "/api/v1/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    let (status, user) = app
        .call_auth(Method::GET, &format!("/api/v1/users/{}", bilbo.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["username"], "bilbo");
    assert!(user.get("passwordHash").is_none());

    let (status, _) = app.call(Method::GET, "/api/v1/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn created_user_can_borrow_and_never_sees_a_password() {
    let app = TestApp::new().await;
    let tolkien = app.author("J.R.R. Tolkien").await;
    let hobbit = app.book("The Hobbit", &tolkien, 1937).await;

    let sam = json!({ "username": "sam", "email": "sam@shire.me", "password": "potatoes" });
    let (status, _) = app.call(Method::POST, "/api/v1/users", Some(sam.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, created) = app.call_auth(Method::POST, "/api/v1/users", Some(sam.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["username"], "sam");
    assert_eq!(created["email"], "sam@shire.me");
    let mut fields: Vec<&str> = created.as_object().unwrap().keys().map(String::as_str).collect();
    fields.sort_unstable();
    assert_eq!(fields, ["email", "id", "username"]);

    let (status, body) = app.call_auth(Method::POST, "/api/v1/users", Some(sam)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "UserExists");

    let same_email = json!({ "username": "samwise", "email": "sam@shire.me", "password": "potatoes" });
    let (status, body) = app.call_auth(Method::POST, "/api/v1/users", Some(same_email)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "UserExists");

    let short = json!({ "username": "rosie", "email": "rosie@shire.me", "password": "ale" });
    let (status, body) = app.call_auth(Method::POST, "/api/v1/users", Some(short)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
    assert!(body["message"].as_str().unwrap().contains("password"));

    let bad_email = json!({ "username": "rosie", "email": "rosie", "password": "green-dragon" });
    let (status, body) = app.call_auth(Method::POST, "/api/v1/users", Some(bad_email)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("email"));

    let borrow = json!({ "bookId": hobbit.book.id, "userId": created["id"] });
    let (status, record) = app
        .call_auth(Method::POST, "/api/v1/borrowed-books/borrow", Some(borrow))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["user"]["username"], "sam");

    let (status, users) = app.call_auth(Method::GET, "/api/v1/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);
    assert!(users[0].get("password").is_none());
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let (status, doc) = app.call(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/borrowed-books/borrow"].is_object());
}
