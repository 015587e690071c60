//! Book catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{AppResult, EntityKind},
    models::book::{AnnotatedBook, BookListQuery, BookPage, BookWithAuthor, CreateBook, UpdateBook},
    validation,
};

use super::{AuthenticatedUser, ValidatedJson};

/// List books with availability, filters and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookListQuery),
    responses(
        (status = 200, description = "One page of books", body = BookPage),
        (status = 400, description = "Invalid query parameter", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookListQuery>,
) -> AppResult<Json<BookPage>> {
    let filter = query.into_filter(&state.config.catalog)?;
    let page = state.services.availability.list_books(&filter).await?;
    Ok(Json(page))
}

/// Get a book with its availability and current borrower
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = AnnotatedBook),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<AnnotatedBook>> {
    let id = validation::parse_path_id(EntityKind::Book, &id)?;
    let book = state.services.availability.find_one(id).await?;
    Ok(Json(book))
}

/// Create a book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = BookWithAuthor),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<CreateBook>,
) -> AppResult<(StatusCode, Json<BookWithAuthor>)> {
    let book = state.services.catalog.create_book(request.into_new_book()?).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Update a book
#[utoipa::path(
    patch,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = BookWithAuthor),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Book or author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateBook>,
) -> AppResult<Json<BookWithAuthor>> {
    let id = validation::parse_path_id(EntityKind::Book, &id)?;
    let book = state.services.catalog.update_book(id, request.into_changes()?).await?;
    Ok(Json(book))
}

/// Delete a book and its borrow history
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is currently borrowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = validation::parse_path_id(EntityKind::Book, &id)?;
    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
