//! Lending endpoints: borrow, return and borrow record listings

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppResult, EntityKind},
    models::borrowed_book::BorrowRecordDetails,
    validation,
};

use super::{AuthenticatedUser, ValidatedJson};

/// Borrow request
#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowBookRequest {
    /// Book to lend
    #[validate(custom(function = validation::validate_uuid))]
    pub book_id: String,
    /// Borrowing user
    #[validate(custom(function = validation::validate_uuid))]
    pub user_id: String,
}

/// Return request
#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnBookRequest {
    /// Borrow record to close
    #[validate(custom(function = validation::validate_uuid))]
    pub borrowed_book_id: String,
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrowed-books/borrow",
    tag = "borrowed-books",
    security(("bearer_auth" = [])),
    request_body = BorrowBookRequest,
    responses(
        (status = 201, description = "Book borrowed", body = BorrowRecordDetails),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Book or user not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book already borrowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<BorrowBookRequest>,
) -> AppResult<(StatusCode, Json<BorrowRecordDetails>)> {
    let book_id = validation::parse_uuid("bookId", &request.book_id)?;
    let user_id = validation::parse_uuid("userId", &request.user_id)?;
    tracing::debug!(operator = %claims.username, %book_id, %user_id, "Borrow requested");

    let record = state.services.ledger.borrow(book_id, user_id).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrowed-books/return",
    tag = "borrowed-books",
    security(("bearer_auth" = [])),
    request_body = ReturnBookRequest,
    responses(
        (status = 200, description = "Book returned", body = BorrowRecordDetails),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Borrow record not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<ReturnBookRequest>,
) -> AppResult<Json<BorrowRecordDetails>> {
    let borrow_id = validation::parse_uuid("borrowedBookId", &request.borrowed_book_id)?;
    tracing::debug!(operator = %claims.username, %borrow_id, "Return requested");

    let record = state.services.ledger.return_book(borrow_id).await?;
    Ok(Json(record))
}

/// Borrow history of a user, open and returned
#[utoipa::path(
    get,
    path = "/borrowed-books/user/{user_id}",
    tag = "borrowed-books",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's borrow records, most recent first", body = Vec<BorrowRecordDetails>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_for_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<BorrowRecordDetails>>> {
    let user_id = validation::parse_path_id(EntityKind::User, &user_id)?;
    let records = state.services.ledger.list_for_user(user_id).await?;
    Ok(Json(records))
}

/// Every book currently out
#[utoipa::path(
    get,
    path = "/borrowed-books",
    tag = "borrowed-books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Open borrow records, most recent first", body = Vec<BorrowRecordDetails>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_open(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowRecordDetails>>> {
    let records = state.services.ledger.list_all_open().await?;
    Ok(Json(records))
}
