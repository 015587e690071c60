//! Error types for Bibliotheca server

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthenticated = 2,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchBook = 5,
    NoSuchAuthor = 6,
    NoSuchBorrowRecord = 7,
    BookAlreadyBorrowed = 8,
    BookAlreadyReturned = 9,
    BookHasOpenBorrow = 10,
    AuthorHasBooks = 11,
    UserExists = 12,
    BadValue = 18,
}

/// Kind of entity a lookup failed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Author,
    Book,
    User,
    BorrowRecord,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Author => "Author",
            EntityKind::Book => "Book",
            EntityKind::User => "User",
            EntityKind::BorrowRecord => "Borrowed book",
        };
        f.write_str(name)
    }
}

/// Business rule that made a write conflict with the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    AlreadyBorrowed,
    AlreadyReturned,
    BookHasOpenBorrow,
    AuthorHasBooks,
    UserExists,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ConflictReason::AlreadyBorrowed => "This book is already borrowed",
            ConflictReason::AlreadyReturned => "This book has already been returned",
            ConflictReason::BookHasOpenBorrow => "This book is currently borrowed and cannot be deleted",
            ConflictReason::AuthorHasBooks => "This author still has books in the catalog",
            ConflictReason::UserExists => "A user with this username or email already exists",
        };
        f.write_str(message)
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("{0} with ID {1} not found")]
    NotFound(EntityKind, String),

    #[error("Validation error on {field}: {rule}")]
    Validation { field: String, rule: String },

    #[error("Conflict: {0}")]
    Conflict(ConflictReason),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        AppError::NotFound(kind, id.to_string())
    }

    pub fn validation(field: impl Into<String>, rule: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            rule: rule.into(),
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthenticated),
            AppError::NotFound(kind, _) => {
                let code = match kind {
                    EntityKind::Author => ErrorCode::NoSuchAuthor,
                    EntityKind::Book => ErrorCode::NoSuchBook,
                    EntityKind::User => ErrorCode::NoSuchUser,
                    EntityKind::BorrowRecord => ErrorCode::NoSuchBorrowRecord,
                };
                (StatusCode::NOT_FOUND, code)
            }
            AppError::Validation { .. } => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::Conflict(reason) => {
                let code = match reason {
                    ConflictReason::AlreadyBorrowed => ErrorCode::BookAlreadyBorrowed,
                    ConflictReason::AlreadyReturned => ErrorCode::BookAlreadyReturned,
                    ConflictReason::BookHasOpenBorrow => ErrorCode::BookHasOpenBorrow,
                    ConflictReason::AuthorHasBooks => ErrorCode::AuthorHasBooks,
                    ConflictReason::UserExists => ErrorCode::UserExists,
                };
                (StatusCode::CONFLICT, code)
            }
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Authentication(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
