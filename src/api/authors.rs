//! Author endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{AppResult, EntityKind},
    models::author::{Author, AuthorWithBooks, AuthorWithCount, CreateAuthor, UpdateAuthor},
    validation,
};

use super::{AuthenticatedUser, ValidatedJson};

/// List authors, newest first
#[utoipa::path(
    get,
    path = "/authors",
    tag = "authors",
    responses(
        (status = 200, description = "All authors with their book counts", body = Vec<AuthorWithCount>)
    )
)]
pub async fn list_authors(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<AuthorWithCount>>> {
    let authors = state.services.authors.list().await?;
    Ok(Json(authors))
}

/// Get an author with their books
#[utoipa::path(
    get,
    path = "/authors/{id}",
    tag = "authors",
    params(
        ("id" = String, Path, description = "Author ID")
    ),
    responses(
        (status = 200, description = "Author details", body = AuthorWithBooks),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_author(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<AuthorWithBooks>> {
    let id = validation::parse_path_id(EntityKind::Author, &id)?;
    let author = state.services.authors.get(id).await?;
    Ok(Json(author))
}

/// Create an author
#[utoipa::path(
    post,
    path = "/authors",
    tag = "authors",
    security(("bearer_auth" = [])),
    request_body = CreateAuthor,
    responses(
        (status = 201, description = "Author created", body = Author),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<CreateAuthor>,
) -> AppResult<(StatusCode, Json<Author>)> {
    let author = state.services.authors.create(request).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

/// Update an author
#[utoipa::path(
    patch,
    path = "/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Author ID")
    ),
    request_body = UpdateAuthor,
    responses(
        (status = 200, description = "Author updated", body = Author),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateAuthor>,
) -> AppResult<Json<Author>> {
    let id = validation::parse_path_id(EntityKind::Author, &id)?;
    let author = state.services.authors.update(id, request).await?;
    Ok(Json(author))
}

/// Delete an author without books
#[utoipa::path(
    delete,
    path = "/authors/{id}",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Author ID")
    ),
    responses(
        (status = 204, description = "Author deleted"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Author still has books", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = validation::parse_path_id(EntityKind::Author, &id)?;
    state.services.authors.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
