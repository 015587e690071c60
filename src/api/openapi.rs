//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{authors, books, borrowed_books, health, users};

/// Registers the `bearer_auth` scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bibliotheca API",
        version = "0.3.0",
        description = "Library lending REST API: catalog, availability and borrow ledger"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Borrowed books
        borrowed_books::borrow_book,
        borrowed_books::return_book,
        borrowed_books::list_for_user,
        borrowed_books::list_open,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
    ),
    components(
        schemas(
            // Borrowed books
            borrowed_books::BorrowBookRequest,
            borrowed_books::ReturnBookRequest,
            crate::models::borrowed_book::BorrowRecord,
            crate::models::borrowed_book::BorrowRecordDetails,
            // Books
            crate::models::book::Book,
            crate::models::book::BookWithAuthor,
            crate::models::book::AnnotatedBook,
            crate::models::book::OpenBorrow,
            crate::models::book::BookPage,
            crate::models::book::PageMeta,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            // Authors
            crate::models::author::Author,
            crate::models::author::AuthorWithCount,
            crate::models::author::AuthorWithBooks,
            crate::models::author::CreateAuthor,
            crate::models::author::UpdateAuthor,
            // Users
            crate::models::user::UserSummary,
            crate::models::user::CreateUser,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "borrowed-books", description = "Lending ledger"),
        (name = "books", description = "Book catalog and availability"),
        (name = "authors", description = "Author management"),
        (name = "users", description = "User directory and account creation")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
