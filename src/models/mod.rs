//! Data models for Bibliotheca

pub mod author;
pub mod book;
pub mod borrowed_book;
pub mod user;

// Re-export commonly used types
pub use author::Author;
pub use book::{AnnotatedBook, Book, BookFilter, BookPage, BookWithAuthor};
pub use borrowed_book::{BorrowRecord, BorrowRecordDetails};
pub use user::{User, UserSummary};
