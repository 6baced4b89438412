//! Database access layer
//!
//! Schema bootstrap plus one repository module per resource. Repository
//! functions validate their input and return [`crate::Error`], so the HTTP
//! layer only maps errors to status codes.

pub mod catalog;
pub mod comments;
pub mod init;
pub mod models;
pub mod reviews;
pub mod settings;
pub mod titles;
pub mod users;

pub use init::{init_database, init_memory_database};

/// Substring pattern for `LIKE ... ESCAPE '\'`
///
/// Wildcards typed by the user are matched literally.
pub(crate) fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
