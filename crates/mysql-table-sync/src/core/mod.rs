//! Core types shared across the transfer engine.
//!
//! - [`schema`]: table and column metadata read from the source catalog
//! - [`value`]: database-agnostic row value representation

pub mod schema;
pub mod value;

pub use schema::{ColumnDefinition, TableSchema};
pub use value::{RowBatch, SqlNullType, SqlValue};

/// Quote a MySQL identifier.
///
/// Backticks inside the name are doubled, which prevents injection via
/// table or column names picked up from the catalog.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("name"), "`name`");
        assert_eq!(quote_ident("table`name"), "`table``name`");
        assert_eq!(quote_ident("Users"), "`Users`");
    }

    #[test]
    fn test_quote_ident_injection_attempt() {
        assert_eq!(
            quote_ident("t`; DROP TABLE users; --"),
            "`t``; DROP TABLE users; --`"
        );
    }
}
