//! Error types for the transfer engine.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for transfer operations.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Bad job parameters, caught before any I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A database could not be reached.
    #[error("Connection error for database '{database}': {message}")]
    Connection { database: String, message: String },

    /// Schema introspection or DDL failure.
    #[error("Schema error for table '{table}': {message}")]
    Schema { table: String, message: String },

    /// Extraction failure mid-scan.
    #[error("Read error for table '{table}': {message}")]
    Read { table: String, message: String },

    /// Upsert failure after the single retry.
    #[error("Write error for table '{table}': {message}")]
    Write { table: String, message: String },

    /// Status query for an unknown job id.
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    /// Transfer was cancelled between batches.
    #[error("Transfer cancelled")]
    Cancelled,

    /// IO error (file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransferError {
    /// Create a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        TransferError::Validation(message.into())
    }

    /// Create a Connection error for a named database.
    pub fn connection(database: impl Into<String>, message: impl ToString) -> Self {
        TransferError::Connection {
            database: database.into(),
            message: message.to_string(),
        }
    }

    /// Create a Schema error for a table.
    pub fn schema(table: impl Into<String>, message: impl ToString) -> Self {
        TransferError::Schema {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Read error for a table.
    pub fn read(table: impl Into<String>, message: impl ToString) -> Self {
        TransferError::Read {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Write error for a table.
    pub fn write(table: impl Into<String>, message: impl ToString) -> Self {
        TransferError::Write {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;
