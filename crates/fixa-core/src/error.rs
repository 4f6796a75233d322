//! Error types for Fixa

use thiserror::Error;

/// Core error type for fixture operations
#[derive(Error, Debug)]
pub enum FixaError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Foreign keys form a cycle with no entry point.
    #[error("Circular reference: {0}")]
    Cycle(String),

    /// A fixture cell could not be coerced to its column type.
    #[error(
        "{reason}. tableName = [{table}]:rowNo = [{row}]:columnName = [{column}]:value = [{value}]"
    )]
    Conversion {
        table: String,
        /// 1-based row number
        row: usize,
        column: String,
        value: String,
        reason: String,
    },

    /// Metadata lookup for a table failed.
    #[error("{message} table=[{table}]")]
    Metadata {
        table: String,
        message: String,
        #[source]
        source: Box<FixaError>,
    },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl FixaError {
    /// Wrap a lower-level failure with the table it was raised for.
    pub fn metadata(table: impl Into<String>, message: impl Into<String>, source: FixaError) -> Self {
        FixaError::Metadata {
            table: table.into(),
            message: message.into(),
            source: Box::new(source),
        }
    }
}

/// Result type alias for Fixa operations
pub type Result<T> = std::result::Result<T, FixaError>;
