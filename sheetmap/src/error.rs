//! Error types for the sheetmap engine.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`SchemaError`] - Fatal schema-build / pipeline-construction errors
//! - [`ConversionError`] - A single cell that failed str <-> typed conversion
//! - [`ValidationError`] - Raised on purpose by user hooks, captured per row
//! - [`HookError`] - What a hook returns: a validation failure or a real bug
//! - [`ReadError`] - Read pipeline errors
//! - [`WriteError`] - Write pipeline errors
//! - [`TableError`] - Table reader/writer collaborator errors
//! - [`Error`] - Top-level wrapper
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::value::ColumnType;

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors raised while building a schema or constructing a pipeline.
///
/// These are never recoverable and surface before any row is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// An option key that the engine does not recognize.
    #[error("Unknown option `{0}`")]
    UnknownOption(String),

    /// A recognized option with a malformed value.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// A column reads from the table but has no read position.
    #[error("Column `{column}` reads a value but has no read position. Set `index` or `r_index`, or disable reading")]
    MissingReadPosition { column: String },

    /// A column writes to the table but has no write position.
    #[error("Column `{column}` writes a value but has no write position. Set `index` or `w_index`, or disable writing")]
    MissingWritePosition { column: String },

    /// Two or more columns claim the same read position.
    #[error("Read positions must be unique. Duplicate positions: {positions:?} (columns: {columns:?})")]
    DuplicateReadPositions {
        positions: Vec<usize>,
        columns: Vec<String>,
    },

    /// Two or more columns claim the same write position.
    #[error("Write positions must be unique. Duplicate positions: {positions:?} (columns: {columns:?})")]
    DuplicateWritePositions {
        positions: Vec<usize>,
        columns: Vec<String>,
    },

    /// Two or more read columns share a value name.
    #[error("Value names must be unique. {0:?} are duplicate")]
    DuplicateValueNames(Vec<String>),

    /// A read pipeline was requested on a schema without read columns.
    #[error("Schema `{0}` needs at least one read column")]
    NoReadColumns(String),

    /// A write pipeline was requested on a schema without write columns.
    #[error("Schema `{0}` needs at least one write column")]
    NoWriteColumns(String),

    /// Read mode is disabled by options.
    #[error("Read mode is prohibited for schema `{0}`")]
    ReadModeProhibited(String),

    /// Write mode is disabled by options.
    #[error("Write mode is prohibited for schema `{0}`")]
    WriteModeProhibited(String),

    /// No column with that name.
    #[error("Unknown column `{0}`")]
    UnknownColumn(String),

    /// `set_static_column` on a column that is not static.
    #[error("`{0}` is not a static column")]
    NotStatic(String),

    /// A column that neither reads nor writes needs a value name and a hook.
    #[error("Column `{column}` touches no cell; it needs an explicit value name and a read hook")]
    VirtualColumnWithoutHook { column: String },

    /// A declarative schema definition that cannot be turned into a schema.
    #[error("Invalid schema definition: {0}")]
    InvalidDefinition(String),

    /// Relation attribute columns look up one attribute on the related record.
    #[error("`{path}` is an invalid attribute path for relation column `{column}`; nested paths are not allowed")]
    NestedRelationPath { column: String, path: String },
}

// =============================================================================
// Conversion Errors
// =============================================================================

/// A value that could not be converted between its string and typed form.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot convert `{value}` to {target}: {message}")]
pub struct ConversionError {
    pub value: String,
    pub target: ColumnType,
    pub message: String,
}

impl ConversionError {
    pub fn new(value: impl Into<String>, target: ColumnType, message: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            target,
            message: message.into(),
        }
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// A validation failure raised intentionally by a user hook.
///
/// Always captured as a row error; never aborts a batch.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    /// User-facing label (e.g. the column header shown in an upload form).
    pub label: Option<String>,
    /// Originating column position, when the hook knows it.
    pub position: Option<usize>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            label: None,
            position: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

// =============================================================================
// Hook Errors
// =============================================================================

/// Error returned by user hooks and part resolvers.
#[derive(Debug, Error)]
pub enum HookError {
    /// Bad data in the row. Captured as a row error.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Anything else. A hook bug is not row-local data, so it aborts the batch.
    #[error("{0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HookError {
    /// Shortcut for `HookError::Invalid(ValidationError::new(message))`.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(ValidationError::new(message))
    }

    /// Wrap an arbitrary error as a batch-aborting failure.
    pub fn failed(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Failed(err.into())
    }
}

// =============================================================================
// Read Errors
// =============================================================================

/// Errors of the read pipeline.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Schema error detected while constructing the reader.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The narrowest row is shorter than the highest read position.
    #[error("Column count {width} of row {row} does not cover read position {position}")]
    ReadPositionOverflow {
        row: usize,
        width: usize,
        position: usize,
    },

    /// A hook raised something other than a validation error.
    #[error("Hook `{name}` failed on row {row}: {source}")]
    Hook {
        row: usize,
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Strict construction was requested but some rows are invalid.
    #[error("{0} rows failed validation")]
    InvalidRows(usize),

    /// A valid row could not be deserialized into the record type.
    #[error("Cannot construct record from row {row}: {source}")]
    Construct {
        row: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Two rows with different ordinals cannot be combined.
    #[error("Cannot combine row {left} with row {right}")]
    RowMismatch { left: usize, right: usize },

    /// The record sink rejected a batch.
    #[error("Record sink failed: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}

// =============================================================================
// Write Errors
// =============================================================================

/// Errors of the write pipeline. All of them abort the batch.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Schema error detected while constructing the writer.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A typed value could not be rendered for its column.
    #[error("Conversion error in column `{column}`: {source}")]
    Conversion {
        column: String,
        #[source]
        source: ConversionError,
    },

    /// An attribute path did not resolve on the record.
    #[error("Attribute `{path}` not found on record")]
    MissingAttribute { path: String },

    /// The related object of a part is missing or not an object.
    #[error("Relation `{relation}`: {message}")]
    Relation { relation: String, message: String },

    /// The record could not be serialized.
    #[error("Cannot serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A write hook or callback failed.
    #[error("Write hook `{name}` failed: {source}")]
    Hook {
        name: String,
        #[source]
        source: HookError,
    },
}

// =============================================================================
// Table Errors
// =============================================================================

/// Errors from the table reader/writer collaborator.
#[derive(Debug, Error)]
pub enum TableError {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode bytes.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Malformed CSV/TSV.
    #[error("Invalid table format: {0}")]
    Csv(#[from] csv::Error),

    /// File extension without a reader/writer.
    #[error("`{0}` is not a supported table format")]
    UnsupportedFormat(String),
}

// =============================================================================
// Top-level Error
// =============================================================================

/// Top-level error wrapping every lower-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for the read pipeline.
pub type ReadResult<T> = Result<T, ReadError>;

/// Result type for the write pipeline.
pub type WriteResult<T> = Result<T, WriteError>;

/// Result type for table collaborators.
pub type TableResult<T> = Result<T, TableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let schema_err = SchemaError::UnknownColumn("title".into());
        let read_err: ReadError = schema_err.clone().into();
        assert!(read_err.to_string().contains("title"));

        let top: Error = read_err.into();
        assert!(top.to_string().contains("title"));

        let write_err: WriteError = schema_err.into();
        assert!(write_err.to_string().contains("Unknown column"));
    }

    #[test]
    fn test_duplicate_position_message_lists_offenders() {
        let err = SchemaError::DuplicateReadPositions {
            positions: vec![1],
            columns: vec!["a".into(), "b".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("[1]"));
        assert!(msg.contains("\"a\""));
        assert!(msg.contains("\"b\""));
    }

    #[test]
    fn test_validation_error_builders() {
        let err = ValidationError::new("must be positive")
            .with_label("Price")
            .with_position(3);
        assert_eq!(err.to_string(), "must be positive");
        assert_eq!(err.label.as_deref(), Some("Price"));
        assert_eq!(err.position, Some(3));
    }

    #[test]
    fn test_hook_error_invalid_is_transparent() {
        let err = HookError::invalid("bad title");
        assert_eq!(err.to_string(), "bad title");
        assert!(matches!(err, HookError::Invalid(_)));
    }
}
