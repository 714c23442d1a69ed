//! # Sheetmap - Declarative mapping between string tables and records
//!
//! Sheetmap reads rows of a CSV/TSV table into validated records and renders
//! records back into rows, driven by a declarative [`Schema`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / TSV   │────▶│   Table     │────▶│   Reader    │────▶│  Records    │
//! │   bytes     │◀────│ (csv, enc)  │◀────│   Writer    │◀────│  (serde)    │
//! └─────────────┘     └─────────────┘     └──────┬──────┘     └─────────────┘
//!                                                │ borrows
//!                                         ┌──────▼──────┐
//!                                         │   Schema    │  columns, parts,
//!                                         │ (immutable) │  options, hooks
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sheetmap::{Column, ColumnType, Reader, Schema};
//!
//! #[derive(serde::Deserialize)]
//! struct Book { title: String, price: Option<i64> }
//!
//! let schema = Schema::builder("book")
//!     .column(Column::attribute("title").index(0))
//!     .column(Column::attribute("price").index(1).ty(ColumnType::Int))
//!     .build()?;
//!
//! let table = vec![vec!["Dune".to_string(), "10".to_string()]];
//! let batch = Reader::new(&schema, &table)?.read()?;
//! let books: Vec<Book> = batch.records()?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`value`] - Typed values, column types, hook context
//! - [`options`] - Schema options
//! - [`convert`] - String <-> typed conversion rules
//! - [`column`] - Column descriptors
//! - [`hooks`] - Read/row/write hook tables
//! - [`schema`] - Schema composition, auto-assignment and validation
//! - [`part`] - Nested schemas for related entities
//! - [`row`] - Per-row values and errors, positional rendering
//! - [`pipeline`] - Read and write pipelines
//! - [`definition`] - JSON schema definitions
//! - [`table`] - CSV/TSV reader and writer collaborators

// Core modules
pub mod error;
pub mod value;

// Configuration
pub mod convert;
pub mod options;

// Schema model
pub mod column;
pub mod hooks;
pub mod part;
pub mod schema;

// Processing
pub mod pipeline;
pub mod row;

// Declarative definitions
pub mod definition;

// Collaborators
pub mod table;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConversionError,
    Error,
    HookError,
    ReadError,
    ReadResult,
    SchemaError,
    SchemaResult,
    TableError,
    TableResult,
    ValidationError,
    WriteError,
    WriteResult,
};

// =============================================================================
// Re-exports - Values and options
// =============================================================================

pub use options::{BlankFill, Options};
pub use value::{values_to_json, ColumnType, Context, Value, Values};

// =============================================================================
// Re-exports - Schema model
// =============================================================================

pub use column::{Column, ColumnKind};
pub use hooks::{Hooks, ReadHook, RowHook, WriteHook};
pub use part::{CallbackMode, EmbedResolver, Part, Resolver};
pub use schema::{compose, Schema, SchemaBuilder};

// =============================================================================
// Re-exports - Pipelines
// =============================================================================

pub use pipeline::{ReadBatch, Reader, RecordSink, Writer};
pub use row::{render_row, FieldError, Row};

// =============================================================================
// Re-exports - Definitions and tables
// =============================================================================

pub use definition::{ColumnDefinition, PartDefinition, SchemaDefinition};
pub use table::{ParsedTable, TableFormat, TableReader, TableWriter};
