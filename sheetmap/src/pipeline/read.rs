//! Read pipeline: table rows to validated records.
//!
//! Each physical row goes through:
//!
//! ```text
//!   cells ──▶ extract + convert ──▶ field hooks ──▶ row hook ──▶ parts ──▶ fields filter
//!                 │ strict failure      │ Invalid        │ Invalid    │ Invalid
//!                 ▼                     ▼                ▼            ▼
//!             row error             row error        row error    row error (relation.*)
//! ```
//!
//! `HookError::Failed` from any hook or resolver aborts the whole batch.

use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::convert::Infallible;

use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{HookError, ReadError, ReadResult, SchemaError};
use crate::part::Part;
use crate::row::{FieldError, Row, CALLBACK_NAME, ROW_HOOK_NAME};
use crate::schema::Schema;
use crate::value::{values_to_json, Context, Value, Values};

// =============================================================================
// Record Sink
// =============================================================================

/// Persistence collaborator receiving constructed records in batches.
pub trait RecordSink<T> {
    type Error: std::error::Error + Send + Sync + 'static;

    fn insert_batch(&mut self, batch: Vec<T>) -> Result<(), Self::Error>;
}

impl<T> RecordSink<T> for Vec<T> {
    type Error = Infallible;

    fn insert_batch(&mut self, batch: Vec<T>) -> Result<(), Self::Error> {
        self.extend(batch);
        Ok(())
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Reads a materialized table through a schema.
pub struct Reader<'s> {
    schema: &'s Schema,
    table: &'s [Vec<String>],
    context: Context,
}

impl<'s> Reader<'s> {
    /// Check the schema and the table shape before any row is processed.
    pub fn new(schema: &'s Schema, table: &'s [Vec<String>]) -> ReadResult<Self> {
        if !schema.options().read_mode {
            return Err(SchemaError::ReadModeProhibited(schema.name().to_string()).into());
        }
        if !schema.has_read_columns() {
            return Err(SchemaError::NoReadColumns(schema.name().to_string()).into());
        }

        if let Some(&position) = schema.read_positions().keys().next_back() {
            let narrowest = table
                .iter()
                .enumerate()
                .map(|(row, cells)| (row, cells.len()))
                .min_by_key(|(_, width)| *width);
            if let Some((row, width)) = narrowest {
                if width <= position {
                    return Err(ReadError::ReadPositionOverflow { row, width, position });
                }
            }
        }

        Ok(Self {
            schema,
            table,
            context: Context::new(),
        })
    }

    /// External constants passed to every hook and resolver.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_constant(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key, value);
        self
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    /// Lazily process rows; stop pulling to stop early.
    pub fn rows(&self) -> impl Iterator<Item = ReadResult<Row>> + '_ {
        self.table
            .iter()
            .enumerate()
            .map(move |(number, cells)| read_row(self.schema, cells, number, &self.context))
    }

    /// Process every row.
    pub fn read(&self) -> ReadResult<ReadBatch> {
        #[cfg(feature = "parallel")]
        let rows = self
            .table
            .par_iter()
            .enumerate()
            .map(|(number, cells)| read_row(self.schema, cells, number, &self.context))
            .collect::<ReadResult<Vec<_>>>()?;

        #[cfg(not(feature = "parallel"))]
        let rows = self.rows().collect::<ReadResult<Vec<_>>>()?;

        let batch = ReadBatch { rows };
        info!(
            schema = %self.schema.name(),
            rows = batch.len(),
            invalid = batch.invalid_count(),
            "Read table"
        );
        Ok(batch)
    }
}

/// Run one physical row through a schema (recursively through its parts).
pub(crate) fn read_row(schema: &Schema, cells: &[String], number: usize, context: &Context) -> ReadResult<Row> {
    let options = schema.options();
    let mut row = Row::new(number);

    // Step 1: extract and convert
    for column in schema.read_columns() {
        let raw = column.read(cells);
        match options.string_to_typed(&raw, column.column_type()) {
            Ok(value) => row.insert(column.value_name_str(), value),
            Err(err) => row.push_error(column.value_name_str(), err.to_string(), None, column.read_position()),
        }
    }

    // Step 2: per-field hooks over the extracted snapshot
    let snapshot = row.partial_values().clone();
    let virtual_names: BTreeSet<&str> = schema
        .columns()
        .iter()
        .filter(|c| c.is_virtual())
        .map(|c| c.value_name_str())
        .collect();
    for (name, hook) in schema.hooks().read() {
        if !snapshot.contains_key(name) && !virtual_names.contains(name) {
            continue;
        }
        match hook(&snapshot, context) {
            Ok(value) => row.insert(name, value),
            Err(HookError::Invalid(err)) => {
                let position = schema
                    .columns()
                    .iter()
                    .find(|c| c.value_name_str() == name)
                    .and_then(|c| c.read_position());
                row.push_validation(name, err, position);
            }
            Err(HookError::Failed(source)) => {
                return Err(ReadError::Hook {
                    row: number,
                    name: name.to_string(),
                    source,
                })
            }
        }
    }

    // Step 3: whole-row hook, only on a still valid row
    if let Some(hook) = schema.hooks().row().filter(|_| row.is_valid()) {
        match hook(row.partial_values(), context) {
            Ok(values) => row.extend(values),
            Err(HookError::Invalid(err)) => row.push_validation(ROW_HOOK_NAME, err, None),
            Err(HookError::Failed(source)) => {
                return Err(ReadError::Hook {
                    row: number,
                    name: ROW_HOOK_NAME.to_string(),
                    source,
                })
            }
        }
    }

    // Step 4: parts
    for part in schema.parts() {
        let nested = read_part(part, cells, number, context, row.is_valid())?;
        row.combine(nested)?;
    }

    // Step 5: keep constructible fields
    if let Some(fields) = schema.fields() {
        let relations: Vec<&str> = schema.parts().iter().map(Part::relation).collect();
        row.retain(|key| fields.iter().any(|f| f == key) || relations.contains(&key));
    }

    if !row.is_valid() {
        debug!(
            schema = %schema.name(),
            row = number,
            errors = row.errors().len(),
            "Row failed validation"
        );
    }
    Ok(row)
}

/// Read a part's values and resolve them into the related entity.
///
/// The resolver only runs when both the part and its parent row are valid,
/// so no entity is created for a row that will not be constructed.
fn read_part(part: &Part, cells: &[String], number: usize, context: &Context, parent_valid: bool) -> ReadResult<Row> {
    let mut nested = read_row(part.schema(), cells, number, context)?;
    let resolved = match nested.values() {
        Some(values) if parent_valid => Some(part.resolve(values, context)),
        _ => None,
    };

    nested.retain(|_| false);
    match resolved {
        Some(Ok(entity)) => nested.insert(part.relation(), entity),
        Some(Err(HookError::Invalid(err))) => nested.push_validation(CALLBACK_NAME, err, None),
        Some(Err(HookError::Failed(source))) => {
            return Err(ReadError::Hook {
                row: number,
                name: format!("{}.{}", part.relation(), CALLBACK_NAME),
                source,
            })
        }
        None => {}
    }
    nested.namespace_errors(part.relation());
    Ok(nested)
}

// =============================================================================
// Read Batch
// =============================================================================

/// Every processed row of a table, in row order.
#[derive(Debug, Clone, Default)]
pub struct ReadBatch {
    rows: Vec<Row>,
}

impl ReadBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when no row collected an error.
    pub fn is_valid(&self) -> bool {
        self.rows.iter().all(Row::is_valid)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn valid_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|r| r.is_valid())
    }

    pub fn invalid_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|r| !r.is_valid())
    }

    pub fn invalid_count(&self) -> usize {
        self.invalid_rows().count()
    }

    /// Errors of every invalid row, in row order.
    pub fn errors(&self) -> Vec<&FieldError> {
        self.rows.iter().flat_map(|r| r.errors()).collect()
    }

    /// Construct one record per row; fails if any row is invalid.
    pub fn records<T: DeserializeOwned>(&self) -> ReadResult<Vec<T>> {
        let invalid = self.invalid_count();
        if invalid > 0 {
            return Err(ReadError::InvalidRows(invalid));
        }
        self.valid_rows().map(construct).collect()
    }

    /// Construct records for valid rows only; inspect `invalid_rows` for the rest.
    pub fn records_best_effort<T: DeserializeOwned>(&self) -> ReadResult<Vec<T>> {
        let invalid = self.invalid_count();
        if invalid > 0 {
            warn!(skipped = invalid, "Skipping invalid rows");
        }
        self.valid_rows().map(construct).collect()
    }

    /// Records grouped into chunks of `size` (at least one per chunk).
    pub fn batches<T: DeserializeOwned>(&self, size: usize, only_valid: bool) -> ReadResult<Vec<Vec<T>>> {
        let records = if only_valid {
            self.records_best_effort()?
        } else {
            self.records()?
        };
        Ok(chunk(records, size))
    }

    /// Hand records to `sink` in chunks of `size`; returns how many were inserted.
    pub fn bulk_insert<T, S>(&self, sink: &mut S, size: usize, only_valid: bool) -> ReadResult<usize>
    where
        T: DeserializeOwned,
        S: RecordSink<T>,
    {
        let mut inserted = 0;
        for batch in self.batches::<T>(size, only_valid)? {
            let count = batch.len();
            sink.insert_batch(batch).map_err(|e| ReadError::Sink(Box::new(e)))?;
            inserted += count;
        }
        info!(inserted, "Bulk insert complete");
        Ok(inserted)
    }
}

fn construct<T: DeserializeOwned>(row: &Row) -> ReadResult<T> {
    let values: &Values = row.partial_values();
    serde_json::from_value(values_to_json(values)).map_err(|source| ReadError::Construct {
        row: row.number(),
        source,
    })
}

fn chunk<T>(records: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(records.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);
    for record in records {
        current.push(record);
        if current.len() == size {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
