//! Per-record accumulator of values and errors, and positional rendering.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{ReadError, ReadResult, ValidationError};
use crate::options::BlankFill;
use crate::value::{Value, Values};

/// Name under which whole-row hook failures are recorded.
pub const ROW_HOOK_NAME: &str = "__row__";

/// Name under which part resolver failures are recorded.
pub const CALLBACK_NAME: &str = "__callback__";

/// One structured error collected while processing a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Value name of the failing field (namespaced for parts: `publisher.name`).
    pub name: String,
    pub message: String,
    /// Ordinal of the physical row.
    pub row: usize,
    pub label: Option<String>,
    /// Read position of the originating column.
    pub position: Option<usize>,
}

/// A row being read: converted values plus collected errors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    number: usize,
    values: Values,
    errors: Vec<FieldError>,
}

impl Row {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            values: Values::new(),
            errors: Vec::new(),
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Valid iff no error was collected.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Values of a valid row; `None` once any error was collected.
    pub fn values(&self) -> Option<&Values> {
        self.is_valid().then_some(&self.values)
    }

    pub fn into_values(self) -> Option<Values> {
        if self.is_valid() {
            Some(self.values)
        } else {
            None
        }
    }

    /// Values regardless of validity, for reporting.
    pub fn partial_values(&self) -> &Values {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn extend(&mut self, values: Values) {
        self.values.extend(values);
    }

    pub fn push_error(
        &mut self,
        name: impl Into<String>,
        message: impl Into<String>,
        label: Option<String>,
        position: Option<usize>,
    ) {
        self.errors.push(FieldError {
            name: name.into(),
            message: message.into(),
            row: self.number,
            label,
            position,
        });
    }

    /// Record a hook's validation failure, falling back to `position` when
    /// the hook did not name one.
    pub fn push_validation(&mut self, name: impl Into<String>, err: ValidationError, position: Option<usize>) {
        let position = err.position.or(position);
        self.push_error(name, err.message, err.label, position);
    }

    /// Prefix every error name with `namespace.`.
    pub fn namespace_errors(&mut self, namespace: &str) {
        for err in &mut self.errors {
            err.name = format!("{}.{}", namespace, err.name);
        }
    }

    /// Keep only the values whose name satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.values.retain(|name, _| keep(name));
    }

    /// Union values and concatenate errors of a row with the same ordinal.
    pub fn combine(&mut self, other: Row) -> ReadResult<()> {
        if self.number != other.number {
            return Err(ReadError::RowMismatch {
                left: self.number,
                right: other.number,
            });
        }
        self.values.extend(other.values);
        self.errors.extend(other.errors);
        Ok(())
    }
}

/// Render a sparse position map into a dense row.
///
/// With [`BlankFill::Empty`] the row covers `0..=max_position` and gaps are
/// empty strings; with [`BlankFill::Omit`] gaps are left out.
pub fn render_row(cells: BTreeMap<usize, String>, fill: BlankFill) -> Vec<String> {
    match fill {
        BlankFill::Omit => cells.into_values().collect(),
        BlankFill::Empty => {
            let width = cells.keys().next_back().map_or(0, |max| max + 1);
            let mut row = vec![String::new(); width];
            for (position, cell) in cells {
                row[position] = cell;
            }
            row
        }
    }
}
