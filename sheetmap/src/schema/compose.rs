//! Schema composition and automatic position assignment.
//!
//! Composition layers column lists, part lists and hook tables keyed by name:
//!
//! ```text
//!   base A: [id, title]          base B: [title*, price]        own: [price*, note]
//!                       \                  |                   /
//!                        ▼                 ▼                  ▼
//!                    merged: [id, title*, price*, note]
//! ```
//!
//! A later layer replaces a same-named entry of an earlier one in place, so
//! declaration order is the order of first appearance and the most specific
//! definition wins.

use std::collections::BTreeSet;

use crate::column::Column;
use crate::error::SchemaResult;
use crate::part::Part;
use crate::schema::{Schema, SchemaBuilder};

/// Merge ordered layers by key, most-specific-last-wins.
pub(crate) fn merge_by_name<T, K>(layers: impl IntoIterator<Item = Vec<T>>, key: K) -> Vec<T>
where
    K: Fn(&T) -> &str,
{
    let mut merged: Vec<T> = Vec::new();
    for layer in layers {
        for item in layer {
            match merged.iter().position(|existing| key(existing) == key(&item)) {
                Some(idx) => merged[idx] = item,
                None => merged.push(item),
            }
        }
    }
    merged
}

pub(crate) fn merge_columns(layers: impl IntoIterator<Item = Vec<Column>>) -> Vec<Column> {
    merge_by_name(layers, |c: &Column| c.name())
}

pub(crate) fn merge_parts(layers: impl IntoIterator<Item = Vec<Part>>) -> Vec<Part> {
    merge_by_name(layers, |p: &Part| p.relation())
}

/// Compose `bases` (least specific first) with `own` columns into one schema.
pub fn compose(name: impl Into<String>, bases: &[&Schema], own: Vec<Column>) -> SchemaResult<Schema> {
    let builder = bases
        .iter()
        .fold(SchemaBuilder::new(name), |builder, base| builder.extend(base));
    own.into_iter()
        .fold(builder, |builder, column| builder.column(column))
        .build()
}

// =============================================================================
// Auto-assignment
// =============================================================================

/// First-fit allocator over the non-negative integers.
struct FirstFit {
    claimed: BTreeSet<usize>,
    next: usize,
}

impl FirstFit {
    fn new(claimed: BTreeSet<usize>) -> Self {
        Self { claimed, next: 0 }
    }

    fn take(&mut self) -> usize {
        while self.claimed.contains(&self.next) {
            self.next += 1;
        }
        let position = self.next;
        self.claimed.insert(position);
        self.next += 1;
        position
    }
}

/// Assign the lowest free positions to columns declared without one.
///
/// Runs over the whole tree (own columns, then each part's, recursively) in
/// declaration order. Read and write positions are assigned independently;
/// declared positions are never touched.
pub(crate) fn assign_positions(schema: &mut Schema) {
    let mut read_claimed = BTreeSet::new();
    let mut write_claimed = BTreeSet::new();
    schema.visit(&mut |column| {
        read_claimed.extend(column.declared_read_position());
        write_claimed.extend(column.declared_write_position());
    });

    let mut reads = FirstFit::new(read_claimed);
    let mut writes = FirstFit::new(write_claimed);
    schema.visit_mut(&mut |column| {
        if column.needs_read_position() {
            column.assign_read_position(reads.take());
        }
        if column.needs_write_position() {
            column.assign_write_position(writes.take());
        }
    });
}
