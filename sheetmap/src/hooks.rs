//! Transformation hooks.
//!
//! Hooks are registered explicitly by name on a [`crate::SchemaBuilder`]:
//!
//! - read hooks override one value after extraction (`values` is a snapshot
//!   of the extracted values, not of other hooks' results)
//! - the row hook sees every hook-applied value and returns keys to add or
//!   overwrite; it only runs when the row is still valid
//! - write hooks compute the value written for a column from the serialized
//!   record

use std::fmt;
use std::sync::Arc;

use crate::error::HookError;
use crate::value::{Context, Value, Values};

/// Per-field read hook.
pub type ReadHook = Arc<dyn Fn(&Values, &Context) -> Result<Value, HookError> + Send + Sync>;

/// Whole-row read hook.
pub type RowHook = Arc<dyn Fn(&Values, &Context) -> Result<Values, HookError> + Send + Sync>;

/// Per-column write hook; receives the (sub-)record being rendered.
pub type WriteHook = Arc<dyn Fn(&serde_json::Value, &Context) -> Result<Value, HookError> + Send + Sync>;

/// Name-keyed hook table of one schema.
#[derive(Clone, Default)]
pub struct Hooks {
    read: Vec<(String, ReadHook)>,
    row: Option<RowHook>,
    write: Vec<(String, WriteHook)>,
}

impl Hooks {
    pub fn set_read(&mut self, name: impl Into<String>, hook: ReadHook) {
        upsert(&mut self.read, name.into(), hook);
    }

    pub fn set_row(&mut self, hook: RowHook) {
        self.row = Some(hook);
    }

    pub fn set_write(&mut self, name: impl Into<String>, hook: WriteHook) {
        upsert(&mut self.write, name.into(), hook);
    }

    /// Read hooks in registration order.
    pub fn read(&self) -> impl Iterator<Item = (&str, &ReadHook)> {
        self.read.iter().map(|(n, h)| (n.as_str(), h))
    }

    pub fn read_hook(&self, name: &str) -> Option<&ReadHook> {
        self.read.iter().find(|(n, _)| n == name).map(|(_, h)| h)
    }

    pub fn row(&self) -> Option<&RowHook> {
        self.row.as_ref()
    }

    pub fn write_hook(&self, name: &str) -> Option<&WriteHook> {
        self.write.iter().find(|(n, _)| n == name).map(|(_, h)| h)
    }

    /// Layer `overrides` on top of `self`; same names are replaced.
    pub fn merge(&mut self, overrides: &Hooks) {
        for (name, hook) in &overrides.read {
            upsert(&mut self.read, name.clone(), hook.clone());
        }
        if let Some(row) = &overrides.row {
            self.row = Some(row.clone());
        }
        for (name, hook) in &overrides.write {
            upsert(&mut self.write, name.clone(), hook.clone());
        }
    }
}

fn upsert<H>(slots: &mut Vec<(String, H)>, name: String, hook: H) {
    match slots.iter_mut().find(|(n, _)| *n == name) {
        Some(slot) => slot.1 = hook,
        None => slots.push((name, hook)),
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("read", &self.read.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("row", &self.row.is_some())
            .field("write", &self.write.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}
