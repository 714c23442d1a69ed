//! Column descriptors.
//!
//! A [`Column`] maps one logical field to a read position and/or a write
//! position, with a target [`ColumnType`]. Three kinds exist:
//!
//! | Kind        | Read                    | Write                              |
//! |-------------|-------------------------|------------------------------------|
//! | `Attribute` | cell at read position   | attribute path looked up on record |
//! | `Static`    | the constant            | the constant                       |
//! | `Method`    | cell at read position   | "no value" unless a hook is set    |
//!
//! Columns of a part's schema are relation columns: the fourth variant,
//! sharing the same position and effect machinery.

use std::fmt;
use std::sync::Arc;

use crate::error::{HookError, SchemaError, SchemaResult, WriteError, WriteResult};
use crate::hooks::WriteHook;
use crate::value::{ColumnType, Context, Value};

/// Separator of nested attribute paths (`publisher.name`).
pub const PATH_SEPARATOR: char = '.';

/// What a column reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    /// Looks up `path` (default: the column name) on the record when writing.
    Attribute { path: Option<String> },
    /// Always answers `value`.
    Static { value: Value },
    /// Reads a cell; writes through a hook.
    Method,
}

/// One column of a schema.
#[derive(Clone)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    ty: ColumnType,
    header: Option<String>,
    value_name: Option<String>,
    hook_key: Option<String>,
    reads: bool,
    writes: bool,
    /// Positions as declared by the user.
    declared_r_index: Option<usize>,
    declared_w_index: Option<usize>,
    /// Positions after auto-assignment.
    r_index: Option<usize>,
    w_index: Option<usize>,
    is_relation: bool,
    on_write: Option<WriteHook>,
}

impl Column {
    fn with_kind(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ty: ColumnType::Str,
            header: None,
            value_name: None,
            hook_key: None,
            reads: true,
            writes: true,
            declared_r_index: None,
            declared_w_index: None,
            r_index: None,
            w_index: None,
            is_relation: false,
            on_write: None,
        }
    }

    /// Column whose written value is the record attribute of the same name.
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Attribute { path: None })
    }

    /// Column that always answers `value`.
    pub fn constant(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_kind(name, ColumnKind::Static { value: value.into() })
    }

    /// Column whose written value comes from a write hook.
    pub fn method(name: impl Into<String>) -> Self {
        Self::with_kind(name, ColumnKind::Method)
    }

    /// Column with a write callback; the callback wins over every hook.
    pub fn computed<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&serde_json::Value, &Context) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        Self::method(name).on_write(callback)
    }

    // =========================================================================
    // Builder setters
    // =========================================================================

    /// Set both read and write positions.
    pub fn index(mut self, index: usize) -> Self {
        self.declared_r_index = Some(index);
        self.declared_w_index = Some(index);
        self.r_index = Some(index);
        self.w_index = Some(index);
        self
    }

    pub fn r_index(mut self, index: usize) -> Self {
        self.declared_r_index = Some(index);
        self.r_index = Some(index);
        self
    }

    pub fn w_index(mut self, index: usize) -> Self {
        self.declared_w_index = Some(index);
        self.w_index = Some(index);
        self
    }

    /// Enable or disable the read effect.
    pub fn reads(mut self, enabled: bool) -> Self {
        self.reads = enabled;
        self
    }

    /// Enable or disable the write effect.
    pub fn writes(mut self, enabled: bool) -> Self {
        self.writes = enabled;
        self
    }

    pub fn ty(mut self, ty: ColumnType) -> Self {
        self.ty = ty;
        self
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Key of the read value in the row's value map.
    pub fn value_name(mut self, name: impl Into<String>) -> Self {
        self.value_name = Some(name.into());
        self
    }

    /// Name of the write hook computing this column.
    pub fn hook_key(mut self, key: impl Into<String>) -> Self {
        self.hook_key = Some(key.into());
        self
    }

    /// Attribute path looked up on the record; only meaningful for attribute columns.
    pub fn attr(mut self, path: impl Into<String>) -> Self {
        if let ColumnKind::Attribute { path: slot } = &mut self.kind {
            *slot = Some(path.into());
        }
        self
    }

    pub fn on_write<F>(mut self, callback: F) -> Self
    where
        F: Fn(&serde_json::Value, &Context) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        self.on_write = Some(Arc::new(callback));
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    pub fn column_type(&self) -> ColumnType {
        self.ty
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind, ColumnKind::Static { .. })
    }

    pub fn is_relation(&self) -> bool {
        self.is_relation
    }

    pub fn has_read_effect(&self) -> bool {
        self.reads
    }

    pub fn has_write_effect(&self) -> bool {
        self.writes
    }

    /// Neither reads nor writes; only feeds a read hook.
    pub fn is_virtual(&self) -> bool {
        !self.reads && !self.writes
    }

    pub fn has_callback(&self) -> bool {
        self.on_write.is_some()
    }

    pub(crate) fn callback(&self) -> Option<&WriteHook> {
        self.on_write.as_ref()
    }

    pub fn header_label(&self) -> &str {
        self.header.as_deref().unwrap_or(&self.name)
    }

    /// Attribute path for writing (attribute columns only).
    pub fn attr_path(&self) -> Option<&str> {
        match &self.kind {
            ColumnKind::Attribute { path } => Some(path.as_deref().unwrap_or(&self.name)),
            _ => None,
        }
    }

    /// Key of this column's value in the row's value map.
    ///
    /// Relation attribute columns default to their attribute name, so the
    /// related record is built from its own field names.
    pub fn value_name_str(&self) -> &str {
        if let Some(name) = &self.value_name {
            return name;
        }
        match (&self.kind, self.is_relation) {
            (ColumnKind::Attribute { path: Some(path) }, true) => path,
            _ => &self.name,
        }
    }

    pub fn has_explicit_value_name(&self) -> bool {
        self.value_name.is_some()
    }

    /// Name of the write hook consulted for this column.
    pub fn hook_key_str(&self) -> &str {
        match &self.hook_key {
            Some(key) => key,
            None => self.value_name_str(),
        }
    }

    /// Read position, `None` when the column does not read from the table.
    pub fn read_position(&self) -> Option<usize> {
        if self.reads {
            self.r_index
        } else {
            None
        }
    }

    /// Write position, `None` when the column does not write.
    pub fn write_position(&self) -> Option<usize> {
        if self.writes {
            self.w_index
        } else {
            None
        }
    }

    /// Read position as declared, before auto-assignment.
    pub fn declared_read_position(&self) -> Option<usize> {
        if self.reads {
            self.declared_r_index
        } else {
            None
        }
    }

    /// Write position as declared, before auto-assignment.
    pub fn declared_write_position(&self) -> Option<usize> {
        if self.writes {
            self.declared_w_index
        } else {
            None
        }
    }

    /// Reads a value: a cell at its read position, or its constant.
    pub fn is_read_eligible(&self) -> bool {
        self.reads && (self.is_static() || self.r_index.is_some())
    }

    /// Contributes a cell to rendered rows.
    pub fn is_write_eligible(&self) -> bool {
        self.writes && self.w_index.is_some()
    }

    /// Takes part in read-position assignment.
    pub(crate) fn needs_read_position(&self) -> bool {
        self.reads && !self.is_static() && self.declared_r_index.is_none()
    }

    /// Takes part in write-position assignment.
    pub(crate) fn needs_write_position(&self) -> bool {
        self.writes && self.declared_w_index.is_none()
    }

    // =========================================================================
    // Mutation by the owning schema
    // =========================================================================

    pub(crate) fn assign_read_position(&mut self, position: usize) {
        self.r_index = Some(position);
    }

    pub(crate) fn assign_write_position(&mut self, position: usize) {
        self.w_index = Some(position);
    }

    /// Drop assigned positions, keeping declared ones.
    pub(crate) fn reset_positions(&mut self) {
        self.r_index = self.declared_r_index;
        self.w_index = self.declared_w_index;
    }

    pub(crate) fn mark_relation(&mut self) {
        self.is_relation = true;
    }

    pub(crate) fn set_static_value(&mut self, value: Value) -> SchemaResult<()> {
        match &mut self.kind {
            ColumnKind::Static { value: slot } => {
                *slot = value;
                Ok(())
            }
            _ => Err(SchemaError::NotStatic(self.name.clone())),
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// A reading column needs a read position, unless it is static.
    pub fn validate_for_read(&self) -> SchemaResult<()> {
        if self.reads && !self.is_static() && self.r_index.is_none() {
            return Err(SchemaError::MissingReadPosition {
                column: self.name.clone(),
            });
        }
        if self.is_relation {
            if let Some(path) = self.attr_path() {
                if path.contains(PATH_SEPARATOR) {
                    return Err(SchemaError::NestedRelationPath {
                        column: self.name.clone(),
                        path: path.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// A writing column needs a write position, static or not.
    pub fn validate_for_write(&self) -> SchemaResult<()> {
        if self.writes && self.w_index.is_none() {
            return Err(SchemaError::MissingWritePosition {
                column: self.name.clone(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    /// Raw value for reading: the constant, or the cell at the read position.
    pub fn read(&self, row: &[String]) -> Value {
        match (&self.kind, self.read_position()) {
            (ColumnKind::Static { value }, _) => value.clone(),
            (_, Some(position)) => Value::Str(row.get(position).cloned().unwrap_or_default()),
            (_, None) => Value::Null,
        }
    }

    /// Default typed value for writing, without hooks.
    pub fn write(&self, record: &serde_json::Value) -> WriteResult<Value> {
        match &self.kind {
            ColumnKind::Static { value } => Ok(value.clone()),
            ColumnKind::Method => Ok(Value::Null),
            ColumnKind::Attribute { .. } => {
                let path = self.attr_path().unwrap_or(&self.name);
                let found = lookup(record, path).ok_or_else(|| WriteError::MissingAttribute {
                    path: path.to_string(),
                })?;
                Value::from_json(found, self.ty).map_err(|source| WriteError::Conversion {
                    column: self.name.clone(),
                    source,
                })
            }
        }
    }
}

/// Follow a dotted attribute path through nested objects.
pub fn lookup<'a>(record: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split(PATH_SEPARATOR)
        .try_fold(record, |current, segment| current.as_object()?.get(segment))
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("ty", &self.ty)
            .field("r_index", &self.read_position())
            .field("w_index", &self.write_position())
            .field("is_relation", &self.is_relation)
            .field("has_callback", &self.has_callback())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_sets_both_positions() {
        let col = Column::attribute("title").index(2);
        assert_eq!(col.read_position(), Some(2));
        assert_eq!(col.write_position(), Some(2));

        let col = Column::attribute("title").index(2).w_index(5);
        assert_eq!(col.read_position(), Some(2));
        assert_eq!(col.write_position(), Some(5));
    }

    #[test]
    fn test_disabled_effects_hide_positions() {
        let col = Column::attribute("title").index(1).reads(false);
        assert_eq!(col.read_position(), None);
        assert_eq!(col.write_position(), Some(1));
        assert!(!col.is_read_eligible());
        assert!(col.is_write_eligible());
    }

    #[test]
    fn test_validate_for_read() {
        let err = Column::method("v").validate_for_read().unwrap_err();
        assert_eq!(err, SchemaError::MissingReadPosition { column: "v".into() });

        assert!(Column::method("v").reads(false).validate_for_read().is_ok());
        assert!(Column::constant("s", "X").validate_for_read().is_ok());
    }

    #[test]
    fn test_validate_for_write_requires_position_even_when_static() {
        let err = Column::constant("s", "X").validate_for_write().unwrap_err();
        assert_eq!(err, SchemaError::MissingWritePosition { column: "s".into() });
        assert!(Column::constant("s", "X").writes(false).validate_for_write().is_ok());
    }

    #[test]
    fn test_relation_attribute_paths_are_flat() {
        let mut col = Column::attribute("pbl_name").attr("name.first").index(0);
        col.mark_relation();
        assert!(matches!(
            col.validate_for_read(),
            Err(SchemaError::NestedRelationPath { .. })
        ));
    }

    #[test]
    fn test_value_name_defaults() {
        assert_eq!(Column::attribute("title").value_name_str(), "title");
        assert_eq!(Column::attribute("title").value_name("t").value_name_str(), "t");

        let mut col = Column::attribute("pbl_name").attr("name");
        assert_eq!(col.value_name_str(), "pbl_name");
        col.mark_relation();
        assert_eq!(col.value_name_str(), "name");
        assert_eq!(col.hook_key_str(), "name");
    }

    #[test]
    fn test_read_static_ignores_row() {
        let row = vec!["a".to_string(), "b".to_string()];
        assert_eq!(Column::constant("s", "X").index(1).read(&row), Value::from("X"));
        assert_eq!(Column::attribute("t").r_index(1).read(&row), Value::from("b"));
    }

    #[test]
    fn test_write_nested_attribute() {
        let record = json!({"publisher": {"name": "Acme"}, "price": 100});
        let col = Column::attribute("publisher_name").attr("publisher.name");
        assert_eq!(col.write(&record).unwrap(), Value::from("Acme"));

        let col = Column::attribute("price").ty(ColumnType::Int);
        assert_eq!(col.write(&record).unwrap(), Value::Int(100));

        let col = Column::attribute("missing");
        assert!(matches!(
            col.write(&record),
            Err(WriteError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn test_method_writes_no_value() {
        assert_eq!(Column::method("m").write(&json!({})).unwrap(), Value::Null);
    }

    #[test]
    fn test_set_static_value() {
        let mut col = Column::constant("s", "X");
        col.set_static_value(Value::from("Y")).unwrap();
        assert_eq!(col.read(&[]), Value::from("Y"));

        let mut col = Column::method("m");
        assert_eq!(
            col.set_static_value(Value::Null),
            Err(SchemaError::NotStatic("m".into()))
        );
    }
}
