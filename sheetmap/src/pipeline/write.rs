//! Write pipeline: records to string rows.
//!
//! Records are serialized with serde, then each write column picks its value
//! by precedence:
//!
//! 1. a callback registered on the writer for that column
//! 2. the column's own write callback
//! 3. the schema's write hook named by the column's hook key
//! 4. the column default (constant, attribute lookup, or "no value")
//!
//! Part columns are rendered against `record[relation]`.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::column::Column;
use crate::error::{HookError, SchemaError, WriteError, WriteResult};
use crate::hooks::WriteHook;
use crate::row::render_row;
use crate::schema::Schema;
use crate::value::{Context, Value};

/// Renders records through a schema.
pub struct Writer<'s> {
    schema: &'s Schema,
    context: Context,
    callbacks: Vec<(String, WriteHook)>,
}

impl<'s> Writer<'s> {
    pub fn new(schema: &'s Schema) -> WriteResult<Self> {
        if !schema.options().write_mode {
            return Err(SchemaError::WriteModeProhibited(schema.name().to_string()).into());
        }
        if !schema.has_write_columns() {
            return Err(SchemaError::NoWriteColumns(schema.name().to_string()).into());
        }
        Ok(Self {
            schema,
            context: Context::new(),
            callbacks: Vec::new(),
        })
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_constant(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key, value);
        self
    }

    /// Compute `column` with `callback`, overriding every hook.
    pub fn callback<F>(mut self, column: impl Into<String>, callback: F) -> WriteResult<Self>
    where
        F: Fn(&serde_json::Value, &Context) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        let column = column.into();
        if !self.schema.all_columns().iter().any(|c| c.name() == column) {
            return Err(SchemaError::UnknownColumn(column).into());
        }
        self.callbacks.push((column, Arc::new(callback)));
        Ok(self)
    }

    /// Header row of write columns.
    pub fn header(&self) -> Vec<String> {
        self.schema.headers_for_write()
    }

    /// Render one record.
    pub fn render_record<T: Serialize>(&self, record: &T) -> WriteResult<Vec<String>> {
        let json = serde_json::to_value(record)?;
        let mut cells = BTreeMap::new();
        self.collect(self.schema, &json, &mut cells)?;
        Ok(render_row(cells, self.schema.options().blank_fill))
    }

    /// Render every record, optionally preceded by the header row.
    pub fn table<T: Serialize>(&self, records: &[T], header: bool) -> WriteResult<Vec<Vec<String>>> {
        let mut rows = Vec::with_capacity(records.len() + usize::from(header));
        if header {
            rows.push(self.header());
        }
        for record in records {
            rows.push(self.render_record(record)?);
        }
        info!(schema = %self.schema.name(), rows = records.len(), "Rendered records");
        Ok(rows)
    }

    fn collect(
        &self,
        schema: &Schema,
        record: &serde_json::Value,
        cells: &mut BTreeMap<usize, String>,
    ) -> WriteResult<()> {
        for column in schema.write_columns() {
            let value = self.value_for(schema, column, record)?;
            let text = schema
                .options()
                .typed_to_string(&value, column.column_type())
                .map_err(|source| WriteError::Conversion {
                    column: column.name().to_string(),
                    source,
                })?;
            if let Some(position) = column.write_position() {
                cells.insert(position, text);
            }
        }

        for part in schema.parts() {
            let related = record
                .get(part.relation())
                .filter(|v| !v.is_null())
                .ok_or_else(|| WriteError::Relation {
                    relation: part.relation().to_string(),
                    message: "related object is missing".to_string(),
                })?;
            if !related.is_object() {
                return Err(WriteError::Relation {
                    relation: part.relation().to_string(),
                    message: format!("expected an object, found `{}`", related),
                });
            }
            self.collect(part.schema(), related, cells)?;
        }
        Ok(())
    }

    fn value_for(&self, schema: &Schema, column: &Column, record: &serde_json::Value) -> WriteResult<Value> {
        let registered = self
            .callbacks
            .iter()
            .find(|(name, _)| name == column.name())
            .map(|(name, hook)| (name.as_str(), hook));
        let own = column.callback().map(|hook| (column.name(), hook));
        let hooked = if column.is_static() {
            None
        } else {
            let key = column.hook_key_str();
            schema.hooks().write_hook(key).map(|hook| (key, hook))
        };

        match registered.or(own).or(hooked) {
            Some((name, hook)) => hook(record, &self.context).map_err(|source| WriteError::Hook {
                name: name.to_string(),
                source,
            }),
            None => column.write(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{BlankFill, Options};
    use crate::schema::SchemaBuilder;
    use crate::value::ColumnType;
    use serde_json::json;

    #[test]
    fn test_static_and_attribute() {
        let schema = SchemaBuilder::new("person")
            .column(Column::constant("kind", "X").index(0))
            .column(Column::attribute("name").index(1))
            .build()
            .unwrap();
        let writer = Writer::new(&schema).unwrap();
        assert_eq!(writer.render_record(&json!({"name": "Alice"})).unwrap(), vec!["X", "Alice"]);
    }

    #[test]
    fn test_blank_fill() {
        let build = |fill| {
            SchemaBuilder::new("t")
                .options(Options::default().blank_fill(fill))
                .column(Column::attribute("a").index(0))
                .column(Column::attribute("b").index(1))
                .column(Column::attribute("d").index(3))
                .build()
                .unwrap()
        };
        let record = json!({"a": "1", "b": "2", "d": "4"});

        let schema = build(BlankFill::Empty);
        let row = Writer::new(&schema).unwrap().render_record(&record).unwrap();
        assert_eq!(row, vec!["1", "2", "", "4"]);

        let schema = build(BlankFill::Omit);
        let row = Writer::new(&schema).unwrap().render_record(&record).unwrap();
        assert_eq!(row, vec!["1", "2", "4"]);
    }

    #[test]
    fn test_precedence() {
        let schema = SchemaBuilder::new("t")
            .column(Column::attribute("a").index(0))
            .column(Column::computed("b", |_, _| Ok(Value::from("own"))).index(1))
            .column(Column::method("c").index(2))
            .write_hook("a", |_, _| Ok(Value::from("hooked")))
            .write_hook("b", |_, _| Ok(Value::from("hooked")))
            .write_hook("c", |r, _| Ok(Value::from(format!("{}!", r["a"].as_str().unwrap_or_default()))))
            .build()
            .unwrap();
        let record = json!({"a": "plain"});

        let writer = Writer::new(&schema).unwrap();
        assert_eq!(writer.render_record(&record).unwrap(), vec!["hooked", "own", "plain!"]);

        let writer = Writer::new(&schema)
            .unwrap()
            .callback("b", |_, ctx| Ok(ctx.get("who").cloned().unwrap_or_default()))
            .unwrap()
            .with_constant("who", "caller");
        assert_eq!(writer.render_record(&record).unwrap(), vec!["hooked", "caller", "plain!"]);
    }

    #[test]
    fn test_method_without_hook_writes_default() {
        let schema = SchemaBuilder::new("t")
            .options(Options::default().default_if_none("n/a"))
            .column(Column::method("m").index(0))
            .build()
            .unwrap();
        let row = Writer::new(&schema).unwrap().render_record(&json!({})).unwrap();
        assert_eq!(row, vec!["n/a"]);
    }

    #[test]
    fn test_typed_rendering_and_errors() {
        let schema = SchemaBuilder::new("t")
            .column(Column::attribute("ok").index(0).ty(ColumnType::Bool))
            .build()
            .unwrap();
        let writer = Writer::new(&schema).unwrap();
        assert_eq!(writer.render_record(&json!({"ok": true})).unwrap(), vec!["yes"]);
        assert!(matches!(
            writer.render_record(&json!({"ok": 3})),
            Err(WriteError::Conversion { .. })
        ));
        assert!(matches!(
            writer.render_record(&json!({})),
            Err(WriteError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn test_unknown_callback_column() {
        let schema = SchemaBuilder::new("t")
            .column(Column::attribute("a").index(0))
            .build()
            .unwrap();
        let err = Writer::new(&schema)
            .unwrap()
            .callback("zzz", |_, _| Ok(Value::Null))
            .err()
            .unwrap();
        assert!(matches!(err, WriteError::Schema(SchemaError::UnknownColumn(_))));
    }

    #[test]
    fn test_table_with_header() {
        let schema = SchemaBuilder::new("t")
            .column(Column::attribute("a").index(0).header("A"))
            .build()
            .unwrap();
        let rows = Writer::new(&schema)
            .unwrap()
            .table(&[json!({"a": "1"}), json!({"a": "2"})], true)
            .unwrap();
        assert_eq!(rows, vec![vec!["A"], vec!["1"], vec!["2"]]);
    }
}
