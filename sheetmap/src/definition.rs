//! Declarative schema definitions loaded from JSON.
//!
//! A definition carries everything but hooks:
//!
//! ```json
//! {
//!   "name": "book",
//!   "options": { "auto_assign": true },
//!   "columns": [
//!     { "name": "title" },
//!     { "name": "price", "type": "int", "header": "Price" },
//!     { "name": "kind", "kind": "static", "value": "book", "read": false }
//!   ],
//!   "parts": [
//!     { "relation": "publisher", "mode": "fetch_or_create",
//!       "schema": { "name": "publisher", "columns": [{ "name": "pbl_name", "attr": "name" }] } }
//!   ]
//! }
//! ```
//!
//! Hooks and resolvers are registered on the returned builder.

use serde::{Deserialize, Serialize};

use crate::column::Column;
use crate::error::{SchemaError, SchemaResult};
use crate::options::Options;
use crate::part::{CallbackMode, Part};
use crate::schema::{Schema, SchemaBuilder};
use crate::value::{ColumnType, Value};

/// Column kind tag of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKindDefinition {
    #[default]
    Attribute,
    Static,
    Method,
}

fn enabled() -> bool {
    true
}

/// One column of a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDefinition {
    pub name: String,

    #[serde(default)]
    pub kind: ColumnKindDefinition,

    #[serde(default, rename = "type")]
    pub ty: ColumnType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r_index: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w_index: Option<usize>,

    #[serde(default = "enabled")]
    pub read: bool,

    #[serde(default = "enabled")]
    pub write: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,

    /// Attribute path, attribute columns only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,

    /// Constant of a static column, read as `type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl ColumnDefinition {
    pub fn into_column(self) -> SchemaResult<Column> {
        if self.kind != ColumnKindDefinition::Attribute && self.attr.is_some() {
            return Err(SchemaError::InvalidDefinition(format!(
                "column `{}`: only attribute columns take `attr`",
                self.name
            )));
        }

        let mut column = match self.kind {
            ColumnKindDefinition::Attribute => {
                let column = Column::attribute(&self.name);
                match self.attr {
                    Some(path) => column.attr(path),
                    None => column,
                }
            }
            ColumnKindDefinition::Static => {
                let raw = self.value.unwrap_or(serde_json::Value::Null);
                let value = Value::from_json(&raw, self.ty)
                    .map_err(|e| SchemaError::InvalidDefinition(format!("column `{}`: {}", self.name, e)))?;
                Column::constant(&self.name, value)
            }
            ColumnKindDefinition::Method => Column::method(&self.name),
        };

        column = column.ty(self.ty).reads(self.read).writes(self.write);
        if let Some(index) = self.index {
            column = column.index(index);
        }
        if let Some(index) = self.r_index {
            column = column.r_index(index);
        }
        if let Some(index) = self.w_index {
            column = column.w_index(index);
        }
        if let Some(name) = self.value_name {
            column = column.value_name(name);
        }
        if let Some(key) = self.hook_key {
            column = column.hook_key(key);
        }
        if let Some(header) = self.header {
            column = column.header(header);
        }
        Ok(column)
    }
}

/// One part of a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartDefinition {
    pub relation: String,

    #[serde(default)]
    pub mode: CallbackMode,

    pub schema: SchemaDefinition,
}

/// A whole schema as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDefinition {
    pub name: String,

    /// Raw options; unknown keys surface as [`SchemaError::UnknownOption`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,

    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,

    #[serde(default)]
    pub parts: Vec<PartDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl SchemaDefinition {
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        serde_json::from_str(json).map_err(|e| SchemaError::InvalidDefinition(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::InvalidDefinition(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Builder with every column and part registered; add hooks, then build.
    pub fn into_builder(self) -> SchemaResult<SchemaBuilder> {
        let mut builder = SchemaBuilder::new(self.name);
        if let Some(raw) = self.options {
            builder = builder.options(Options::from_value(raw)?);
        }
        for column in self.columns {
            builder = builder.column(column.into_column()?);
        }
        for part in self.parts {
            let nested = part.schema.into_builder()?;
            builder = builder.part(Part::new(part.relation, nested).mode(part.mode));
        }
        if let Some(fields) = self.fields {
            builder = builder.fields(fields);
        }
        Ok(builder)
    }

    pub fn build(self) -> SchemaResult<Schema> {
        self.into_builder()?.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BOOK: &str = r#"{
        "name": "book",
        "options": {"auto_assign": true, "show_true": "Y"},
        "columns": [
            {"name": "title", "header": "Title"},
            {"name": "price", "type": "int"},
            {"name": "kind", "kind": "static", "value": "book", "w_index": 5}
        ],
        "parts": [
            {"relation": "publisher", "mode": "fetch",
             "schema": {"name": "publisher", "columns": [{"name": "pbl_name", "attr": "name"}]}}
        ]
    }"#;

    #[test]
    fn test_build_from_json() {
        let schema = SchemaDefinition::from_json(BOOK).unwrap().build().unwrap();
        assert_eq!(schema.options().show_true, "Y");
        assert_eq!(schema.column("title").unwrap().read_position(), Some(0));
        assert_eq!(schema.column("price").unwrap().column_type(), ColumnType::Int);
        assert_eq!(schema.column("kind").unwrap().write_position(), Some(5));

        let part = schema.part("publisher").unwrap();
        assert_eq!(part.callback_mode(), CallbackMode::Fetch);
        assert_eq!(part.schema().column("pbl_name").unwrap().read_position(), Some(2));
        assert_eq!(schema.headers_for_write(), vec!["Title", "price", "pbl_name", "", "", "kind"]);
    }

    #[test]
    fn test_unknown_option_key() {
        let def = SchemaDefinition::from_json(r#"{"name": "x", "options": {"nope": 1}}"#).unwrap();
        assert_eq!(def.build().unwrap_err(), SchemaError::UnknownOption("nope".into()));
    }

    #[test]
    fn test_unknown_column_key() {
        let err = SchemaDefinition::from_json(r#"{"name": "x", "columns": [{"name": "a", "idx": 1}]}"#).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefinition(_)));
    }

    #[test]
    fn test_attr_only_on_attribute_columns() {
        let def: ColumnDefinition = serde_json::from_value(json!({"name": "m", "kind": "method", "attr": "x"})).unwrap();
        assert!(matches!(def.into_column(), Err(SchemaError::InvalidDefinition(_))));
    }

    #[test]
    fn test_static_value_typed() {
        let def: ColumnDefinition =
            serde_json::from_value(json!({"name": "n", "kind": "static", "type": "int", "value": 3, "index": 0})).unwrap();
        let column = def.into_column().unwrap();
        assert_eq!(column.read(&[]), Value::Int(3));
    }
}
