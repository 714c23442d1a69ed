//! Schemas: composed, validated column sets.
//!
//! A [`Schema`] is built once through a [`SchemaBuilder`] and then shared
//! read-only by every reader and writer. Building runs, in order:
//!
//! 1. composition of base schemas with the builder's own declarations
//! 2. automatic position assignment over the whole tree (when `auto_assign`)
//! 3. structural validation (positions present, unique positions, unique
//!    value names)

pub mod compose;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::column::Column;
use crate::error::{HookError, SchemaError, SchemaResult};
use crate::hooks::Hooks;
use crate::options::Options;
use crate::part::Part;
use crate::row::render_row;
use crate::value::{Context, Value, Values};

pub use compose::compose;

// =============================================================================
// Schema
// =============================================================================

/// The immutable column set of one record type.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    options: Options,
    columns: Vec<Column>,
    parts: Vec<Part>,
    hooks: Hooks,
    fields: Option<Vec<String>>,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Own columns in declaration order (parts excluded).
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, relation: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.relation() == relation)
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Allow-list of keys kept on read, when set.
    pub fn fields(&self) -> Option<&[String]> {
        self.fields.as_deref()
    }

    /// Own columns producing a read value.
    pub fn read_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_read_eligible())
    }

    /// Own columns contributing a written cell.
    pub fn write_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_write_eligible())
    }

    /// Whether the tree has any column producing a read value.
    pub fn has_read_columns(&self) -> bool {
        self.read_columns().next().is_some() || self.parts.iter().any(|p| p.schema().has_read_columns())
    }

    /// Whether the tree has any column contributing a written cell.
    pub fn has_write_columns(&self) -> bool {
        self.write_columns().next().is_some() || self.parts.iter().any(|p| p.schema().has_write_columns())
    }

    /// Every column of the tree: own columns, then each part's, recursively.
    pub fn all_columns(&self) -> Vec<&Column> {
        let mut out = Vec::new();
        self.visit(&mut |c| out.push(c));
        out
    }

    /// Read position to column name, over the whole tree.
    pub fn read_positions(&self) -> BTreeMap<usize, String> {
        self.all_columns()
            .into_iter()
            .filter_map(|c| c.read_position().map(|p| (p, c.name().to_string())))
            .collect()
    }

    /// Write position to column name, over the whole tree.
    pub fn write_positions(&self) -> BTreeMap<usize, String> {
        self.all_columns()
            .into_iter()
            .filter_map(|c| c.write_position().map(|p| (p, c.name().to_string())))
            .collect()
    }

    /// Header labels at read positions, rendered with the blank-fill policy.
    pub fn headers_for_read(&self) -> Vec<String> {
        let cells = self
            .all_columns()
            .into_iter()
            .filter_map(|c| c.read_position().map(|p| (p, c.header_label().to_string())))
            .collect();
        render_row(cells, self.options.blank_fill)
    }

    /// Header labels at write positions, rendered with the blank-fill policy.
    pub fn headers_for_write(&self) -> Vec<String> {
        let cells = self
            .all_columns()
            .into_iter()
            .filter_map(|c| c.write_position().map(|p| (p, c.header_label().to_string())))
            .collect();
        render_row(cells, self.options.blank_fill)
    }

    /// Replace the constant of a static column anywhere in the tree.
    ///
    /// Must not be called while readers or writers borrow this schema; clone
    /// the schema first when they do.
    pub fn set_static_column(&mut self, name: &str, value: impl Into<Value>) -> SchemaResult<()> {
        match self.find_column_mut(name) {
            Some(column) => column.set_static_value(value.into()),
            None => Err(SchemaError::UnknownColumn(name.to_string())),
        }
    }

    fn find_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        if let Some(idx) = self.columns.iter().position(|c| c.name() == name) {
            return self.columns.get_mut(idx);
        }
        self.parts
            .iter_mut()
            .find_map(|p| p.schema_mut().find_column_mut(name))
    }

    // =========================================================================
    // Tree traversal
    // =========================================================================

    pub(crate) fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Column)) {
        for column in &self.columns {
            f(column);
        }
        for part in &self.parts {
            part.schema().visit(f);
        }
    }

    pub(crate) fn visit_mut(&mut self, f: &mut impl FnMut(&mut Column)) {
        for column in &mut self.columns {
            f(column);
        }
        for part in &mut self.parts {
            part.schema_mut().visit_mut(f);
        }
    }

    /// Hand this schema's options down to parts declared without their own.
    fn inherit_part_options(&mut self) {
        for part in &mut self.parts {
            if part.inherits_options() {
                part.schema_mut().options = self.options.clone();
            }
            part.schema_mut().inherit_part_options();
        }
    }

    pub(crate) fn mark_relation(&mut self) {
        for column in &mut self.columns {
            column.mark_relation();
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn validate(&self) -> SchemaResult<()> {
        if self.options.read_mode {
            for column in self.all_columns() {
                column.validate_for_read()?;
            }
        }
        if self.options.write_mode {
            for column in self.all_columns() {
                column.validate_for_write()?;
            }
        }

        let columns = self.all_columns();
        let (positions, names) = duplicates(columns.iter().filter_map(|c| c.read_position().map(|p| (p, c.name()))));
        if !positions.is_empty() {
            return Err(SchemaError::DuplicateReadPositions { positions, columns: names });
        }
        let (positions, names) = duplicates(columns.iter().filter_map(|c| c.write_position().map(|p| (p, c.name()))));
        if !positions.is_empty() {
            return Err(SchemaError::DuplicateWritePositions { positions, columns: names });
        }

        self.validate_scope()
    }

    /// Value names and virtual columns, checked per schema scope.
    fn validate_scope(&self) -> SchemaResult<()> {
        for column in self.columns.iter().filter(|c| c.is_virtual()) {
            if !column.has_explicit_value_name() || self.hooks.read_hook(column.value_name_str()).is_none() {
                return Err(SchemaError::VirtualColumnWithoutHook {
                    column: column.name().to_string(),
                });
            }
        }

        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        let keys = self
            .columns
            .iter()
            .filter(|c| c.has_read_effect() || c.is_virtual())
            .map(Column::value_name_str)
            .chain(self.parts.iter().map(Part::relation));
        for key in keys {
            *seen.entry(key).or_default() += 1;
        }
        let duplicated: Vec<String> = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(key, _)| key.to_string())
            .collect();
        if !duplicated.is_empty() {
            return Err(SchemaError::DuplicateValueNames(duplicated));
        }

        self.parts.iter().try_for_each(|p| p.schema().validate_scope())
    }
}

/// Positions claimed more than once, with every claiming column.
fn duplicates<'a>(claims: impl Iterator<Item = (usize, &'a str)>) -> (Vec<usize>, Vec<String>) {
    let mut by_position: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for (position, name) in claims {
        by_position.entry(position).or_default().push(name);
    }
    let mut positions = Vec::new();
    let mut names = Vec::new();
    for (position, claimants) in by_position {
        if claimants.len() > 1 {
            positions.push(position);
            names.extend(claimants.into_iter().map(str::to_string));
        }
    }
    (positions, names)
}

// =============================================================================
// Builder
// =============================================================================

/// Explicit registration of columns, parts and hooks.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    name: String,
    options: Option<Options>,
    bases: Vec<Schema>,
    columns: Vec<Column>,
    parts: Vec<Part>,
    hooks: Hooks,
    fields: Option<Vec<String>>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Own options; without them the last base's options apply.
    pub fn options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    /// Inherit from `base`. Later bases and own declarations win by name.
    pub fn extend(mut self, base: &Schema) -> Self {
        self.bases.push(base.clone());
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Per-field read hook overriding the value named `name`.
    pub fn read_hook<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&Values, &Context) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        self.hooks.set_read(name, Arc::new(hook));
        self
    }

    /// Whole-row read hook; its output is merged into the row.
    pub fn row_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Values, &Context) -> Result<Values, HookError> + Send + Sync + 'static,
    {
        self.hooks.set_row(Arc::new(hook));
        self
    }

    /// Write hook computing columns whose hook key is `name`.
    pub fn write_hook<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&serde_json::Value, &Context) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        self.hooks.set_write(name, Arc::new(hook));
        self
    }

    /// Keep only these keys (plus part relation names) on read.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Whether options were set here or come from a base.
    pub(crate) fn has_own_options(&self) -> bool {
        self.options.is_some() || !self.bases.is_empty()
    }

    /// Compose without assigning or validating; used for part schemas.
    pub(crate) fn assemble(self) -> Schema {
        let options = self
            .options
            .or_else(|| self.bases.last().map(|b| b.options.clone()))
            .unwrap_or_default();
        let fields = self
            .fields
            .or_else(|| self.bases.iter().rev().find_map(|b| b.fields.clone()));

        let mut hooks = Hooks::default();
        for base in &self.bases {
            hooks.merge(&base.hooks);
        }
        hooks.merge(&self.hooks);

        let columns = compose::merge_columns(
            self.bases
                .iter()
                .map(|b| b.columns.clone())
                .chain(std::iter::once(self.columns)),
        );
        let parts = compose::merge_parts(
            self.bases
                .iter()
                .map(|b| b.parts.clone())
                .chain(std::iter::once(self.parts)),
        );

        Schema {
            name: self.name,
            options,
            columns,
            parts,
            hooks,
            fields,
        }
    }

    /// Compose, assign positions and validate.
    pub fn build(self) -> SchemaResult<Schema> {
        let mut schema = self.assemble();
        schema.inherit_part_options();
        schema.visit_mut(&mut Column::reset_positions);

        if schema.options.auto_assign {
            compose::assign_positions(&mut schema);
            debug!(
                schema = %schema.name,
                read = ?schema.read_positions(),
                write = ?schema.write_positions(),
                "Assigned column positions"
            );
        }

        schema.validate()?;
        debug!(
            schema = %schema.name,
            columns = schema.columns.len(),
            parts = schema.parts.len(),
            "Built schema"
        );
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::BlankFill;

    fn book() -> SchemaBuilder {
        SchemaBuilder::new("book")
            .column(Column::attribute("title").index(0))
            .column(Column::attribute("price").index(1))
    }

    #[test]
    fn test_duplicate_read_position() {
        let err = SchemaBuilder::new("book")
            .column(Column::attribute("a").index(1))
            .column(Column::attribute("b").index(1))
            .build()
            .unwrap_err();
        match err {
            SchemaError::DuplicateReadPositions { positions, columns } => {
                assert_eq!(positions, vec![1]);
                assert_eq!(columns, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_write_position_only() {
        let err = SchemaBuilder::new("book")
            .column(Column::attribute("a").r_index(0).w_index(2))
            .column(Column::attribute("b").r_index(1).w_index(2))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateWritePositions { .. }));
    }

    #[test]
    fn test_duplicate_value_names() {
        let err = SchemaBuilder::new("book")
            .column(Column::attribute("a").index(0).value_name("x"))
            .column(Column::attribute("b").index(1).value_name("x"))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateValueNames(vec!["x".into()]));
    }

    #[test]
    fn test_missing_positions_respect_modes() {
        let err = SchemaBuilder::new("book")
            .column(Column::attribute("a").w_index(0))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingReadPosition { column: "a".into() });

        let schema = SchemaBuilder::new("book")
            .options(Options::default().read_mode(false))
            .column(Column::attribute("a").w_index(0))
            .build();
        assert!(schema.is_ok());
    }

    #[test]
    fn test_virtual_column_requires_hook() {
        let err = SchemaBuilder::new("book")
            .column(Column::method("full").reads(false).writes(false).value_name("full"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::VirtualColumnWithoutHook { .. }));

        let ok = SchemaBuilder::new("book")
            .column(Column::method("full").reads(false).writes(false).value_name("full"))
            .read_hook("full", |_, _| Ok(Value::from("x")))
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_headers_are_idempotent_and_fill_gaps() {
        let schema = SchemaBuilder::new("book")
            .column(Column::attribute("title").index(0).header("Title"))
            .column(Column::attribute("price").index(2))
            .build()
            .unwrap();
        assert_eq!(schema.headers_for_write(), vec!["Title", "", "price"]);
        assert_eq!(schema.headers_for_write(), schema.headers_for_write());

        let omit = SchemaBuilder::new("omit")
            .extend(&schema)
            .options(Options::default().blank_fill(BlankFill::Omit))
            .build()
            .unwrap();
        assert_eq!(omit.headers_for_read(), vec!["Title", "price"]);
    }

    #[test]
    fn test_options_inherited_from_last_base() {
        let base = book()
            .options(Options::default().show_bool("Y", "N"))
            .build()
            .unwrap();
        let child = SchemaBuilder::new("child").extend(&base).build().unwrap();
        assert_eq!(child.options().show_true, "Y");
        assert_eq!(child.columns().len(), 2);
    }

    #[test]
    fn test_set_static_column() {
        let mut schema = SchemaBuilder::new("book")
            .column(Column::constant("kind", "book").index(0))
            .column(Column::attribute("title").index(1))
            .build()
            .unwrap();
        schema.set_static_column("kind", "magazine").unwrap();
        assert_eq!(schema.column("kind").unwrap().read(&[]), Value::from("magazine"));

        assert_eq!(
            schema.set_static_column("title", "x"),
            Err(SchemaError::NotStatic("title".into()))
        );
        assert_eq!(
            schema.set_static_column("nope", "x"),
            Err(SchemaError::UnknownColumn("nope".into()))
        );
    }

    #[test]
    fn test_part_positions_share_parent_space() {
        let err = book()
            .part(Part::new(
                "publisher",
                SchemaBuilder::new("publisher").column(Column::attribute("pbl_name").attr("name").index(1)),
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateReadPositions { .. }));
    }

    #[test]
    fn test_auto_assign_covers_parts() {
        let schema = SchemaBuilder::new("book")
            .options(Options::default().auto_assign(true))
            .column(Column::attribute("title"))
            .part(Part::new(
                "publisher",
                SchemaBuilder::new("publisher").column(Column::attribute("pbl_name").attr("name")),
            ))
            .column(Column::attribute("price"))
            .build()
            .unwrap();
        let positions = schema.read_positions();
        assert_eq!(positions.get(&0).map(String::as_str), Some("title"));
        assert_eq!(positions.get(&1).map(String::as_str), Some("price"));
        assert_eq!(positions.get(&2).map(String::as_str), Some("pbl_name"));
    }
}
