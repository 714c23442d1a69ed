//! Parts: nested schemas for related entities.
//!
//! A part contributes its columns to the parent's position space. On read it
//! extracts its own values from the parent's physical row, then hands them to
//! a [`Resolver`] (the persistence collaborator) which returns the related
//! entity stored under the relation name. On write it renders its columns
//! from the related sub-object `record[relation]`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::HookError;
use crate::schema::{Schema, SchemaBuilder};
use crate::value::{values_to_json, Context, Value, Values};

/// What the resolver is asked to do with the extracted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackMode {
    Create,
    #[default]
    FetchOrCreate,
    Fetch,
}

/// Turns a part's extracted values into the related entity.
///
/// Returning [`HookError::Invalid`] records a row error under the relation
/// name; [`HookError::Failed`] aborts the batch.
pub trait Resolver: Send + Sync {
    fn resolve(&self, mode: CallbackMode, values: &Values, context: &Context) -> Result<Value, HookError>;
}

impl<F> Resolver for F
where
    F: Fn(CallbackMode, &Values, &Context) -> Result<Value, HookError> + Send + Sync,
{
    fn resolve(&self, mode: CallbackMode, values: &Values, context: &Context) -> Result<Value, HookError> {
        self(mode, values, context)
    }
}

/// Default resolver: embeds the values as a JSON object, whatever the mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbedResolver;

impl Resolver for EmbedResolver {
    fn resolve(&self, _mode: CallbackMode, values: &Values, _context: &Context) -> Result<Value, HookError> {
        Ok(Value::Json(values_to_json(values)))
    }
}

/// A nested schema embedded under a relation name.
#[derive(Clone)]
pub struct Part {
    relation: String,
    mode: CallbackMode,
    schema: Schema,
    resolver: Arc<dyn Resolver>,
    inherit_options: bool,
}

impl Part {
    /// Part whose columns come from `builder`.
    ///
    /// Positions are assigned and validated when the owning schema is built.
    /// A builder without options (set directly or through a base) converts
    /// with the owning schema's options.
    pub fn new(relation: impl Into<String>, builder: SchemaBuilder) -> Self {
        let inherit_options = !builder.has_own_options();
        let mut schema = builder.assemble();
        schema.mark_relation();
        Self {
            relation: relation.into(),
            mode: CallbackMode::default(),
            schema,
            resolver: Arc::new(EmbedResolver),
            inherit_options,
        }
    }

    pub fn mode(mut self, mode: CallbackMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Resolve with a closure receiving the callback mode.
    pub fn resolve_with<F>(self, resolver: F) -> Self
    where
        F: Fn(CallbackMode, &Values, &Context) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        self.resolver(resolver)
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn callback_mode(&self) -> CallbackMode {
        self.mode
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn inherits_options(&self) -> bool {
        self.inherit_options
    }

    pub(crate) fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    pub(crate) fn resolve(&self, values: &Values, context: &Context) -> Result<Value, HookError> {
        self.resolver.resolve(self.mode, values, context)
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("relation", &self.relation)
            .field("mode", &self.mode)
            .field("inherit_options", &self.inherit_options)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use serde_json::json;

    #[test]
    fn test_part_columns_are_relation_columns() {
        let part = Part::new(
            "publisher",
            SchemaBuilder::new("publisher").column(Column::attribute("pbl_name").attr("name").index(2)),
        );
        let col = part.schema().column("pbl_name").unwrap();
        assert!(col.is_relation());
        assert_eq!(col.value_name_str(), "name");
        assert_eq!(part.callback_mode(), CallbackMode::FetchOrCreate);
    }

    #[test]
    fn test_embed_resolver() {
        let mut values = Values::new();
        values.insert("name".into(), Value::from("Acme"));
        let v = EmbedResolver
            .resolve(CallbackMode::Create, &values, &Context::new())
            .unwrap();
        assert_eq!(v, Value::Json(json!({"name": "Acme"})));
    }

    #[test]
    fn test_closure_resolver_sees_mode() {
        let part = Part::new("publisher", SchemaBuilder::new("publisher")).resolve_with(|mode, _, _| match mode {
            CallbackMode::Fetch => Err(HookError::invalid("not found")),
            _ => Ok(Value::Int(1)),
        });
        assert!(part.resolve(&Values::new(), &Context::new()).is_ok());

        let part = part.mode(CallbackMode::Fetch);
        assert!(matches!(
            part.resolve(&Values::new(), &Context::new()),
            Err(HookError::Invalid(_))
        ));
    }

    #[test]
    fn test_options_inherited_only_without_own() {
        let plain = Part::new("publisher", SchemaBuilder::new("publisher"));
        assert!(plain.inherits_options());

        let own = Part::new(
            "publisher",
            SchemaBuilder::new("publisher").options(crate::options::Options::default()),
        );
        assert!(!own.inherits_options());
    }

    #[test]
    fn test_callback_mode_serde() {
        let mode: CallbackMode = serde_json::from_value(json!("fetch_or_create")).unwrap();
        assert_eq!(mode, CallbackMode::FetchOrCreate);
    }
}
