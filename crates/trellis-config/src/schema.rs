//! Declared shapes of configuration targets.
//!
//! A [`Schema`] lists the fields of a configuration type together with the
//! kind of value each one takes. Leaf kinds are taken as-is from the input;
//! every other field is itself a nested schema and is bound recursively.
//!
//! Bound values can be turned back into JSON with [`ConfigSchema::to_value`],
//! which mirrors the schema: declared keys, nested objects, and null for
//! `None`.
//!
//! Schemas are normally produced by `#[derive(ConfigSchema)]`:
//!
//! ```rust,ignore
//! #[derive(ConfigSchema)]
//! struct Database {
//!     url: Option<String>,
//!     pool: Option<PoolConfig>, // nested
//! }
//! ```

use std::collections::HashMap;

use serde::Serialize;
use serde::de::{DeserializeOwned, Error as _};
use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};

/// A type that can be populated by the binder.
///
/// Every field is optional: a field without a matching key in the input is
/// bound as `None` rather than left out.
pub trait ConfigSchema: Sized {
    /// Describes the declared fields of the type.
    fn schema() -> Schema;

    /// Builds the value from fields matched by the binder.
    fn from_bound(bound: BoundObject) -> ConfigResult<Self>;

    /// Converts the value back into a JSON object keyed by the declared
    /// field names. Nested schemas become nested objects and `None` fields
    /// become null, so binding the result yields an equal value.
    fn to_value(&self) -> Value;
}

/// Value kinds that are bound without recursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Map,
    Tuple,
    /// Any JSON value, or a custom type deserialized from one.
    Any,
}

/// How a field is bound.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Leaf(LeafKind),
    Nested(Schema),
}

/// A single declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: &'static str,
    kind: FieldKind,
}

impl FieldSpec {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// The normalized name used to match incoming keys.
    pub fn scrubbed_name(&self) -> String {
        scrub_name(self.name)
    }
}

/// The declared fields of a configuration type.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    type_name: &'static str,
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            fields: Vec::new(),
        }
    }

    /// Declares a leaf field.
    pub fn leaf(mut self, name: &'static str, kind: LeafKind) -> Self {
        self.fields.push(FieldSpec {
            name,
            kind: FieldKind::Leaf(kind),
        });
        self
    }

    /// Declares a field bound recursively through `T`'s own schema.
    ///
    /// `T`'s schema is discovered immediately. A type that nests itself
    /// therefore never finishes describing its schema.
    pub fn nested<T: ConfigSchema>(mut self, name: &'static str) -> Self {
        self.fields.push(FieldSpec {
            name,
            kind: FieldKind::Nested(T::schema()),
        });
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rejects this schema, or any nested one, if it declares no fields.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.fields.is_empty() {
            return Err(ConfigError::schema(self.type_name));
        }
        self.fields.iter().try_for_each(|field| match &field.kind {
            FieldKind::Nested(schema) => schema.validate(),
            FieldKind::Leaf(_) => Ok(()),
        })
    }
}

/// Normalizes a name for matching: characters outside `[A-Za-z0-9_]` are
/// removed and the rest lowercased.
pub fn scrub_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// A field after matching.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundField {
    /// No key matched, or the matched value was null.
    Absent,
    Value(Value),
    Nested(BoundObject),
}

/// Matched fields of one schema level, handed to [`ConfigSchema::from_bound`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoundObject {
    type_name: &'static str,
    fields: HashMap<&'static str, BoundField>,
}

impl BoundObject {
    pub(crate) fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            fields: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, name: &'static str, field: BoundField) {
        self.fields.insert(name, field);
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&BoundField> {
        self.fields.get(name)
    }

    /// Takes a leaf field, deserializing it into `T`.
    pub fn take_value<T: DeserializeOwned>(&mut self, name: &str) -> ConfigResult<Option<T>> {
        match self.fields.remove(name) {
            None | Some(BoundField::Absent) => Ok(None),
            Some(BoundField::Value(value)) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ConfigError::invalid_value(name, e)),
            Some(BoundField::Nested(_)) => Err(ConfigError::invalid_value(
                name,
                serde_json::Error::custom("expected a leaf value, found a nested object"),
            )),
        }
    }

    /// Takes a nested field, building it through `T`'s schema.
    pub fn take_nested<T: ConfigSchema>(&mut self, name: &str) -> ConfigResult<Option<T>> {
        match self.fields.remove(name) {
            None | Some(BoundField::Absent) => Ok(None),
            Some(BoundField::Nested(bound)) => T::from_bound(bound).map(Some),
            Some(BoundField::Value(_)) => Err(ConfigError::invalid_value(
                name,
                serde_json::Error::custom("expected a nested object, found a leaf value"),
            )),
        }
    }
}

/// Collects fields into a JSON object for [`ConfigSchema::to_value`].
#[derive(Debug, Default)]
pub struct ValueBuilder {
    object: Map<String, Value>,
}

impl ValueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a leaf field. `None` and values serde cannot express as JSON
    /// are written as null.
    pub fn leaf<T: Serialize>(mut self, name: &str, value: &Option<T>) -> Self {
        let value = value
            .as_ref()
            .and_then(|value| serde_json::to_value(value).ok())
            .unwrap_or(Value::Null);
        self.object.insert(name.to_string(), value);
        self
    }

    /// Adds a nested field through `T`'s own conversion.
    pub fn nested<T: ConfigSchema>(mut self, name: &str, value: &Option<T>) -> Self {
        let value = value.as_ref().map_or(Value::Null, T::to_value);
        self.object.insert(name.to_string(), value);
        self
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inner;

    impl ConfigSchema for Inner {
        fn schema() -> Schema {
            Schema::new("Inner").leaf("term1", LeafKind::String)
        }

        fn from_bound(_bound: BoundObject) -> ConfigResult<Self> {
            Ok(Inner)
        }

        fn to_value(&self) -> Value {
            ValueBuilder::new()
                .leaf("term1", &Some("one"))
                .into_value()
        }
    }

    struct Hollow;

    impl ConfigSchema for Hollow {
        fn schema() -> Schema {
            Schema::new("Hollow")
        }

        fn from_bound(_bound: BoundObject) -> ConfigResult<Self> {
            Ok(Hollow)
        }

        fn to_value(&self) -> Value {
            ValueBuilder::new().into_value()
        }
    }

    #[test]
    fn test_scrub_name() {
        assert_eq!(scrub_name("Spawn-Amount"), "spawnamount");
        assert_eq!(scrub_name("spawn_amount"), "spawn_amount");
        assert_eq!(scrub_name(" Value 1 "), "value1");
        assert_eq!(scrub_name("--log.level"), "loglevel");
    }

    #[test]
    fn test_nested_schema_is_discovered() {
        let schema = Schema::new("Outer")
            .leaf("name", LeafKind::String)
            .nested::<Inner>("inner");

        assert_eq!(schema.fields().len(), 2);
        match schema.fields()[1].kind() {
            FieldKind::Nested(inner) => assert_eq!(inner.type_name(), "Inner"),
            other => panic!("expected nested schema, got {other:?}"),
        }
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_empty_schema_rejected() {
        let err = Schema::new("Hollow").validate().unwrap_err();
        assert!(matches!(err, ConfigError::Schema { type_name: "Hollow" }));
    }

    #[test]
    fn test_empty_nested_schema_rejected() {
        let schema = Schema::new("Outer")
            .leaf("name", LeafKind::String)
            .nested::<Hollow>("hollow");
        let err = schema.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Schema { type_name: "Hollow" }));
    }

    #[test]
    fn test_take_value_converts_and_reports_mismatch() {
        let mut bound = BoundObject::new("Outer");
        bound.insert("count", BoundField::Value(Value::from(40)));
        bound.insert("name", BoundField::Value(Value::from(true)));
        bound.insert("gone", BoundField::Absent);

        assert_eq!(bound.take_value::<u32>("count").unwrap(), Some(40));
        assert_eq!(bound.take_value::<String>("gone").unwrap(), None);
        assert_eq!(bound.take_value::<String>("never").unwrap(), None);
        assert!(matches!(
            bound.take_value::<String>("name"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_value_builder_writes_nulls_and_nests() {
        let value = ValueBuilder::new()
            .leaf("count", &Some(3u8))
            .leaf::<String>("missing", &None)
            .nested("inner", &Some(Inner))
            .nested::<Inner>("gone", &None)
            .into_value();

        assert_eq!(
            value,
            serde_json::json!({
                "count": 3,
                "missing": null,
                "inner": { "term1": "one" },
                "gone": null
            })
        );
    }
}
