//! Binding key/value data onto [`ConfigSchema`] types.
//!
//! Matching is done on scrubbed names (see [`scrub_name`]): the declared
//! field `spawn_amount` accepts `spawn_amount`, `Spawn_Amount` or
//! `spawn-amount!`. Declared fields without a match are bound as `None`,
//! incoming keys without a field are ignored, and a field matched by more
//! than one key is rejected as ambiguous.

use std::collections::HashMap;
use std::marker::PhantomData;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::{ConfigError, ConfigResult};
use crate::input::{ConfigInput, value_kind};
use crate::schema::{BoundField, BoundObject, ConfigSchema, FieldKind, FieldSpec, Schema, scrub_name};

/// Binds `data` onto a fresh `T`.
///
/// # Errors
///
/// - [`ConfigError::Schema`] if `T` or any nested schema declares no fields.
/// - [`ConfigError::UnsupportedInput`] if `data`, or the value of a nested
///   field, is not an object.
/// - [`ConfigError::AmbiguousKey`] if two incoming keys scrub to one field.
/// - [`ConfigError::InvalidValue`] if a leaf value does not fit its field.
pub fn bind<T: ConfigSchema>(data: impl ConfigInput) -> ConfigResult<T> {
    let schema = T::schema();
    schema.validate()?;
    bind_mapping(&schema, &data.into_mapping()?)
}

fn bind_mapping<T: ConfigSchema>(schema: &Schema, data: &Map<String, Value>) -> ConfigResult<T> {
    let bound = bind_object(schema, data)?;
    debug!(target_type = schema.type_name(), "Bound configuration");
    T::from_bound(bound)
}

fn bind_object(schema: &Schema, data: &Map<String, Value>) -> ConfigResult<BoundObject> {
    let mut incoming: HashMap<String, Vec<&String>> = HashMap::new();
    for key in data.keys() {
        incoming.entry(scrub_name(key)).or_default().push(key);
    }

    let mut bound = BoundObject::new(schema.type_name());
    for field in schema.fields() {
        let matched = match incoming.get(&field.scrubbed_name()).map(Vec::as_slice) {
            None | Some([]) => BoundField::Absent,
            Some([key]) => match data.get(*key) {
                Some(value) => bind_field(field, value)?,
                None => BoundField::Absent,
            },
            Some(keys) => {
                let mut keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
                keys.sort();
                return Err(ConfigError::AmbiguousKey {
                    field: field.name().to_string(),
                    keys,
                });
            }
        };
        trace!(
            target_type = schema.type_name(),
            field = field.name(),
            present = !matches!(matched, BoundField::Absent),
            "Matched configuration field"
        );
        bound.insert(field.name(), matched);
    }
    Ok(bound)
}

fn bind_field(field: &FieldSpec, value: &Value) -> ConfigResult<BoundField> {
    if value.is_null() {
        return Ok(BoundField::Absent);
    }
    match field.kind() {
        FieldKind::Leaf(_) => Ok(BoundField::Value(value.clone())),
        FieldKind::Nested(schema) => match value.as_object() {
            Some(map) => Ok(BoundField::Nested(bind_object(schema, map)?)),
            None => Err(ConfigError::unsupported_field(
                value_kind(value),
                field.name(),
            )),
        },
    }
}

/// Configuration data captured for later binding onto `T`.
///
/// The input is normalized when the `Configuration` is created, so an
/// unsupported shape is reported up front; every call to
/// [`retrieve_instance`](Self::retrieve_instance) then binds a fresh `T`.
pub struct Configuration<T> {
    data: Map<String, Value>,
    _target: PhantomData<fn() -> T>,
}

impl<T: ConfigSchema> Configuration<T> {
    pub fn new(data: impl ConfigInput) -> ConfigResult<Self> {
        Ok(Self {
            data: data.into_mapping()?,
            _target: PhantomData,
        })
    }

    /// The captured key/value data.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Binds the captured data onto a new `T`.
    pub fn retrieve_instance(&self) -> ConfigResult<T> {
        let schema = T::schema();
        schema.validate()?;
        bind_mapping(&schema, &self.data)
    }
}

impl<T> Clone for Configuration<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            _target: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Configuration<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("target", &std::any::type_name::<T>())
            .field("data", &self.data)
            .finish()
    }
}
