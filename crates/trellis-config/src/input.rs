//! Input shapes accepted by the binder.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use serde_json::{Map, Value};

use crate::context::ConfigurationContext;
use crate::error::{ConfigError, ConfigResult};
use crate::section::ConfigurationSection;

/// Data that can be viewed as a flat key/value mapping.
///
/// Implemented for JSON objects, string-keyed maps, [`Namespace`],
/// [`ConfigurationSection`] and [`ConfigurationContext`]. Values that are not
/// objects are rejected with [`ConfigError::UnsupportedInput`].
pub trait ConfigInput {
    fn into_mapping(self) -> ConfigResult<Map<String, Value>>;
}

/// Name of a JSON value's kind, used in error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ConfigInput for Map<String, Value> {
    fn into_mapping(self) -> ConfigResult<Map<String, Value>> {
        Ok(self)
    }
}

impl ConfigInput for Value {
    fn into_mapping(self) -> ConfigResult<Map<String, Value>> {
        match self {
            Value::Object(map) => Ok(map),
            other => Err(ConfigError::unsupported(value_kind(&other))),
        }
    }
}

impl ConfigInput for &Value {
    fn into_mapping(self) -> ConfigResult<Map<String, Value>> {
        match self {
            Value::Object(map) => Ok(map.clone()),
            other => Err(ConfigError::unsupported(value_kind(other))),
        }
    }
}

impl<S: BuildHasher> ConfigInput for HashMap<String, Value, S> {
    fn into_mapping(self) -> ConfigResult<Map<String, Value>> {
        Ok(self.into_iter().collect())
    }
}

impl ConfigInput for BTreeMap<String, Value> {
    fn into_mapping(self) -> ConfigResult<Map<String, Value>> {
        Ok(self.into_iter().collect())
    }
}

impl ConfigInput for Namespace {
    fn into_mapping(self) -> ConfigResult<Map<String, Value>> {
        Ok(self.attrs.into_iter().collect())
    }
}

impl ConfigInput for ConfigurationSection {
    fn into_mapping(self) -> ConfigResult<Map<String, Value>> {
        match self.into_settings() {
            Some(settings) => settings.into_mapping(),
            None => Ok(Map::new()),
        }
    }
}

impl ConfigInput for &ConfigurationSection {
    fn into_mapping(self) -> ConfigResult<Map<String, Value>> {
        match self.settings() {
            Some(settings) => settings.into_mapping(),
            None => Ok(Map::new()),
        }
    }
}

impl ConfigInput for &ConfigurationContext {
    fn into_mapping(self) -> ConfigResult<Map<String, Value>> {
        self.document()?.into_mapping()
    }
}

impl ConfigInput for ConfigurationContext {
    fn into_mapping(self) -> ConfigResult<Map<String, Value>> {
        (&self).into_mapping()
    }
}

/// A flat attribute map, as produced by command-line parsing.
///
/// ```rust,ignore
/// let args: Namespace = [("spawn_amount", 40)].into_iter().collect();
/// let config: SpawnConfig = trellis_config::bind(args)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    attrs: BTreeMap<String, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an attribute, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attrs.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Namespace {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            attrs: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Converts a raw command-line value: booleans and numbers are recognized,
/// anything else stays a string.
#[cfg(feature = "clap")]
fn parse_raw(raw: &str) -> Value {
    if let Ok(flag) = raw.parse::<bool>() {
        return Value::Bool(flag);
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = raw.parse::<f64>()
        && let Some(number) = serde_json::Number::from_f64(float)
    {
        return Value::Number(number);
    }
    Value::String(raw.to_string())
}

#[cfg(feature = "clap")]
impl From<&clap::ArgMatches> for Namespace {
    fn from(matches: &clap::ArgMatches) -> Self {
        let mut namespace = Namespace::new();
        for id in matches.ids() {
            let Ok(Some(raw)) = matches.try_get_raw(id.as_str()) else {
                continue;
            };
            let mut values: Vec<Value> = raw.map(|v| parse_raw(&v.to_string_lossy())).collect();
            let value = match values.len() {
                0 => continue,
                1 => values.remove(0),
                _ => Value::Array(values),
            };
            namespace.insert(id.as_str(), value);
        }
        namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_value_is_mapping() {
        let map = json!({ "name": "hello" }).into_mapping().unwrap();
        assert_eq!(map.get("name"), Some(&json!("hello")));
    }

    #[test]
    fn test_non_object_value_is_unsupported() {
        for (value, kind) in [
            (json!(5), "number"),
            (json!([1, 2]), "array"),
            (json!("text"), "string"),
            (Value::Null, "null"),
        ] {
            match value.into_mapping() {
                Err(ConfigError::UnsupportedInput { found, field: None }) => {
                    assert_eq!(found, kind)
                }
                other => panic!("expected unsupported input, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_absent_section_is_empty_mapping() {
        let map = ConfigurationSection::absent().into_mapping().unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_scalar_section_is_unsupported() {
        let section = ConfigurationSection::new(Some(json!(true)));
        assert!(matches!(
            (&section).into_mapping(),
            Err(ConfigError::UnsupportedInput { found: "boolean", .. })
        ));
    }

    #[test]
    fn test_namespace_collects_pairs() {
        let mut namespace: Namespace = [("spawn_amount", 40)].into_iter().collect();
        namespace.insert("verbose", true);

        assert_eq!(namespace.len(), 2);
        assert_eq!(namespace.get("verbose"), Some(&json!(true)));

        let map = namespace.into_mapping().unwrap();
        assert_eq!(map.get("spawn_amount"), Some(&json!(40)));
    }

    #[cfg(feature = "clap")]
    #[test]
    fn test_namespace_from_arg_matches() {
        use clap::{Arg, ArgAction, Command};

        let matches = Command::new("demo")
            .arg(Arg::new("spawn_amount").long("spawn-amount"))
            .arg(Arg::new("name").long("name"))
            .arg(Arg::new("tags").long("tag").action(ArgAction::Append))
            .try_get_matches_from([
                "demo",
                "--spawn-amount",
                "40",
                "--name",
                "alpha",
                "--tag",
                "a",
                "--tag",
                "b",
            ])
            .unwrap();

        let namespace = Namespace::from(&matches);
        assert_eq!(namespace.get("spawn_amount"), Some(&json!(40)));
        assert_eq!(namespace.get("name"), Some(&json!("alpha")));
        assert_eq!(namespace.get("tags"), Some(&json!(["a", "b"])));
    }
}
