//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration documents or binding them onto
/// schema types.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found at the specified path.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The document could not be read, parsed or merged.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// A configuration file exists but could not be read.
    #[error("Failed to read configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target type declares no fields to bind.
    #[error(
        "There are no known mapped properties of your configuration class `{type_name}`; \
         declare at least one field"
    )]
    Schema { type_name: &'static str },

    /// The binder was handed data it cannot view as a key/value mapping.
    #[error("Configuration input of type `{found}` is not supported{}", field_suffix(.field))]
    UnsupportedInput {
        found: &'static str,
        field: Option<String>,
    },

    /// More than one incoming key scrubs to the same field name.
    #[error("Field `{field}` is matched by more than one key: {keys:?}")]
    AmbiguousKey { field: String, keys: Vec<String> },

    /// A matched value could not be converted into the declared field type.
    #[error("Invalid value for field `{field}`: {source}")]
    InvalidValue {
        field: String,
        #[source]
        source: serde_json::Error,
    },
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(field) => format!(" (field `{field}`)"),
        None => String::new(),
    }
}

impl ConfigError {
    /// Creates a schema error for a type with no declared fields.
    pub fn schema(type_name: &'static str) -> Self {
        Self::Schema { type_name }
    }

    /// Creates an unsupported input error for a top-level value.
    pub fn unsupported(found: &'static str) -> Self {
        Self::UnsupportedInput { found, field: None }
    }

    /// Creates an unsupported input error for a nested field.
    pub fn unsupported_field(found: &'static str, field: impl Into<String>) -> Self {
        Self::UnsupportedInput {
            found,
            field: Some(field.into()),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidValue {
            field: field.into(),
            source,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_message_names_type() {
        let err = ConfigError::schema("app::Empty");
        let msg = err.to_string();
        assert!(msg.contains("no known mapped properties"));
        assert!(msg.contains("app::Empty"));
    }

    #[test]
    fn test_unsupported_message_mentions_field() {
        let top = ConfigError::unsupported("number");
        assert_eq!(
            top.to_string(),
            "Configuration input of type `number` is not supported"
        );

        let nested = ConfigError::unsupported_field("array", "complex");
        assert!(nested.to_string().ends_with("(field `complex`)"));
    }
}
