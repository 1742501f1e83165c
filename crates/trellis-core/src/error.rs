//! Registry error types.

use thiserror::Error;
use trellis_config::ConfigError;

use crate::key::ServiceKey;

/// Error type returned by fallible constructors and factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while registering or resolving services.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A registration call was rejected.
    #[error("Failed to register `{key}`: {source}")]
    Registration {
        key: ServiceKey,
        #[source]
        source: BoxError,
    },

    /// A value does not have the type its consumer declares.
    #[error(
        "Type mismatch for `{key}`{}: expected `{expected}`, found `{found}`",
        position_suffix(.position)
    )]
    TypeMismatch {
        key: ServiceKey,
        position: Option<usize>,
        expected: &'static str,
        found: &'static str,
    },

    /// An explicit argument list does not match the constructor's arity.
    #[error("`{key}` takes {expected} constructor argument(s) but {found} were supplied")]
    Arity {
        key: ServiceKey,
        expected: usize,
        found: usize,
    },

    /// No service is registered under the requested key.
    #[error("Service not registered: `{key}`")]
    Lookup { key: ServiceKey },

    /// A constructor or factory failed.
    #[error("Failed to construct `{key}`: {source}")]
    Construction {
        key: ServiceKey,
        #[source]
        source: BoxError,
    },

    /// A constructor parameter cannot be resolved from the registry.
    #[error(
        "Cannot auto-wire parameter {position} of `{key}`: `{parameter}` is not a service \
         handle; supply explicit constructor arguments"
    )]
    TypeResolution {
        key: ServiceKey,
        position: usize,
        parameter: &'static str,
    },

    /// Binding a configured service failed.
    #[error("Failed to bind configuration `{key}`: {source}")]
    Configuration {
        key: ServiceKey,
        #[source]
        source: ConfigError,
    },
}

fn position_suffix(position: &Option<usize>) -> String {
    match position {
        Some(position) => format!(" (argument {position})"),
        None => String::new(),
    }
}

impl ServiceError {
    /// The service the error is about.
    pub fn key(&self) -> ServiceKey {
        match self {
            Self::Registration { key, .. }
            | Self::TypeMismatch { key, .. }
            | Self::Arity { key, .. }
            | Self::Lookup { key }
            | Self::Construction { key, .. }
            | Self::TypeResolution { key, .. }
            | Self::Configuration { key, .. } => *key,
        }
    }

    /// Creates a construction error.
    pub fn construction(key: ServiceKey, source: impl Into<BoxError>) -> Self {
        Self::Construction {
            key,
            source: source.into(),
        }
    }

    /// Creates a registration error.
    pub fn registration(key: ServiceKey, source: impl Into<BoxError>) -> Self {
        Self::Registration {
            key,
            source: source.into(),
        }
    }
}

/// Result type for registry operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_service() {
        let key = ServiceKey::of::<u8>();

        let lookup = ServiceError::Lookup { key };
        assert_eq!(lookup.to_string(), "Service not registered: `u8`");

        let arity = ServiceError::Arity {
            key,
            expected: 2,
            found: 1,
        };
        assert_eq!(
            arity.to_string(),
            "`u8` takes 2 constructor argument(s) but 1 were supplied"
        );

        let mismatch = ServiceError::TypeMismatch {
            key,
            position: Some(1),
            expected: "alloc::string::String",
            found: "u32",
        };
        assert!(mismatch.to_string().contains("(argument 1)"));
    }

    #[test]
    fn test_construction_keeps_source() {
        use std::error::Error;

        let err = ServiceError::construction(ServiceKey::of::<u8>(), "boom");
        assert_eq!(err.key(), ServiceKey::of::<u8>());
        assert_eq!(err.source().map(|s| s.to_string()), Some("boom".into()));
    }
}
