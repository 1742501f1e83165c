//! Configuration documents and schema binding for Trellis.
//!
//! - [`ConfigurationContext`] loads a JSON document and merges an optional
//!   overlay selected by an explicit context or an environment variable.
//! - [`ConfigurationSection`] wraps a subtree addressed by a colon path.
//! - [`bind`] and [`Configuration`] populate [`ConfigSchema`] types from
//!   contexts, sections, JSON objects or a flat [`Namespace`].
//!
//! ```rust,ignore
//! use trellis_config::{ConfigSchema, ConfigurationContext, bind};
//!
//! #[derive(ConfigSchema)]
//! struct SpawnConfig {
//!     spawn_amount: Option<u32>,
//! }
//!
//! let context = ConfigurationContext::new("settings.json");
//! let spawn: SpawnConfig = bind(context.get_section("spawner")?)?;
//! ```

extern crate self as trellis_config;

pub mod binder;
pub mod context;
pub mod error;
pub mod input;
pub mod schema;
pub mod section;

pub use binder::{Configuration, bind};
pub use context::{ConfigurationContext, DEFAULT_CONTEXT_ENV_VAR, JsonLoader, merge_documents};
pub use error::{ConfigError, ConfigResult};
pub use input::{ConfigInput, Namespace};
pub use schema::{
    BoundField, BoundObject, ConfigSchema, FieldKind, FieldSpec, LeafKind, Schema, ValueBuilder,
    scrub_name,
};
pub use section::{ConfigurationSection, PATH_SEPARATOR};

/// Document values, as produced by [`ConfigSchema::to_value`].
pub use serde_json::Value;

/// Derives [`ConfigSchema`] for structs whose fields are all `Option<_>`.
pub use trellis_macros::ConfigSchema;
