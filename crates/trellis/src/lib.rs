//! # Trellis
//!
//! A type-keyed service registry with JSON configuration binding.
//!
//! ## Overview
//!
//! ```text
//! settings.json ─┐
//!                ├─▶ ConfigurationContext ─▶ section ─┐
//! settings.<ctx>.json                                  │ configure::<T>()
//!                                                      ▼
//!                       ServiceCollection ──▶ ServiceProvider ──▶ Arc<T>
//! ```
//!
//! - **config**: documents, overlays, sections and schema binding
//!   ([`trellis_config`]).
//! - **core**: registration, constructor injection and lifetimes
//!   ([`trellis_core`]).
//! - **logging**: `tracing-subscriber` setup driven by the same document.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis::prelude::*;
//!
//! #[derive(ConfigSchema)]
//! struct SpawnConfig {
//!     spawn_amount: Option<u32>,
//! }
//!
//! #[derive(Injectable)]
//! struct Spawner {
//!     config: Arc<SpawnConfig>,
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = ConfigurationContext::new("settings.json");
//!     trellis::logging::init_from_section(&context.get_section("logging")?)?;
//!
//!     let mut services = ServiceCollection::new();
//!     services
//!         .configure::<SpawnConfig>(context.get_section("spawner")?)?
//!         .singleton::<Spawner>()?;
//!
//!     let provider = services.build_service_provider();
//!     let spawner = provider.get_service::<Spawner>()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `clap`: build a [`Namespace`](trellis_config::Namespace) from `clap::ArgMatches`
//! - `json-log`: JSON log output

pub mod logging;

pub use trellis_config as config;
pub use trellis_core as core;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use trellis::prelude::*;
/// ```
pub mod prelude {
    // Registry
    pub use trellis_core::{
        Arg, BoxError, Entry, Injectable, Lifetime, Raw, ServiceCollection, ServiceError,
        ServiceProvider, ServiceResult, interface,
    };

    // Configuration
    pub use trellis_config::{
        ConfigError, ConfigSchema, Configuration, ConfigurationContext, ConfigurationSection,
        Namespace, bind,
    };

    pub use crate::logging::{LoggingBuilder, LoggingConfig};
}
