//! # Trellis Core
//!
//! The service registry behind Trellis.
//!
//! ## Overview
//!
//! Services are registered on a [`ServiceCollection`] and resolved from a
//! [`ServiceProvider`] built from it:
//!
//! ```text
//! ┌────────────────────┐  build_service_provider  ┌─────────────────┐
//! │ ServiceCollection  │─────────────────────────▶│ ServiceProvider │──▶ Arc<T>
//! │ (descriptors,      │        (snapshot)        │ (registry,      │
//! │  eager instances)  │                          │  singleton map) │
//! └────────────────────┘                          └─────────────────┘
//! ```
//!
//! - **Keys**: services are identified by type ([`ServiceKey`]), including
//!   trait objects such as `dyn Greeter`.
//! - **Injection**: a type describes its constructor through [`Injectable`];
//!   `Arc<T>` parameters are resolved from the registry.
//! - **Lifetimes**: singletons are built once per provider, transients on
//!   every fetch ([`Lifetime`]).
//! - **Configuration**: [`ServiceCollection::configure`] exposes a bound
//!   [`ConfigSchema`](trellis_config::ConfigSchema) type as a transient.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_core::{Injectable, ServiceCollection};
//!
//! #[derive(Injectable)]
//! struct Spawner;
//!
//! #[derive(Injectable)]
//! struct MassiveSpawner {
//!     spawner: Arc<Spawner>,
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.singleton::<Spawner>()?.singleton::<MassiveSpawner>()?;
//!
//! let provider = services.build_service_provider();
//! let spawner = provider.get_service::<MassiveSpawner>()?;
//! ```

extern crate self as trellis_core;

pub mod collection;
pub mod descriptor;
pub mod error;
pub mod inject;
pub mod key;
pub mod provider;
pub mod registry;

pub use collection::{Entry, ServiceCollection};
pub use descriptor::{Arg, ArgDescriptor, ArgValue, EagerEntry, ServiceDescriptor};
pub use error::{BoxError, ServiceError, ServiceResult};
pub use inject::{
    Dependencies, Dependency, Injectable, ParamInfo, Raw, Resolved, ServiceArc, Upcast,
};
pub use key::{Lifetime, ServiceKey};
pub use provider::ServiceProvider;
pub use registry::{RegistryStats, ServiceRegistry};

/// Derives [`Injectable`] from a struct's fields.
pub use trellis_macros::Injectable;
