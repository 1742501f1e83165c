//! The resolution engine behind a [`ServiceProvider`](crate::ServiceProvider).

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, error, trace};

use crate::descriptor::{ArgDescriptor, EagerEntry, Recipe, ServiceDescriptor};
use crate::error::{ServiceError, ServiceResult};
use crate::inject::{Resolved, ServiceArc};
use crate::key::{Lifetime, ServiceKey};

/// A snapshot of registrations that resolves services on demand.
///
/// Deferred descriptors are built the first time they are fetched.
/// Singletons are then promoted into the eager map and returned from there;
/// transients are rebuilt on every fetch.
///
/// The eager map is guarded by a lock that is never held while a constructor
/// runs, so concurrent first fetches of one singleton may construct it more
/// than once. Only the first stored instance is ever handed out.
/// Dependency cycles are not detected and recurse without bound.
pub struct ServiceRegistry {
    descriptors: HashMap<ServiceKey, ServiceDescriptor>,
    eager: RwLock<HashMap<ServiceKey, EagerEntry>>,
}

impl ServiceRegistry {
    pub(crate) fn new(
        descriptors: HashMap<ServiceKey, ServiceDescriptor>,
        eager: HashMap<ServiceKey, EagerEntry>,
    ) -> Self {
        Self {
            descriptors,
            eager: RwLock::new(eager),
        }
    }

    /// Resolves the instance registered under `key`.
    pub fn fetch_service(&self, key: ServiceKey) -> ServiceResult<ServiceArc> {
        let cached = self
            .eager
            .read()
            .get(&key)
            .map(|entry| entry.instance().clone());
        if let Some(instance) = cached {
            trace!(service = %key, "Returning eager instance");
            return Ok(instance);
        }

        let descriptor = self
            .descriptors
            .get(&key)
            .ok_or(ServiceError::Lookup { key })?;
        let instance = self.construct(key, descriptor)?;

        match descriptor.lifetime() {
            Lifetime::Singleton => {
                let mut eager = self.eager.write();
                let entry = eager
                    .entry(key)
                    .or_insert_with(|| EagerEntry::singleton(instance));
                Ok(entry.instance().clone())
            }
            Lifetime::Transient => Ok(instance),
        }
    }

    fn construct(&self, key: ServiceKey, descriptor: &ServiceDescriptor) -> ServiceResult<ServiceArc> {
        debug!(
            service = %key,
            concrete = descriptor.concrete(),
            lifetime = %descriptor.lifetime(),
            "Forming service"
        );

        let result = match &descriptor.recipe {
            Recipe::Constructor(build) => {
                let values = self.resolve_args(key, descriptor.args())?;
                build(values)
            }
            Recipe::Provider(provide) => provide(),
        };

        result.inspect_err(|err| {
            error!(service = %key, error = %err, "Failed to construct service");
        })
    }

    fn resolve_args(&self, key: ServiceKey, args: &[ArgDescriptor]) -> ServiceResult<Vec<Resolved>> {
        args.iter()
            .map(|arg| match arg {
                ArgDescriptor::Class(dependency) => self
                    .fetch_service(*dependency)
                    .map(Resolved::Service)
                    .inspect_err(|_| {
                        debug!(
                            service = %key,
                            dependency = %dependency,
                            "Dependency could not be resolved"
                        );
                    }),
                ArgDescriptor::Literal(value)
                | ArgDescriptor::Raw(value)
                | ArgDescriptor::Provider(value) => Ok(Resolved::Value(value.produce())),
            })
            .collect()
    }

    /// Whether anything is registered under `key`.
    pub fn contains(&self, key: ServiceKey) -> bool {
        self.descriptors.contains_key(&key) || self.eager.read().contains_key(&key)
    }

    /// The deferred descriptor for `key`, if any.
    pub fn descriptor(&self, key: ServiceKey) -> Option<&ServiceDescriptor> {
        self.descriptors.get(&key)
    }

    /// Returns statistics about the registry.
    pub fn stats(&self) -> RegistryStats {
        let eager = self.eager.read();
        let singletons = self
            .descriptors
            .values()
            .filter(|d| d.lifetime() == Lifetime::Singleton)
            .count();

        RegistryStats {
            descriptors: self.descriptors.len(),
            singletons,
            transients: self.descriptors.len() - singletons,
            eager: eager.len(),
        }
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("descriptors", &self.descriptors)
            .field("eager", &self.eager.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Statistics about a service registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of deferred descriptors.
    pub descriptors: usize,
    /// Deferred descriptors with a singleton lifetime.
    pub singletons: usize,
    /// Deferred descriptors with a transient lifetime.
    pub transients: usize,
    /// Instances already held by the registry.
    pub eager: usize,
}

impl std::fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Services: {} deferred ({} singleton, {} transient), {} resolved",
            self.descriptors, self.singletons, self.transients, self.eager
        )
    }
}
