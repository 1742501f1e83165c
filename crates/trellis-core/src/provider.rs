//! Read-only access to resolved services.

use std::sync::Arc;

use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::inject::ServiceArc;
use crate::key::ServiceKey;
use crate::registry::{RegistryStats, ServiceRegistry};

/// Resolves services from a snapshot taken by
/// [`ServiceCollection::build_service_provider`](crate::ServiceCollection::build_service_provider).
///
/// Registrations made on the collection afterwards are not visible here, and
/// singletons resolved here are not visible to other providers.
///
/// # Example
///
/// ```rust,ignore
/// let provider = services.build_service_provider();
/// let spawner = provider.get_service::<MassiveSpawner>()?;
/// let greeter = provider.get_service::<dyn Greeter>()?;
/// ```
#[derive(Debug)]
pub struct ServiceProvider {
    registry: ServiceRegistry,
}

impl ServiceProvider {
    pub(crate) fn new(registry: ServiceRegistry) -> Self {
        Self { registry }
    }

    /// Resolves the service registered as `T`.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Lookup`] if `T` (or a dependency) is not registered.
    /// - [`ServiceError::Construction`] if a constructor fails.
    /// - [`ServiceError::Configuration`] if a configured type fails to bind.
    pub fn get_service<T: ?Sized + Send + Sync + 'static>(&self) -> ServiceResult<Arc<T>> {
        let key = ServiceKey::of::<T>();
        debug!(service = %key, "Fetching service");
        let instance = self.registry.fetch_service(key)?;
        downcast::<T>(key, &instance)
    }

    /// Whether a service is registered as `T`.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.registry.contains(ServiceKey::of::<T>())
    }

    /// The underlying registry snapshot.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }
}

fn downcast<T: ?Sized + Send + Sync + 'static>(
    key: ServiceKey,
    instance: &ServiceArc,
) -> ServiceResult<Arc<T>> {
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(ServiceError::TypeMismatch {
            key,
            position: None,
            expected: std::any::type_name::<Arc<T>>(),
            found: "an instance of another type",
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::{BoxError, Injectable, ServiceCollection};

    const THREADS: usize = 8;

    fn assert_send_sync<T: Send + Sync>() {}

    static SLOW_BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct Slow {
        serial: usize,
    }

    impl Injectable for Slow {
        type Deps = ();

        fn inject((): ()) -> Result<Self, BoxError> {
            thread::sleep(Duration::from_millis(20));
            Ok(Self {
                serial: SLOW_BUILDS.fetch_add(1, Ordering::SeqCst),
            })
        }
    }

    static WARM_BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct Warm;

    impl Injectable for Warm {
        type Deps = ();

        fn inject((): ()) -> Result<Self, BoxError> {
            thread::sleep(Duration::from_millis(5));
            WARM_BUILDS.fetch_add(1, Ordering::SeqCst);
            Ok(Self)
        }
    }

    fn fetch_from_threads<T: Send + Sync + 'static>(provider: &Arc<ServiceProvider>) -> Vec<Arc<T>> {
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let provider = Arc::clone(provider);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    provider.get_service::<T>()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .collect()
    }

    #[test]
    fn test_provider_is_send_sync() {
        assert_send_sync::<ServiceProvider>();
        assert_send_sync::<ServiceRegistry>();
    }

    #[test]
    fn test_concurrent_first_fetch_shares_one_singleton() {
        let mut services = ServiceCollection::new();
        services.singleton::<Slow>().unwrap();
        let provider = Arc::new(services.build_service_provider());

        let fetched = fetch_from_threads::<Slow>(&provider);
        let first = &fetched[0];
        assert!(fetched.iter().all(|slow| Arc::ptr_eq(slow, first)));

        let later = provider.get_service::<Slow>().unwrap();
        assert!(Arc::ptr_eq(&later, first));
        assert!(later.serial < SLOW_BUILDS.load(Ordering::SeqCst));
        assert_eq!(provider.stats().eager, 1);

        // Racing constructors may run, but only the first stored one is handed out.
        let builds = SLOW_BUILDS.load(Ordering::SeqCst);
        assert!((1..=THREADS).contains(&builds));
    }

    #[test]
    fn test_prewarmed_singleton_is_built_once() {
        let mut services = ServiceCollection::new();
        services.singleton::<Warm>().unwrap();
        let provider = Arc::new(services.build_service_provider());

        let warmed = provider.get_service::<Warm>().unwrap();
        let fetched = fetch_from_threads::<Warm>(&provider);

        assert!(fetched.iter().all(|warm| Arc::ptr_eq(warm, &warmed)));
        assert_eq!(WARM_BUILDS.load(Ordering::SeqCst), 1);
    }
}
