//! Service registration.
//!
//! A [`ServiceCollection`] records how each service is built. Nothing is
//! constructed until a [`ServiceProvider`] asks for it, except pre-built
//! instances and singleton factories, which are stored eagerly.
//!
//! # Registration modes
//!
//! | Verb | Stored as |
//! |------|-----------|
//! | `singleton::<T>()` | deferred, auto-wired from `T::Deps` |
//! | `singleton_as::<dyn I, C>()` | deferred, `C` exposed as `I` |
//! | `singleton_with_args::<I, C>(args)` | deferred, explicit arguments |
//! | `singleton_instance(arc)` | eager |
//! | `singleton_factory(f)` | eager, `f` called immediately |
//! | `transient*` | deferred, rebuilt per fetch |
//! | `configure::<T>(data)` | deferred transient, bound per fetch |
//!
//! # Example
//!
//! ```rust,ignore
//! let mut services = ServiceCollection::new();
//! services
//!     .configure::<SpawnConfig>(context.get_section("spawner")?)?
//!     .singleton::<Spawner>()?
//!     .singleton::<MassiveSpawner>()?
//!     .transient_as::<dyn Greeter, English>()?;
//!
//! let provider = services.build_service_provider();
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;
use trellis_config::{ConfigInput, ConfigSchema, Configuration};

use crate::descriptor::{Arg, ArgDescriptor, EagerEntry, ServiceDescriptor};
use crate::error::{BoxError, ServiceError, ServiceResult};
use crate::inject::{Dependencies, Injectable, ServiceArc, Upcast};
use crate::key::{Lifetime, ServiceKey};
use crate::provider::ServiceProvider;
use crate::registry::ServiceRegistry;

/// Builder for a [`ServiceProvider`].
#[derive(Default)]
pub struct ServiceCollection {
    descriptors: HashMap<ServiceKey, ServiceDescriptor>,
    eager: HashMap<ServiceKey, EagerEntry>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Singletons ─────────────────────────────────────────────────────────

    /// Registers `T` as a singleton, auto-wiring its constructor.
    ///
    /// # Errors
    ///
    /// [`ServiceError::TypeResolution`] if a constructor parameter is not an
    /// `Arc<_>` service handle.
    pub fn singleton<T: Injectable>(&mut self) -> ServiceResult<&mut Self> {
        self.auto_wire::<T, T>(Lifetime::Singleton)
    }

    /// Registers `C` as the singleton implementation of `I`.
    pub fn singleton_as<I, C>(&mut self) -> ServiceResult<&mut Self>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Injectable + Upcast<I>,
    {
        self.auto_wire::<I, C>(Lifetime::Singleton)
    }

    /// Registers `C` as the singleton implementation of `I`, built from an
    /// explicit argument list.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Arity`] if `args` is not exactly as long as
    ///   `C::Deps`.
    /// - [`ServiceError::TypeMismatch`] if an argument's type differs from
    ///   its parameter.
    pub fn singleton_with_args<I, C>(&mut self, args: Vec<Arg>) -> ServiceResult<&mut Self>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Injectable + Upcast<I>,
    {
        self.with_args::<I, C>(Lifetime::Singleton, args)
    }

    /// Registers a pre-built instance.
    pub fn singleton_instance<I>(&mut self, instance: Arc<I>) -> &mut Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.insert_instance(ServiceKey::of::<I>(), instance)
    }

    /// Calls `factory` now and registers its result as the singleton `I`.
    pub fn singleton_factory<I, C, F>(&mut self, factory: F) -> &mut Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: Upcast<I>,
        F: FnOnce() -> C,
    {
        let instance = <C as Upcast<I>>::upcast(Arc::new(factory()));
        self.insert_instance(ServiceKey::of::<I>(), instance)
    }

    /// Fallible form of [`singleton_factory`](Self::singleton_factory).
    ///
    /// # Errors
    ///
    /// [`ServiceError::Registration`] carrying the factory's error.
    pub fn try_singleton_factory<I, C, E, F>(&mut self, factory: F) -> ServiceResult<&mut Self>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Upcast<I>,
        E: Into<BoxError>,
        F: FnOnce() -> Result<C, E>,
    {
        let key = ServiceKey::of::<I>();
        let concrete = factory().map_err(|source| ServiceError::registration(key, source))?;
        let instance = <C as Upcast<I>>::upcast(Arc::new(concrete));
        Ok(self.insert_instance(key, instance))
    }

    /// Registers each entry as a singleton.
    pub fn singletons<E>(&mut self, entries: E) -> ServiceResult<&mut Self>
    where
        E: IntoIterator<Item = Entry>,
    {
        for entry in entries {
            (entry.register)(self, Lifetime::Singleton)?;
        }
        Ok(self)
    }

    // ─── Transients ─────────────────────────────────────────────────────────

    /// Registers `T` as a transient, auto-wiring its constructor.
    pub fn transient<T: Injectable>(&mut self) -> ServiceResult<&mut Self> {
        self.auto_wire::<T, T>(Lifetime::Transient)
    }

    /// Registers `C` as the transient implementation of `I`.
    pub fn transient_as<I, C>(&mut self) -> ServiceResult<&mut Self>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Injectable + Upcast<I>,
    {
        self.auto_wire::<I, C>(Lifetime::Transient)
    }

    /// Registers `C` as the transient implementation of `I`, built from an
    /// explicit argument list on every fetch.
    pub fn transient_with_args<I, C>(&mut self, args: Vec<Arg>) -> ServiceResult<&mut Self>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Injectable + Upcast<I>,
    {
        self.with_args::<I, C>(Lifetime::Transient, args)
    }

    /// Registers a factory that is called on every fetch of `I`.
    pub fn transient_factory<I, C, F>(&mut self, factory: F) -> &mut Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: Upcast<I>,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let key = ServiceKey::of::<I>();
        let descriptor = ServiceDescriptor::provided(
            Lifetime::Transient,
            std::any::type_name::<C>(),
            move || {
                let instance = <C as Upcast<I>>::upcast(Arc::new(factory()));
                Ok(Arc::new(instance) as ServiceArc)
            },
        );
        self.insert_descriptor(key, descriptor)
    }

    /// Registers each entry as a transient.
    pub fn transients<E>(&mut self, entries: E) -> ServiceResult<&mut Self>
    where
        E: IntoIterator<Item = Entry>,
    {
        for entry in entries {
            (entry.register)(self, Lifetime::Transient)?;
        }
        Ok(self)
    }

    // ─── Configuration ──────────────────────────────────────────────────────

    /// Registers `T` as a transient bound from `data`.
    ///
    /// `data` is captured now; each fetch binds it onto a fresh `T`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Configuration`] if `data` cannot be viewed as a
    /// mapping. Schema problems surface when `T` is fetched.
    pub fn configure<T>(&mut self, data: impl ConfigInput) -> ServiceResult<&mut Self>
    where
        T: ConfigSchema + Send + Sync + 'static,
    {
        let key = ServiceKey::of::<T>();
        let configuration = Configuration::<T>::new(data)
            .map_err(|source| ServiceError::Configuration { key, source })?;

        let descriptor = ServiceDescriptor::provided(
            Lifetime::Transient,
            std::any::type_name::<T>(),
            move || {
                configuration
                    .retrieve_instance()
                    .map(|instance| Arc::new(Arc::new(instance)) as ServiceArc)
                    .map_err(|source| ServiceError::Configuration { key, source })
            },
        );
        Ok(self.insert_descriptor(key, descriptor))
    }

    // ─── Building ───────────────────────────────────────────────────────────

    /// Snapshots the registrations into a new provider.
    pub fn build_service_provider(&self) -> ServiceProvider {
        debug!(
            descriptors = self.descriptors.len(),
            eager = self.eager.len(),
            "Building service provider"
        );
        ServiceProvider::new(ServiceRegistry::new(
            self.descriptors.clone(),
            self.eager.clone(),
        ))
    }

    /// Whether a service is registered as `T`.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        let key = ServiceKey::of::<T>();
        self.descriptors.contains_key(&key) || self.eager.contains_key(&key)
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.descriptors.len() + self.eager.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    fn auto_wire<I, C>(&mut self, lifetime: Lifetime) -> ServiceResult<&mut Self>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Injectable + Upcast<I>,
    {
        let key = ServiceKey::of::<I>();
        let args = <C::Deps as Dependencies>::describe()
            .into_iter()
            .enumerate()
            .map(|(position, param)| {
                param
                    .service
                    .map(ArgDescriptor::Class)
                    .ok_or(ServiceError::TypeResolution {
                        key,
                        position,
                        parameter: param.type_name,
                    })
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        let descriptor = ServiceDescriptor::constructed::<I, C>(key, lifetime, args);
        Ok(self.insert_descriptor(key, descriptor))
    }

    fn with_args<I, C>(&mut self, lifetime: Lifetime, args: Vec<Arg>) -> ServiceResult<&mut Self>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Injectable + Upcast<I>,
    {
        let key = ServiceKey::of::<I>();
        let params = <C::Deps as Dependencies>::describe();
        if params.len() != args.len() {
            return Err(ServiceError::Arity {
                key,
                expected: params.len(),
                found: args.len(),
            });
        }

        for (position, (param, arg)) in params.iter().zip(&args).enumerate() {
            if param.type_id != arg.value_type_id() {
                return Err(ServiceError::TypeMismatch {
                    key,
                    position: Some(position),
                    expected: param.type_name,
                    found: arg.value_type_name(),
                });
            }
        }

        let args = args.into_iter().map(Arg::into_descriptor).collect();
        let descriptor = ServiceDescriptor::constructed::<I, C>(key, lifetime, args);
        Ok(self.insert_descriptor(key, descriptor))
    }

    fn insert_descriptor(&mut self, key: ServiceKey, descriptor: ServiceDescriptor) -> &mut Self {
        debug!(
            service = %key,
            concrete = descriptor.concrete(),
            lifetime = %descriptor.lifetime(),
            "Registered service"
        );
        self.eager.remove(&key);
        self.descriptors.insert(key, descriptor);
        self
    }

    fn insert_instance<I>(&mut self, key: ServiceKey, instance: Arc<I>) -> &mut Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        debug!(service = %key, "Registered service instance");
        self.descriptors.remove(&key);
        self.eager
            .insert(key, EagerEntry::singleton(Arc::new(instance) as ServiceArc));
        self
    }
}

impl fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCollection")
            .field("descriptors", &self.descriptors)
            .field("eager", &self.eager.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One element of a bulk registration.
///
/// ```rust,ignore
/// services.singletons([
///     Entry::of::<Spawner>(),
///     Entry::mapped::<dyn Greeter, English>(),
/// ])?;
/// ```
#[derive(Clone, Copy)]
pub struct Entry {
    key: ServiceKey,
    register: fn(&mut ServiceCollection, Lifetime) -> ServiceResult<()>,
}

impl Entry {
    /// `T` registered under its own type.
    pub fn of<T: Injectable>() -> Self {
        Self::mapped::<T, T>()
    }

    /// `C` registered as the implementation of `I`.
    pub fn mapped<I, C>() -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: Injectable + Upcast<I>,
    {
        Self {
            key: ServiceKey::of::<I>(),
            register: register_entry::<I, C>,
        }
    }

    pub fn key(&self) -> ServiceKey {
        self.key
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry").field("key", &self.key).finish()
    }
}

fn register_entry<I, C>(collection: &mut ServiceCollection, lifetime: Lifetime) -> ServiceResult<()>
where
    I: ?Sized + Send + Sync + 'static,
    C: Injectable + Upcast<I>,
{
    collection.auto_wire::<I, C>(lifetime).map(|_| ())
}
