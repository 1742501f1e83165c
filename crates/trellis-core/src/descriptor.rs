//! Registered recipes for building services.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::{ServiceError, ServiceResult};
use crate::inject::{Dependencies, Injectable, Resolved, ServiceArc, Upcast};
use crate::key::{Lifetime, ServiceKey};

type ValueFn = Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;
type ConstructFn = Arc<dyn Fn(Vec<Resolved>) -> ServiceResult<ServiceArc> + Send + Sync>;
type ProvideFn = Arc<dyn Fn() -> ServiceResult<ServiceArc> + Send + Sync>;

/// How one constructor argument is obtained.
#[derive(Clone)]
pub enum ArgDescriptor {
    /// Fetched from the registry.
    Class(ServiceKey),
    /// A string, number or boolean passed as-is.
    Literal(ArgValue),
    /// Produced by calling a zero-argument function.
    Provider(ArgValue),
    /// Any other value passed as-is.
    Raw(ArgValue),
}

impl ArgDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Class(_) => "class",
            Self::Literal(_) => "literal",
            Self::Provider(_) => "provider",
            Self::Raw(_) => "raw",
        }
    }
}

impl fmt::Debug for ArgDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(key) => f.debug_tuple("Class").field(key).finish(),
            Self::Literal(value) | Self::Provider(value) | Self::Raw(value) => f
                .debug_tuple(self.kind())
                .field(&value.type_name)
                .finish(),
        }
    }
}

/// A value argument: cloned from a stored value or produced by a provider on
/// every construction.
#[derive(Clone)]
pub struct ArgValue {
    type_name: &'static str,
    produce: ValueFn,
}

impl ArgValue {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn produce(&self) -> Box<dyn Any + Send> {
        (self.produce)()
    }
}

/// An explicit constructor argument supplied at registration.
///
/// ```rust,ignore
/// services.transient_with_args::<Query, Query>(vec![
///     Arg::service::<Pool>(),
///     Arg::value("users".to_string()),
///     Arg::provider(|| Utc::now()),
/// ])?;
/// ```
#[derive(Clone, Debug)]
pub struct Arg {
    descriptor: ArgDescriptor,
    type_id: TypeId,
    type_name: &'static str,
}

impl Arg {
    /// Resolves `T` from the registry; matches an `Arc<T>` parameter.
    pub fn service<T: ?Sized + Send + Sync + 'static>() -> Self {
        Self {
            descriptor: ArgDescriptor::Class(ServiceKey::of::<T>()),
            type_id: TypeId::of::<Arc<T>>(),
            type_name: std::any::type_name::<Arc<T>>(),
        }
    }

    /// Passes a clone of `value` on every construction.
    ///
    /// Strings, numbers and booleans are recorded as literals, everything
    /// else as raw values. The value's type must equal the parameter type
    /// exactly, so pass `String` rather than `&str` for a `String` parameter.
    pub fn value<V: Clone + Send + Sync + 'static>(value: V) -> Self {
        let arg = ArgValue {
            type_name: std::any::type_name::<V>(),
            produce: Arc::new(move || Box::new(value.clone())),
        };
        let descriptor = if is_literal::<V>() {
            ArgDescriptor::Literal(arg)
        } else {
            ArgDescriptor::Raw(arg)
        };
        Self {
            descriptor,
            type_id: TypeId::of::<V>(),
            type_name: std::any::type_name::<V>(),
        }
    }

    /// Calls `provider` on every construction and passes its result.
    pub fn provider<V, F>(provider: F) -> Self
    where
        V: Send + 'static,
        F: Fn() -> V + Send + Sync + 'static,
    {
        Self {
            descriptor: ArgDescriptor::Provider(ArgValue {
                type_name: std::any::type_name::<V>(),
                produce: Arc::new(move || Box::new(provider())),
            }),
            type_id: TypeId::of::<V>(),
            type_name: std::any::type_name::<V>(),
        }
    }

    pub fn descriptor(&self) -> &ArgDescriptor {
        &self.descriptor
    }

    /// Type of the value this argument passes to the constructor.
    pub fn value_type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn value_type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn into_descriptor(self) -> ArgDescriptor {
        self.descriptor
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::value(value.to_string())
    }
}

fn is_literal<V: 'static>() -> bool {
    let id = TypeId::of::<V>();
    [
        TypeId::of::<String>(),
        TypeId::of::<&'static str>(),
        TypeId::of::<bool>(),
        TypeId::of::<char>(),
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<i128>(),
        TypeId::of::<isize>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<u128>(),
        TypeId::of::<usize>(),
        TypeId::of::<f32>(),
        TypeId::of::<f64>(),
    ]
    .contains(&id)
}

#[derive(Clone)]
pub(crate) enum Recipe {
    Constructor(ConstructFn),
    Provider(ProvideFn),
}

/// A deferred registration: what to build, and how.
#[derive(Clone)]
pub struct ServiceDescriptor {
    lifetime: Lifetime,
    concrete: &'static str,
    args: Vec<ArgDescriptor>,
    pub(crate) recipe: Recipe,
}

impl ServiceDescriptor {
    /// A descriptor that builds `C` and exposes it as `I`.
    pub(crate) fn constructed<I, C>(
        key: ServiceKey,
        lifetime: Lifetime,
        args: Vec<ArgDescriptor>,
    ) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: Injectable + Upcast<I>,
    {
        let construct: ConstructFn = Arc::new(move |values: Vec<Resolved>| {
            build::<I, C>(key, values)
        });

        Self {
            lifetime,
            concrete: std::any::type_name::<C>(),
            args,
            recipe: Recipe::Constructor(construct),
        }
    }

    /// A descriptor backed by a zero-argument function.
    pub(crate) fn provided<F>(lifetime: Lifetime, concrete: &'static str, provide: F) -> Self
    where
        F: Fn() -> ServiceResult<ServiceArc> + Send + Sync + 'static,
    {
        Self {
            lifetime,
            concrete,
            args: Vec::new(),
            recipe: Recipe::Provider(Arc::new(provide)),
        }
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Type name of what gets built.
    pub fn concrete(&self) -> &'static str {
        self.concrete
    }

    pub fn args(&self) -> &[ArgDescriptor] {
        &self.args
    }

    /// Whether the descriptor calls a provider function instead of a
    /// constructor.
    pub fn is_provided(&self) -> bool {
        matches!(self.recipe, Recipe::Provider(_))
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("lifetime", &self.lifetime)
            .field("concrete", &self.concrete)
            .field("args", &self.args)
            .field("provided", &self.is_provided())
            .finish()
    }
}

fn build<I, C>(key: ServiceKey, values: Vec<Resolved>) -> ServiceResult<ServiceArc>
where
    I: ?Sized + Send + Sync + 'static,
    C: Injectable + Upcast<I>,
{
    let deps = <C::Deps as Dependencies>::assemble(values).map_err(|position| {
        ServiceError::TypeMismatch {
            key,
            position: Some(position),
            expected: std::any::type_name::<C::Deps>(),
            found: "an argument of another type",
        }
    })?;
    let concrete = C::inject(deps).map_err(|source| ServiceError::Construction { key, source })?;
    let instance: Arc<I> = <C as Upcast<I>>::upcast(Arc::new(concrete));
    Ok(Arc::new(instance) as ServiceArc)
}

/// An instance held by the registry.
#[derive(Clone)]
pub struct EagerEntry {
    lifetime: Lifetime,
    instance: ServiceArc,
}

impl EagerEntry {
    pub(crate) fn singleton(instance: ServiceArc) -> Self {
        Self {
            lifetime: Lifetime::Singleton,
            instance,
        }
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn instance(&self) -> &ServiceArc {
        &self.instance
    }
}

impl fmt::Debug for EagerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerEntry")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Endpoint(&'static str);

    #[test]
    fn test_value_classification() {
        assert_eq!(Arg::value(String::from("users")).descriptor().kind(), "literal");
        assert_eq!(Arg::value(8080u16).descriptor().kind(), "literal");
        assert_eq!(Arg::value(Endpoint("db")).descriptor().kind(), "raw");
        assert_eq!(Arg::value(vec![1, 2]).descriptor().kind(), "raw");
        assert_eq!(Arg::provider(|| 5u8).descriptor().kind(), "provider");
        assert_eq!(Arg::service::<String>().descriptor().kind(), "class");
        assert_eq!(Arg::from("users").value_type_id(), TypeId::of::<String>());
    }

    #[test]
    fn test_values_are_reproduced() {
        let arg = Arg::value(String::from("users"));
        let ArgDescriptor::Literal(value) = arg.descriptor() else {
            panic!("expected a literal");
        };
        for _ in 0..2 {
            let produced = value.produce().downcast::<String>().unwrap();
            assert_eq!(*produced, "users");
        }
    }

    #[test]
    fn test_provider_runs_each_time() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let arg = Arg::provider(move || counter.fetch_add(1, Ordering::SeqCst));
        let ArgDescriptor::Provider(value) = arg.descriptor() else {
            panic!("expected a provider");
        };

        value.produce();
        value.produce();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
