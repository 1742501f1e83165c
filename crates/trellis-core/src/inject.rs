//! Constructor injection.
//!
//! A service type implements [`Injectable`]: it names its constructor
//! parameters as a tuple of [`Dependency`] types and builds itself from the
//! resolved tuple. Parameters of the form `Arc<T>` are service handles and are
//! resolved from the registry; plain values such as `String` or `u32` can only
//! be supplied through an explicit argument list.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_core::{BoxError, Injectable};
//!
//! struct Repository {
//!     pool: Arc<Pool>,
//!     table: String,
//! }
//!
//! impl Injectable for Repository {
//!     type Deps = (Arc<Pool>, String);
//!
//!     fn inject((pool, table): Self::Deps) -> Result<Self, BoxError> {
//!         Ok(Self { pool, table })
//!     }
//! }
//! ```
//!
//! Most types can use `#[derive(Injectable)]` instead.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::BoxError;
use crate::key::ServiceKey;

/// A resolved service, type-erased.
///
/// The inner value is always an `Arc<T>` for the service's registered type
/// `T`, which lets trait-object services be stored alongside concrete ones.
pub type ServiceArc = Arc<dyn Any + Send + Sync>;

/// A constructor argument after resolution.
pub enum Resolved {
    /// A service fetched from the registry.
    Service(ServiceArc),
    /// A literal, raw or provider-produced value.
    Value(Box<dyn Any + Send>),
}

impl Resolved {
    /// Downcasts a plain value.
    pub fn into_value<V: 'static>(self) -> Option<V> {
        match self {
            Self::Value(value) => value.downcast::<V>().ok().map(|value| *value),
            Self::Service(_) => None,
        }
    }

    /// Downcasts a service handle.
    pub fn into_service<T: ?Sized + Send + Sync + 'static>(self) -> Option<Arc<T>> {
        match self {
            Self::Service(service) => service.downcast_ref::<Arc<T>>().cloned(),
            Self::Value(value) => value.downcast::<Arc<T>>().ok().map(|value| *value),
        }
    }
}

/// Describes one constructor parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamInfo {
    /// Type of the parameter itself, e.g. `Arc<Pool>` or `String`.
    pub type_id: TypeId,
    pub type_name: &'static str,
    /// The registry key to resolve it from, for service handles.
    pub service: Option<ServiceKey>,
}

impl ParamInfo {
    /// A parameter resolved from the registry as `Arc<T>`.
    pub fn service<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<Arc<T>>(),
            type_name: std::any::type_name::<Arc<T>>(),
            service: Some(ServiceKey::of::<T>()),
        }
    }

    /// A parameter that must be supplied explicitly.
    pub fn value<V: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<V>(),
            type_name: std::any::type_name::<V>(),
            service: None,
        }
    }
}

/// A type usable as a constructor parameter.
pub trait Dependency: Sized + 'static {
    fn describe() -> ParamInfo;

    fn from_resolved(resolved: Resolved) -> Option<Self>;
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Arc<T> {
    fn describe() -> ParamInfo {
        ParamInfo::service::<T>()
    }

    fn from_resolved(resolved: Resolved) -> Option<Self> {
        resolved.into_service::<T>()
    }
}

macro_rules! value_dependency {
    ( $($ty:ty),* $(,)? ) => {
        $(
            impl Dependency for $ty {
                fn describe() -> ParamInfo {
                    ParamInfo::value::<$ty>()
                }

                fn from_resolved(resolved: Resolved) -> Option<Self> {
                    resolved.into_value()
                }
            }
        )*
    };
}

value_dependency!(
    String, &'static str, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128,
    usize, f32, f64,
);

impl<T: Send + 'static> Dependency for Vec<T> {
    fn describe() -> ParamInfo {
        ParamInfo::value::<Self>()
    }

    fn from_resolved(resolved: Resolved) -> Option<Self> {
        resolved.into_value()
    }
}

impl<T: Send + 'static> Dependency for Option<T> {
    fn describe() -> ParamInfo {
        ParamInfo::value::<Self>()
    }

    fn from_resolved(resolved: Resolved) -> Option<Self> {
        resolved.into_value()
    }
}

/// Wraps an arbitrary value parameter that is not one of the built-in value
/// types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Raw<T>(pub T);

impl<T> std::ops::Deref for Raw<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Send + 'static> Dependency for Raw<T> {
    fn describe() -> ParamInfo {
        ParamInfo::value::<Self>()
    }

    fn from_resolved(resolved: Resolved) -> Option<Self> {
        resolved.into_value()
    }
}

/// An ordered list of constructor parameters.
///
/// Implemented for tuples of up to twelve [`Dependency`] types.
pub trait Dependencies: Sized {
    fn describe() -> Vec<ParamInfo>;

    /// Builds the tuple from resolved arguments, or returns the position of
    /// the first argument that does not fit.
    fn assemble(values: Vec<Resolved>) -> Result<Self, usize>;
}

macro_rules! impl_dependencies {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
        impl<$($ty: Dependency,)*> Dependencies for ($($ty,)*) {
            fn describe() -> Vec<ParamInfo> {
                vec![$($ty::describe(),)*]
            }

            fn assemble(values: Vec<Resolved>) -> Result<Self, usize> {
                let mut values = values.into_iter();
                let mut position = 0;
                $(
                    let Some($ty) = values.next().and_then($ty::from_resolved) else {
                        return Err(position);
                    };
                    position += 1;
                )*
                Ok(($($ty,)*))
            }
        }
    };
}

impl_dependencies!();
impl_dependencies!(T1);
impl_dependencies!(T1, T2);
impl_dependencies!(T1, T2, T3);
impl_dependencies!(T1, T2, T3, T4);
impl_dependencies!(T1, T2, T3, T4, T5);
impl_dependencies!(T1, T2, T3, T4, T5, T6);
impl_dependencies!(T1, T2, T3, T4, T5, T6, T7);
impl_dependencies!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_dependencies!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_dependencies!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_dependencies!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_dependencies!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);

/// A type the registry can construct.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Constructor parameters, in order.
    type Deps: Dependencies;

    /// Builds the service. An `Err` surfaces as
    /// [`ServiceError::Construction`](crate::ServiceError::Construction).
    fn inject(deps: Self::Deps) -> Result<Self, BoxError>;
}

/// Converts a shared concrete instance into a shared `I`.
///
/// Every type upcasts to itself. Trait-object interfaces are declared with
/// [`interface!`](crate::interface):
///
/// ```rust,ignore
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// trellis_core::interface!(dyn Greeter => English, French);
/// ```
pub trait Upcast<I: ?Sized>: Send + Sync + 'static {
    fn upcast(self: Arc<Self>) -> Arc<I>;
}

impl<T: Send + Sync + 'static> Upcast<T> for T {
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Declares that concrete types implement an interface for
/// [`ServiceCollection::singleton_as`](crate::ServiceCollection::singleton_as)
/// and friends.
#[macro_export]
macro_rules! interface {
    ( $iface:ty => $($concrete:ty),+ $(,)? ) => {
        $(
            impl $crate::Upcast<$iface> for $concrete {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$iface> {
                    self
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pool;

    #[test]
    fn test_service_param_describes_key() {
        let info = <Arc<Pool> as Dependency>::describe();
        assert_eq!(info.service, Some(ServiceKey::of::<Pool>()));
        assert_eq!(info.type_id, TypeId::of::<Arc<Pool>>());

        let value = <String as Dependency>::describe();
        assert_eq!(value.service, None);
        assert_eq!(value.type_id, TypeId::of::<String>());
    }

    #[test]
    fn test_assemble_tuple() {
        let pool: ServiceArc = Arc::new(Arc::new(Pool));
        let values = vec![
            Resolved::Service(pool),
            Resolved::Value(Box::new(String::from("users"))),
            Resolved::Value(Box::new(7u32)),
        ];

        let (_pool, table, port) = <(Arc<Pool>, String, u32)>::assemble(values)
            .ok()
            .unwrap();
        assert_eq!(table, "users");
        assert_eq!(port, 7);
    }

    #[test]
    fn test_assemble_reports_position() {
        let values = vec![
            Resolved::Value(Box::new(String::from("users"))),
            Resolved::Value(Box::new("not a u32")),
        ];
        assert_eq!(<(String, u32)>::assemble(values).err(), Some(1));
        assert_eq!(<(String,)>::assemble(Vec::new()).err(), Some(0));
    }

    #[test]
    fn test_describe_lists_parameters_in_order() {
        let params = <(Arc<Pool>, Raw<Vec<u8>>, bool)>::describe();
        assert_eq!(params.len(), 3);
        assert!(params[0].service.is_some());
        assert_eq!(params[1].type_id, TypeId::of::<Raw<Vec<u8>>>());
        assert_eq!(params[2].type_id, TypeId::of::<bool>());
        assert!(<()>::describe().is_empty());
    }
}
