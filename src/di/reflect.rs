//! Type metadata consumed by the container.
//!
//! The container never inspects types on its own. Concretions describe their
//! constructor through [`Injectable`] and already-built objects describe their
//! injectable members through [`Inject`]. Both are normally derived with
//! `#[derive(Injectable)]` / `#[derive(Inject)]`.

use crate::di::binding::{Abstraction, Binding};
use crate::di::key::{BindingId, TypeKey};
use crate::di::resolver::Request;
use crate::error::{InjexitError, Result};
use crate::lifecycle::Disposable;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

/// Type-erased shared value. The payload is always an `Arc<T>` for the type
/// `T` it was produced as.
pub(crate) type Erased = Arc<dyn Any + Send + Sync>;

pub(crate) fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Erased {
    Arc::new(value)
}

pub(crate) fn unerase<T: ?Sized + Send + Sync + 'static>(value: &Erased) -> Result<Arc<T>> {
    value
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(InjexitError::Downcast {
            type_name: std::any::type_name::<T>(),
        })
}

/// Shape of a dependency as declared by its consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum DependencyKind {
    /// Exactly one value, failure when unbound
    Single,
    /// One value or absence
    Optional,
    /// Every matching binding, in order
    List,
}

/// Capability to bind a concrete type to itself when nothing else matches.
#[derive(Clone, Copy)]
pub struct SelfBinding {
    concretion: TypeKey,
    build: fn() -> Binding,
}

impl SelfBinding {
    pub fn of<C: Injectable>() -> Self {
        Self {
            concretion: TypeKey::of::<C>(),
            build: Binding::implicit::<C>,
        }
    }

    pub fn concretion(&self) -> TypeKey {
        self.concretion
    }

    pub(crate) fn build(&self) -> Binding {
        (self.build)()
    }
}

impl std::fmt::Debug for SelfBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SelfBinding").field(&self.concretion).finish()
    }
}

/// A constructor parameter or injectable member
#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: &'static str,
    pub request: Request,
}

impl Dependency {
    pub fn single<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            name,
            request: Request::of::<T>(),
        }
    }

    pub fn optional<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            name,
            request: Request::of::<T>().optional(),
        }
    }

    pub fn list<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            name,
            request: Request::of::<T>().list(),
        }
    }

    pub fn with_id(mut self, id: impl Into<BindingId>) -> Self {
        self.request = self.request.with_id(id);
        self
    }

    pub fn self_binding(mut self, self_binding: SelfBinding) -> Self {
        self.request = self.request.fallback(self_binding);
        self
    }

    pub fn kind(&self) -> DependencyKind {
        self.request.kind
    }
}

/// Outcome of resolving one dependency
pub enum Resolved {
    Single(Erased),
    Absent,
    List(Vec<Erased>),
}

impl Resolved {
    pub fn into_single<T: ?Sized + Send + Sync + 'static>(self) -> Result<Arc<T>> {
        match self {
            Resolved::Single(value) => unerase::<T>(&value),
            _ => Err(InjexitError::Downcast {
                type_name: std::any::type_name::<T>(),
            }),
        }
    }

    pub fn into_optional<T: ?Sized + Send + Sync + 'static>(self) -> Result<Option<Arc<T>>> {
        match self {
            Resolved::Single(value) => unerase::<T>(&value).map(Some),
            Resolved::Absent => Ok(None),
            Resolved::List(_) => Err(InjexitError::Downcast {
                type_name: std::any::type_name::<T>(),
            }),
        }
    }

    pub fn into_list<T: ?Sized + Send + Sync + 'static>(self) -> Result<Vec<Arc<T>>> {
        match self {
            Resolved::List(values) => values.iter().map(unerase::<T>).collect(),
            _ => Err(InjexitError::Downcast {
                type_name: std::any::type_name::<Vec<Arc<T>>>(),
            }),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Resolved::Absent)
    }
}

/// Resolved constructor arguments, consumed front to back in declaration order
pub struct Arguments {
    values: VecDeque<Resolved>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<Resolved>) -> Self {
        Self {
            values: values.into(),
        }
    }

    fn next(&mut self, type_name: &'static str) -> Result<Resolved> {
        self.values
            .pop_front()
            .ok_or(InjexitError::Downcast { type_name })
    }

    pub fn next_single<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<T>> {
        self.next(std::any::type_name::<T>())?.into_single()
    }

    pub fn next_optional<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Option<Arc<T>>> {
        self.next(std::any::type_name::<T>())?.into_optional()
    }

    pub fn next_list<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Vec<Arc<T>>> {
        self.next(std::any::type_name::<T>())?.into_list()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Constructor metadata for a concrete type
///
/// Typically implemented with `#[derive(Injectable)]`.
///
/// # Example
/// ```
/// use injexit::{Arguments, Dependency, Injectable};
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync {}
///
/// struct Scheduler {
///     clock: Arc<dyn Clock>,
/// }
///
/// impl Injectable for Scheduler {
///     fn constructor() -> Vec<Dependency> {
///         vec![Dependency::single::<dyn Clock>("clock")]
///     }
///
///     fn construct(mut args: Arguments) -> anyhow::Result<Self> {
///         Ok(Self { clock: args.next_single::<dyn Clock>()? })
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Constructor parameters in the order [`construct`](Self::construct) consumes them
    fn constructor() -> Vec<Dependency>;

    /// Build an instance from resolved arguments
    ///
    /// # Errors
    /// Errors other than [`InjexitError`] are reported as construction failures.
    fn construct(args: Arguments) -> anyhow::Result<Self>;

    /// Additional abstractions every binding of this type also serves
    fn extra_bindings() -> Vec<Abstraction> {
        Vec::new()
    }

    /// The disposable view of an instance, when it owns resources
    fn disposer(this: &Arc<Self>) -> Option<Arc<dyn Disposable>> {
        let _ = this;
        None
    }
}

/// Injectable members of an already-constructed object
///
/// Typically implemented with `#[derive(Inject)]`.
pub trait Inject: Send {
    /// Members to fill, by index
    fn members(&self) -> Vec<Dependency>;

    /// Store the value resolved for member `index`
    fn assign(&mut self, index: usize, value: Resolved) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Shape: Send + Sync {
        fn sides(&self) -> u32;
    }

    struct Square;

    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    #[test]
    fn test_erased_trait_object_roundtrip() {
        let shape: Arc<dyn Shape> = Arc::new(Square);
        let erased = erase(Arc::clone(&shape));
        let back = unerase::<dyn Shape>(&erased).unwrap();
        assert!(Arc::ptr_eq(&shape, &back));
        assert_eq!(back.sides(), 4);
        assert!(matches!(
            unerase::<Square>(&erased),
            Err(InjexitError::Downcast { .. })
        ));
    }

    #[test]
    fn test_arguments_consumed_in_order() {
        let mut args = Arguments::new(vec![
            Resolved::Single(erase(Arc::new(7u32))),
            Resolved::Absent,
            Resolved::List(vec![erase(Arc::new(1u8)), erase(Arc::new(2u8))]),
        ]);
        assert_eq!(*args.next_single::<u32>().unwrap(), 7);
        assert!(args.next_optional::<u32>().unwrap().is_none());
        let list = args.next_list::<u8>().unwrap();
        assert_eq!(list.iter().map(|v| **v).collect::<Vec<_>>(), vec![1, 2]);
        assert!(args.is_empty());
        assert!(args.next_single::<u32>().is_err());
    }

    #[test]
    fn test_dependency_builders() {
        let dep = Dependency::list::<dyn Shape>("shapes").with_id("main");
        assert_eq!(dep.kind(), DependencyKind::List);
        assert_eq!(dep.request.id, Some(BindingId::named("main")));
        assert_eq!(dep.request.key, TypeKey::of::<dyn Shape>());
    }
}
