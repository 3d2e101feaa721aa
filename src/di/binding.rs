use crate::di::container::{Container, WeakContainer};
use crate::di::key::{BindingId, TypeKey};
use crate::di::reflect::{erase, unerase, Arguments, Dependency, Erased, Injectable};
use crate::di::resolver::Resolver;
use crate::error::{InjexitError, Result};
use crate::lifecycle::Disposable;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Lifetime policy of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum Scope {
    /// A new instance per resolution
    #[default]
    Transient,
    /// One instance per owning container
    Singleton,
}

/// Whether a binding stands alone or contributes to a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum Aggregation {
    #[default]
    Standalone,
    ListMember,
}

/// Type alias for a function that turns an erased concretion into an erased
/// abstraction (usually an `Arc<dyn Trait>`).
type CastFn = Arc<dyn Fn(&Erased) -> Result<Erased> + Send + Sync>;

pub(crate) type FactoryFn = Arc<dyn Fn(&Resolver<'_>) -> anyhow::Result<Erased> + Send + Sync>;

/// An abstraction served by a binding together with the cast that produces it
#[derive(Clone)]
pub struct Abstraction {
    key: TypeKey,
    cast: CastFn,
}

impl Abstraction {
    /// Serve `T` from a concretion `C` through `cast`.
    ///
    /// ```
    /// use injexit::Abstraction;
    /// use std::sync::Arc;
    ///
    /// trait Greeter: Send + Sync {}
    /// struct English;
    /// impl Greeter for English {}
    ///
    /// let greeter = Abstraction::new::<English, dyn Greeter>(|e| e as Arc<dyn Greeter>);
    /// ```
    pub fn new<C, T>(cast: impl Fn(Arc<C>) -> Arc<T> + Send + Sync + 'static) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            key: TypeKey::of::<T>(),
            cast: Arc::new(move |value: &Erased| Ok(erase(cast(unerase::<C>(value)?)))),
        }
    }

    /// Serve `T` as itself
    pub fn identity<T: ?Sized + Send + Sync + 'static>() -> Self {
        Self::new::<T, T>(|value| value)
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub(crate) fn apply(&self, concrete: &Erased) -> Result<Erased> {
        (self.cast)(concrete)
    }

    /// Cast with `self`, then with `outer`; serves `outer`'s type
    pub(crate) fn then(self, outer: Abstraction) -> Abstraction {
        let inner = self.cast;
        let cast = outer.cast;
        Abstraction {
            key: outer.key,
            cast: Arc::new(move |value: &Erased| cast(&inner(value)?)),
        }
    }
}

impl std::fmt::Debug for Abstraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Abstraction").field(&self.key).finish()
    }
}

pub(crate) enum Producer {
    Constructor {
        describe: fn() -> Vec<Dependency>,
        construct: fn(Arguments) -> anyhow::Result<Erased>,
        disposer: fn(&Erased) -> Option<Arc<dyn Disposable>>,
    },
    Factory(FactoryFn),
    Instance(Erased),
    Reference {
        target: BindingId,
        /// Cast supplied by the reference itself, from the named concretion
        cast: Option<(TypeKey, Abstraction)>,
    },
}

impl Producer {
    pub(crate) fn constructor<C: Injectable>() -> Self {
        Producer::Constructor {
            describe: C::constructor,
            construct: construct_erased::<C>,
            disposer: disposer_erased::<C>,
        }
    }
}

fn construct_erased<C: Injectable>(args: Arguments) -> anyhow::Result<Erased> {
    C::construct(args).map(|value| erase(Arc::new(value)))
}

fn disposer_erased<C: Injectable>(value: &Erased) -> Option<Arc<dyn Disposable>> {
    unerase::<C>(value).ok().and_then(|value| C::disposer(&value))
}

/// Container a binding resolves its dependencies through
#[derive(Clone)]
pub(crate) enum OverrideResolver {
    Owned(Container),
    /// The owning container or one of its ancestors; held weakly so the
    /// binding does not keep its own container alive
    Lineage(WeakContainer),
}

impl OverrideResolver {
    pub(crate) fn container(&self) -> Result<Container> {
        match self {
            OverrideResolver::Owned(container) => Ok(container.clone()),
            OverrideResolver::Lineage(weak) => weak.upgrade().ok_or(InjexitError::Disposed),
        }
    }
}

pub(crate) struct BindingConfig {
    pub(crate) abstractions: Vec<Abstraction>,
    pub(crate) id: Option<BindingId>,
    pub(crate) scope: Scope,
    pub(crate) eager: bool,
    pub(crate) aggregation: Aggregation,
    pub(crate) override_resolver: Option<OverrideResolver>,
}

/// A registered recipe for producing instances of one concretion.
pub struct Binding {
    concretion: Option<TypeKey>,
    declared: TypeKey,
    pub(crate) producer: Producer,
    implicit: bool,
    config: RwLock<BindingConfig>,
    instance: Mutex<Option<Erased>>,
}

impl Binding {
    pub(crate) fn new(
        declared: Abstraction,
        concretion: Option<TypeKey>,
        producer: Producer,
        scope: Scope,
    ) -> Self {
        Self {
            concretion,
            declared: declared.key(),
            producer,
            implicit: false,
            config: RwLock::new(BindingConfig {
                abstractions: vec![declared],
                id: None,
                scope,
                eager: false,
                aggregation: Aggregation::Standalone,
                override_resolver: None,
            }),
            instance: Mutex::new(None),
        }
    }

    /// Transient self-binding synthesized for an unbound concrete type
    pub(crate) fn implicit<C: Injectable>() -> Self {
        let mut binding = Self::new(
            Abstraction::identity::<C>(),
            Some(TypeKey::of::<C>()),
            Producer::constructor::<C>(),
            Scope::Transient,
        );
        binding.implicit = true;
        binding.config_mut().abstractions.extend(C::extra_bindings());
        binding
    }

    pub(crate) fn config(&self) -> RwLockReadGuard<'_, BindingConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn config_mut(&self) -> RwLockWriteGuard<'_, BindingConfig> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether this binding serves `key` under the given qualifier
    pub(crate) fn matches(&self, key: &TypeKey, id: Option<&BindingId>) -> bool {
        let config = self.config();
        config.id.as_ref() == id && config.abstractions.iter().any(|a| a.key() == *key)
    }

    pub(crate) fn abstraction(&self, key: &TypeKey) -> Option<Abstraction> {
        self.config()
            .abstractions
            .iter()
            .find(|a| a.key() == *key)
            .cloned()
    }

    pub(crate) fn cached(&self) -> Option<Erased> {
        self.instance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn store(&self, value: Erased) {
        *self.instance.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub(crate) fn clear_cache(&self) {
        self.instance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn concretion(&self) -> Option<TypeKey> {
        self.concretion
    }

    /// Concretion name, or the type declared at bind time for instance,
    /// factory and reference bindings.
    pub fn concretion_name(&self) -> &'static str {
        self.concretion.unwrap_or(self.declared).name()
    }

    pub fn declared(&self) -> TypeKey {
        self.declared
    }

    pub fn id(&self) -> Option<BindingId> {
        self.config().id.clone()
    }

    pub fn scope(&self) -> Scope {
        self.config().scope
    }

    pub fn aggregation(&self) -> Aggregation {
        self.config().aggregation
    }

    pub fn is_eager(&self) -> bool {
        self.config().eager
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.producer, Producer::Reference { .. })
    }

    pub fn abstractions(&self) -> Vec<TypeKey> {
        self.config().abstractions.iter().map(Abstraction::key).collect()
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.config();
        f.debug_struct("Binding")
            .field("concretion", &self.concretion_name())
            .field("abstractions", &config.abstractions)
            .field("id", &config.id)
            .field("scope", &config.scope)
            .field("eager", &config.eager)
            .field("aggregation", &config.aggregation)
            .finish()
    }
}

/// Fluent configuration of a binding that is already registered
///
/// `C` is the type values are produced as, which is what extra abstractions
/// added with [`also`](Self::also) cast from.
///
/// # Example
/// ```rust,ignore
/// let id = container
///     .bind::<dyn Repository, SqlRepository>(|r| r as Arc<dyn Repository>)
///     .as_single()
///     .id();
/// ```
pub struct BindingBuilder<'c, C: ?Sized> {
    container: &'c Container,
    binding: Arc<Binding>,
    _produces: PhantomData<fn(Arc<C>)>,
}

impl<'c, C: ?Sized + Send + Sync + 'static> BindingBuilder<'c, C> {
    pub(crate) fn new(container: &'c Container, binding: Arc<Binding>) -> Self {
        Self {
            container,
            binding,
            _produces: PhantomData,
        }
    }

    /// Return the binding's id, minting and assigning a unique one if it has none
    pub fn id(self) -> BindingId {
        if let Some(id) = self.binding.id() {
            return id;
        }
        let id = BindingId::new();
        self.assign_id(id.clone());
        id
    }

    /// Qualify the binding with `id`
    pub fn with_id(self, id: impl Into<BindingId>) -> Self {
        self.assign_id(id.into());
        self
    }

    fn assign_id(&self, id: BindingId) {
        let previous = self.binding.config_mut().id.replace(id.clone());
        self.container
            .index_binding(previous.as_ref(), &id, &self.binding);
    }

    pub fn as_single(self) -> Self {
        self.binding.config_mut().scope = Scope::Singleton;
        self
    }

    pub fn as_transient(self) -> Self {
        let mut config = self.binding.config_mut();
        config.scope = Scope::Transient;
        config.eager = false;
        drop(config);
        self
    }

    /// Instantiate during [`Container::instantiate_eager_singles`]; implies singleton scope
    pub fn eager(self) -> Self {
        let mut config = self.binding.config_mut();
        config.scope = Scope::Singleton;
        config.eager = true;
        drop(config);
        self
    }

    pub fn into_list(self) -> Self {
        self.binding.config_mut().aggregation = Aggregation::ListMember;
        self
    }

    /// Also serve `U`, cast from the produced value
    pub fn also<U: ?Sized + Send + Sync + 'static>(
        self,
        cast: impl Fn(Arc<C>) -> Arc<U> + Send + Sync + 'static,
    ) -> Self {
        let abstraction = Abstraction::new::<C, U>(cast);
        let mut config = self.binding.config_mut();
        config.abstractions.retain(|a| a.key() != abstraction.key());
        config.abstractions.push(abstraction);
        drop(config);
        self
    }

    /// Resolve this binding's dependencies through `resolver` first
    ///
    /// When `resolver` is the owning container or one of its ancestors it is
    /// held weakly; resolving after it is gone fails with `Disposed`.
    pub fn with(self, resolver: &Container) -> Self {
        let in_lineage = self
            .container
            .lineage()
            .iter()
            .any(|container| container.ptr_eq(resolver));
        let override_resolver = if in_lineage {
            OverrideResolver::Lineage(resolver.downgrade())
        } else {
            OverrideResolver::Owned(resolver.clone())
        };
        self.binding.config_mut().override_resolver = Some(override_resolver);
        self
    }

    /// Resolve this binding's dependencies through a child of the owning
    /// container configured by `configure`
    pub fn with_bindings(self, configure: impl FnOnce(&Container)) -> Self {
        let child = self.container.using(configure);
        self.with(&child)
    }

    pub fn binding(&self) -> &Arc<Binding> {
        &self.binding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn name(&self) -> &'static str;
    }

    struct Plain;

    impl Named for Plain {
        fn name(&self) -> &'static str {
            "plain"
        }
    }

    impl Injectable for Plain {
        fn constructor() -> Vec<Dependency> {
            Vec::new()
        }

        fn construct(_args: Arguments) -> anyhow::Result<Self> {
            Ok(Plain)
        }

        fn extra_bindings() -> Vec<Abstraction> {
            vec![Abstraction::new::<Plain, dyn Named>(|p| p as Arc<dyn Named>)]
        }
    }

    #[test]
    fn test_abstraction_cast() {
        let named = Abstraction::new::<Plain, dyn Named>(|p| p as Arc<dyn Named>);
        let concrete = erase(Arc::new(Plain));
        let cast = named.apply(&concrete).unwrap();
        assert_eq!(unerase::<dyn Named>(&cast).unwrap().name(), "plain");
    }

    #[test]
    fn test_implicit_binding_serves_self_and_extras() {
        let binding = Binding::implicit::<Plain>();
        assert!(binding.is_implicit());
        assert_eq!(binding.scope(), Scope::Transient);
        assert!(binding.matches(&TypeKey::of::<Plain>(), None));
        assert!(binding.matches(&TypeKey::of::<dyn Named>(), None));
        assert!(!binding.matches(&TypeKey::of::<Plain>(), Some(&BindingId::named("x"))));
    }

    #[test]
    fn test_builder_configures_registered_binding() {
        let container = Container::new();
        let id = container
            .bind_self::<Plain>()
            .also::<dyn Named>(|p| p as Arc<dyn Named>)
            .eager()
            .into_list()
            .id();

        let binding = container.binding(&id).unwrap();
        assert_eq!(binding.scope(), Scope::Singleton);
        assert!(binding.is_eager());
        assert_eq!(binding.aggregation(), Aggregation::ListMember);
        assert_eq!(binding.id(), Some(id));
        assert_eq!(binding.abstractions().len(), 2);
        assert_eq!(binding.scope().to_string(), "Singleton");
        assert_eq!(binding.aggregation().to_string(), "ListMember");
    }

    #[test]
    fn test_reassigned_id_moves_index() {
        let container = Container::new();
        let builder = container.bind_self::<Plain>().with_id("first");
        let builder = builder.with_id("second");
        assert!(builder.binding().matches(&TypeKey::of::<Plain>(), Some(&BindingId::named("second"))));
        assert!(container.binding(&BindingId::named("first")).is_none());
        assert!(container.binding(&BindingId::named("second")).is_some());
    }
}
