use crate::di::binding::{Abstraction, Aggregation, Binding, Producer, Scope};
use crate::di::container::Container;
use crate::di::key::{BindingId, TypeKey};
use crate::di::reflect::{Arguments, DependencyKind, Erased, Injectable, Resolved, SelfBinding};
use crate::error::{Chain, InjexitError, Result};
use std::sync::Arc;

/// What to resolve and how
#[derive(Debug, Clone)]
pub struct Request {
    pub key: TypeKey,
    pub id: Option<BindingId>,
    pub kind: DependencyKind,
    pub self_binding: Option<SelfBinding>,
}

impl Request {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            id: None,
            kind: DependencyKind::Single,
            self_binding: None,
        }
    }

    /// Request a concrete type, binding it to itself when nothing matches
    pub fn concrete<C: Injectable>() -> Self {
        Self::of::<C>().fallback(SelfBinding::of::<C>())
    }

    pub fn with_id(mut self, id: impl Into<BindingId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.kind = DependencyKind::Optional;
        self
    }

    pub fn list(mut self) -> Self {
        self.kind = DependencyKind::List;
        self
    }

    pub fn fallback(mut self, self_binding: SelfBinding) -> Self {
        self.self_binding = Some(self_binding);
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.self_binding = None;
        self
    }
}

/// A terminal binding chosen for a request, with the container that owns it
#[derive(Clone)]
struct Target {
    binding: Arc<Binding>,
    owner: Container,
    key: TypeKey,
    /// Cast supplied by a reference binding, used when the target does not
    /// serve `key` itself
    cast: Option<Abstraction>,
}

enum Plan {
    Absent,
    One(Target),
    Many(Vec<Target>),
}

/// A resolved recipe, invocable any number of times.
///
/// Produced by [`Container::resolve_factory`]; every [`invoke`](Self::invoke)
/// honours the scope of the selected bindings.
pub struct Factory {
    requester: Container,
    request: Request,
    plan: Plan,
}

impl Factory {
    pub fn invoke(&self) -> Result<Resolved> {
        self.requester.ensure_live()?;
        self.invoke_from(None)
    }

    pub(crate) fn invoke_from(&self, frame: Option<&Frame<'_>>) -> Result<Resolved> {
        match &self.plan {
            Plan::Absent => Ok(Resolved::Absent),
            Plan::One(target) => target
                .materialize(&self.requester, frame)
                .map(Resolved::Single),
            Plan::Many(targets) => targets
                .iter()
                .map(|target| target.materialize(&self.requester, frame))
                .collect::<Result<Vec<_>>>()
                .map(Resolved::List),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Whether the request was optional and nothing matched
    pub fn is_absent(&self) -> bool {
        matches!(self.plan, Plan::Absent)
    }

    /// Number of bindings this factory draws from
    pub fn len(&self) -> usize {
        match &self.plan {
            Plan::Absent => 0,
            Plan::One(_) => 1,
            Plan::Many(targets) => targets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Identity {
    Registered(usize),
    Implicit(TypeKey),
}

impl Identity {
    fn of(binding: &Arc<Binding>) -> Self {
        match binding.concretion() {
            Some(concretion) if binding.is_implicit() => Identity::Implicit(concretion),
            _ => Identity::Registered(Arc::as_ptr(binding) as usize),
        }
    }
}

/// One in-flight construction on the current call stack.
pub(crate) struct Frame<'a> {
    identity: Identity,
    key: TypeKey,
    depth: usize,
    parent: Option<&'a Frame<'a>>,
}

fn chain_of(frame: Option<&Frame<'_>>, leaf: Option<TypeKey>) -> Chain {
    let mut names: Vec<&'static str> = leaf.map(|key| key.name()).into_iter().collect();
    let mut cursor = frame;
    while let Some(f) = cursor {
        names.push(f.key.name());
        cursor = f.parent;
    }
    names.reverse();
    Chain(names)
}

/// The abstraction types forming a cycle back to `identity`, in visitation order
fn detect_cycle(frame: Option<&Frame<'_>>, identity: Identity) -> Option<Vec<&'static str>> {
    let mut path = Vec::new();
    let mut cursor = frame;
    while let Some(f) = cursor {
        path.push(f.key.name());
        if f.identity == identity {
            path.reverse();
            return Some(path);
        }
        cursor = f.parent;
    }
    None
}

fn construction_error(err: anyhow::Error, frame: &Frame<'_>) -> InjexitError {
    match err.downcast::<InjexitError>() {
        Ok(err) => err,
        Err(source) => InjexitError::ConstructionFailure {
            abstraction: frame.key.name(),
            chain: chain_of(Some(frame), None),
            source,
        },
    }
}

impl Target {
    fn materialize(&self, requester: &Container, frame: Option<&Frame<'_>>) -> Result<Erased> {
        let identity = Identity::of(&self.binding);
        if let Some(cycle) = detect_cycle(frame, identity) {
            tracing::warn!("Circular dependency detected: {}", cycle.join(" -> "));
            return Err(InjexitError::CircularDependency { cycle });
        }

        let depth = frame.map_or(0, |f| f.depth + 1);
        let limit = requester.settings().max_depth;
        if depth >= limit {
            return Err(InjexitError::DepthExceeded {
                limit,
                chain: chain_of(frame, Some(self.key)),
            });
        }

        let abstraction = match &self.cast {
            Some(cast) => cast.clone(),
            None => self.binding.abstraction(&self.key).ok_or_else(|| {
                InjexitError::NoBindingFound {
                    abstraction: self.key.name(),
                    id: self.binding.id(),
                    chain: chain_of(frame, Some(self.key)),
                }
            })?,
        };

        let frame = Frame {
            identity,
            key: self.key,
            depth,
            parent: frame,
        };

        tracing::trace!(
            abstraction = self.key.name(),
            concretion = self.binding.concretion_name(),
            scope = %self.binding.scope(),
            "Materializing"
        );

        let concrete = match self.binding.scope() {
            Scope::Singleton => self
                .owner
                .singleton(&self.binding, || self.construct(&self.owner, &frame))?,
            Scope::Transient => self.construct(requester, &frame)?,
        };

        abstraction.apply(&concrete)
    }

    fn construct(&self, context: &Container, frame: &Frame<'_>) -> Result<Erased> {
        let override_resolver = self
            .binding
            .config()
            .override_resolver
            .clone()
            .map(|resolver| resolver.container())
            .transpose()?;
        let context = override_resolver.as_ref().unwrap_or(context);

        match &self.binding.producer {
            Producer::Instance(value) => Ok(Arc::clone(value)),
            Producer::Constructor {
                describe,
                construct,
                ..
            } => {
                let args = describe()
                    .iter()
                    .map(|dependency| {
                        context
                            .factory_in(&dependency.request, Some(frame))?
                            .invoke_from(Some(frame))
                    })
                    .collect::<Result<Vec<_>>>()?;
                construct(Arguments::new(args)).map_err(|e| construction_error(e, frame))
            }
            Producer::Factory(factory) => {
                let resolver = Resolver {
                    container: context,
                    frame: Some(frame),
                };
                factory(&resolver).map_err(|e| construction_error(e, frame))
            }
            Producer::Reference { target, .. } => Err(InjexitError::UnboundReference {
                binding: target.clone(),
            }),
        }
    }
}

/// Resolution handle passed to factory bindings.
///
/// Resolving through it keeps the current resolution chain, so cycles that
/// pass through user factories are still detected.
pub struct Resolver<'a> {
    container: &'a Container,
    frame: Option<&'a Frame<'a>>,
}

impl<'a> Resolver<'a> {
    pub fn container(&self) -> &Container {
        self.container
    }

    pub fn resolve_request(&self, request: &Request) -> Result<Resolved> {
        self.container
            .factory_in(request, self.frame)?
            .invoke_from(self.frame)
    }

    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve_request(&Request::of::<T>())?.into_single()
    }

    pub fn resolve_id<T: ?Sized + Send + Sync + 'static>(
        &self,
        id: impl Into<BindingId>,
    ) -> Result<Arc<T>> {
        self.resolve_request(&Request::of::<T>().with_id(id))?
            .into_single()
    }

    pub fn try_resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        self.resolve_request(&Request::of::<T>().optional())?
            .into_optional()
    }

    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        self.resolve_request(&Request::of::<T>().list())?.into_list()
    }

    pub fn instantiate<C: Injectable>(&self) -> Result<Arc<C>> {
        self.resolve_request(&Request::concrete::<C>())?
            .into_single()
    }
}

impl Container {
    /// Select the binding(s) satisfying `request` and return a factory for them
    ///
    /// # Errors
    /// Fails when nothing matches a required request, or when a matched
    /// reference binding cannot be followed.
    pub fn resolve_factory(&self, request: &Request) -> Result<Factory> {
        self.factory_in(request, None)
    }

    pub(crate) fn factory_in(
        &self,
        request: &Request,
        frame: Option<&Frame<'_>>,
    ) -> Result<Factory> {
        self.ensure_live()?;
        tracing::trace!(abstraction = request.key.name(), kind = %request.kind, "Resolving");

        let plan = match request.kind {
            DependencyKind::List => Plan::Many(self.collect_all(request)?),
            DependencyKind::Single | DependencyKind::Optional => {
                match self.find_standalone(request)? {
                    Some(target) => Plan::One(target),
                    None if request.kind == DependencyKind::Optional => Plan::Absent,
                    None => match request.self_binding {
                        Some(self_binding) if self.settings().self_binding_fallback => {
                            tracing::trace!(
                                concretion = self_binding.concretion().name(),
                                "Falling back to self-binding"
                            );
                            Plan::One(Target {
                                binding: Arc::new(self_binding.build()),
                                owner: self.clone(),
                                key: request.key,
                                cast: None,
                            })
                        }
                        _ => {
                            return Err(InjexitError::NoBindingFound {
                                abstraction: request.key.name(),
                                id: request.id.clone(),
                                chain: chain_of(frame, Some(request.key)),
                            });
                        }
                    },
                }
            }
        };

        Ok(Factory {
            requester: self.clone(),
            request: request.clone(),
            plan,
        })
    }

    /// Most recently registered standalone match, nearest container first
    fn find_standalone(&self, request: &Request) -> Result<Option<Target>> {
        for container in self.lineage() {
            let found = container
                .bindings_snapshot()
                .into_iter()
                .rev()
                .find(|b| {
                    b.aggregation() == Aggregation::Standalone
                        && b.matches(&request.key, request.id.as_ref())
                });
            if let Some(binding) = found {
                return container.follow(binding, request.key).map(Some);
            }
        }
        Ok(None)
    }

    /// Every match in registration order, nearest container first
    fn collect_all(&self, request: &Request) -> Result<Vec<Target>> {
        let mut targets = Vec::new();
        for container in self.lineage() {
            for binding in container.bindings_snapshot() {
                if binding.matches(&request.key, request.id.as_ref()) {
                    targets.push(container.follow(binding, request.key)?);
                }
            }
        }
        Ok(targets)
    }

    /// Chase reference bindings until a terminal binding is found and check
    /// that it can be served as `key`
    fn follow(&self, binding: Arc<Binding>, key: TypeKey) -> Result<Target> {
        let declared = binding.declared();
        if binding.is_reference() && key != declared {
            if let Some(outer) = binding.abstraction(&key) {
                // Extra abstractions of a reference cast from its declared type
                let mut target = self.follow(binding, declared)?;
                let inner = target
                    .cast
                    .take()
                    .or_else(|| target.binding.abstraction(&declared))
                    .ok_or_else(|| InjexitError::NoBindingFound {
                        abstraction: declared.name(),
                        id: target.binding.id(),
                        chain: Chain(vec![key.name(), declared.name()]),
                    })?;
                target.cast = Some(inner.then(outer));
                target.key = key;
                return Ok(target);
            }
        }

        let mut owner = self.clone();
        let mut binding = binding;
        let mut visited: Vec<BindingId> = Vec::new();
        let mut path: Vec<&'static str> = Vec::new();
        let mut reference_cast: Option<(TypeKey, Abstraction)> = None;

        while let Producer::Reference { target, cast } = &binding.producer {
            path.push(binding.concretion_name());
            if visited.contains(target) {
                return Err(InjexitError::CircularDependency { cycle: path });
            }
            visited.push(target.clone());
            if reference_cast.is_none() {
                reference_cast = cast.clone();
            }

            let (next_owner, next) =
                owner
                    .lookup_id(target)
                    .ok_or_else(|| InjexitError::UnboundReference {
                        binding: target.clone(),
                    })?;
            owner = next_owner;
            binding = next;
        }

        if binding.abstraction(&key).is_some() {
            return Ok(Target {
                binding,
                owner,
                key,
                cast: None,
            });
        }

        let actual = binding.concretion().unwrap_or(binding.declared());
        match reference_cast {
            Some((concretion, cast)) if concretion == actual => Ok(Target {
                binding,
                owner,
                key,
                cast: Some(cast),
            }),
            // Only reachable through a reference: direct matches serve `key`.
            _ => Err(InjexitError::AmbiguousReferenceType {
                binding: visited.pop().unwrap_or_default(),
                declared: key.name(),
                actual: actual.name(),
            }),
        }
    }

    pub fn resolve_request(&self, request: &Request) -> Result<Resolved> {
        self.resolve_factory(request)?.invoke()
    }

    /// Resolve an unqualified abstraction
    ///
    /// # Example
    /// ```
    /// use injexit::Container;
    /// use std::sync::Arc;
    ///
    /// let container = Container::new();
    /// container.bind_instance(Arc::new(42u32));
    /// assert_eq!(*container.resolve::<u32>().unwrap(), 42);
    /// ```
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve_request(&Request::of::<T>())?.into_single()
    }

    pub fn resolve_id<T: ?Sized + Send + Sync + 'static>(
        &self,
        id: impl Into<BindingId>,
    ) -> Result<Arc<T>> {
        self.resolve_request(&Request::of::<T>().with_id(id))?
            .into_single()
    }

    /// Resolve an abstraction, yielding `None` when nothing is bound
    pub fn try_resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        self.resolve_request(&Request::of::<T>().optional())?
            .into_optional()
    }

    /// Resolve every binding of an abstraction, nearest container first
    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        self.resolve_request(&Request::of::<T>().list())?.into_list()
    }

    /// Resolve a concrete type, constructing it from its own metadata when unbound
    pub fn instantiate<C: Injectable>(&self) -> Result<Arc<C>> {
        self.resolve_request(&Request::concrete::<C>())?
            .into_single()
    }

    /// Force a binding owned by this container through the normal algorithm
    pub(crate) fn materialize_binding(&self, binding: &Arc<Binding>) -> Result<()> {
        let target = self.follow(Arc::clone(binding), binding.declared())?;
        target.materialize(self, None).map(|_| ())
    }
}
