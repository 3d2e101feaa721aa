use crate::config::Settings;
use crate::di::binding::{Binding, Producer};
use crate::di::gate::BuildGate;
use crate::di::key::{BindingId, TypeKey};
use crate::di::reflect::Erased;
use crate::error::{InjexitError, Result};
use crate::lifecycle::{Disposable, DisposeBag, Disposer};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

struct ContainerInner {
    bindings: RwLock<Vec<Arc<Binding>>>,
    ids: DashMap<BindingId, Arc<Binding>>,
    parent: Option<Weak<ContainerInner>>,
    children: Mutex<Vec<Container>>,
    disposables: DisposeBag,
    gate: Arc<BuildGate>,
    settings: Settings,
    level: usize,
    disposed: AtomicBool,
}

/// Thread-safe, hierarchical dependency injection container.
///
/// `Container` is a cheap handle; clones share the same bindings. A child
/// created with [`create`](Self::create) sees every binding of its ancestors
/// unless it shadows them, and is disposed together with its parent.
///
/// Dropping the last handle of a root container disposes it. Children are
/// owned by their parent and stay alive until disposed explicitly.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                bindings: RwLock::new(Vec::new()),
                ids: DashMap::new(),
                parent: None,
                children: Mutex::new(Vec::new()),
                disposables: DisposeBag::new(),
                gate: Arc::new(BuildGate::new()),
                settings,
                level: 0,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Create a child container owned by this one
    ///
    /// The parent keeps the child alive: dropping the returned handle does not
    /// release it. Call [`dispose`](Self::dispose) on the child, or dispose the
    /// parent.
    pub fn create(&self) -> Container {
        let child = Container {
            inner: Arc::new(ContainerInner {
                bindings: RwLock::new(Vec::new()),
                ids: DashMap::new(),
                parent: Some(Arc::downgrade(&self.inner)),
                children: Mutex::new(Vec::new()),
                disposables: DisposeBag::new(),
                gate: Arc::clone(&self.inner.gate),
                settings: self.inner.settings,
                level: self.inner.level + 1,
                disposed: AtomicBool::new(false),
            }),
        };
        self.inner
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(child.clone());
        tracing::debug!(level = child.inner.level, "Created child container");
        child
    }

    /// Create a child, apply ad hoc bindings to it and hand it back
    ///
    /// Dispose the returned container once done with it; this releases the
    /// child only, never the parent's singletons. Until then the parent holds
    /// on to it.
    ///
    /// # Example
    /// ```
    /// use injexit::Container;
    /// use std::sync::Arc;
    ///
    /// let container = Container::new();
    /// let scoped = container.using(|child| {
    ///     child.bind_instance(Arc::new("request-42".to_string()));
    /// });
    /// assert_eq!(*scoped.resolve::<String>().unwrap(), "request-42");
    /// scoped.dispose();
    /// assert!(container.resolve::<String>().is_err());
    /// ```
    pub fn using(&self, configure: impl FnOnce(&Container)) -> Container {
        let child = self.create();
        configure(&child);
        child
    }

    pub fn parent(&self) -> Option<Container> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Container { inner })
    }

    pub fn children(&self) -> Vec<Container> {
        self.inner
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn settings(&self) -> Settings {
        self.inner.settings
    }

    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakContainer {
        WeakContainer(Arc::downgrade(&self.inner))
    }

    /// This container followed by its ancestors, nearest first
    pub(crate) fn lineage(&self) -> Vec<Container> {
        let mut lineage = vec![self.clone()];
        let mut cursor = self.parent();
        while let Some(container) = cursor {
            cursor = container.parent();
            lineage.push(container);
        }
        lineage
    }

    pub(crate) fn register(&self, binding: Binding) -> Arc<Binding> {
        if self.is_disposed() {
            tracing::warn!(
                "Binding {} registered on a disposed container",
                binding.declared()
            );
        }
        let binding = Arc::new(binding);
        tracing::debug!(
            abstraction = binding.declared().name(),
            concretion = binding.concretion_name(),
            "Registered binding"
        );
        self.inner
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&binding));
        binding
    }

    pub(crate) fn index_binding(
        &self,
        previous: Option<&BindingId>,
        id: &BindingId,
        binding: &Arc<Binding>,
    ) {
        if let Some(previous) = previous {
            self.inner
                .ids
                .remove_if(previous, |_, indexed| Arc::ptr_eq(indexed, binding));
        }
        self.inner.ids.insert(id.clone(), Arc::clone(binding));
    }

    pub(crate) fn bindings_snapshot(&self) -> Vec<Arc<Binding>> {
        self.inner
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Binding registered under `id` here or in an ancestor, with its owner
    pub(crate) fn lookup_id(&self, id: &BindingId) -> Option<(Container, Arc<Binding>)> {
        self.lineage().into_iter().find_map(|container| {
            let binding = container
                .inner
                .ids
                .get(id)
                .map(|entry| Arc::clone(entry.value()));
            binding.map(|binding| (container, binding))
        })
    }

    /// Binding registered under `id` here or in an ancestor
    pub fn binding(&self, id: &BindingId) -> Option<Arc<Binding>> {
        self.lookup_id(id).map(|(_, binding)| binding)
    }

    /// Whether `T` is bound here or in an ancestor, under any id
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        let key = TypeKey::of::<T>();
        self.lineage().iter().any(|container| {
            container
                .bindings_snapshot()
                .iter()
                .any(|binding| binding.abstractions().contains(&key))
        })
    }

    /// Number of bindings registered directly on this container
    pub fn len(&self) -> usize {
        self.inner
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached instance of a singleton binding owned by this
    /// container, building it once if needed
    pub(crate) fn singleton(
        &self,
        binding: &Arc<Binding>,
        build: impl FnOnce() -> Result<Erased>,
    ) -> Result<Erased> {
        if let Some(instance) = binding.cached() {
            return Ok(instance);
        }

        let _guard = self.inner.gate.enter();
        if let Some(instance) = binding.cached() {
            return Ok(instance);
        }

        let instance = build()?;
        binding.store(Arc::clone(&instance));
        if let Producer::Constructor { disposer, .. } = &binding.producer {
            if let Some(disposable) = disposer(&instance) {
                self.track_disposable(disposable, binding.concretion_name());
            }
        }
        tracing::debug!(
            concretion = binding.concretion_name(),
            level = self.inner.level,
            "Singleton created"
        );
        Ok(instance)
    }

    pub(crate) fn track_disposable(&self, disposable: Arc<dyn Disposable>, name: &str) {
        self.inner.disposables.add(disposable, name);
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(InjexitError::Disposed);
        }
        Ok(())
    }

    /// Instantiate every eager singleton of this container and its subtree
    ///
    /// Singletons that depend on each other are built in dependency order by
    /// the normal resolution algorithm. Running the pass again is harmless.
    ///
    /// # Errors
    /// Returns `CircularDependency` when eager singletons depend on each
    /// other in a cycle, or any other resolution failure of an eager binding.
    pub fn instantiate_eager_singles(&self) -> Result<()> {
        self.ensure_live()?;

        let eager: Vec<Arc<Binding>> = self
            .bindings_snapshot()
            .into_iter()
            .filter(|binding| binding.is_eager())
            .collect();

        tracing::info!(
            level = self.inner.level,
            "Instantiating {} eager singletons",
            eager.len()
        );

        for binding in &eager {
            if binding.cached().is_some() {
                continue;
            }
            self.materialize_binding(binding).map_err(|e| {
                tracing::error!(
                    "Eager singleton {} failed: {}",
                    binding.concretion_name(),
                    e
                );
                e
            })?;
        }

        for child in self.children() {
            child.instantiate_eager_singles()?;
        }
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Dispose children depth-first, then the instances this container owns
    ///
    /// Idempotent. The container is detached from its parent and every later
    /// resolution through it fails with `Disposed`.
    pub fn dispose(&self) {
        if !self.inner.release() {
            return;
        }
        if let Some(parent) = self.parent() {
            parent
                .inner
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|child| !child.ptr_eq(self));
        }
    }
}

impl ContainerInner {
    /// Returns false when already disposed
    fn release(&self) -> bool {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let children =
            std::mem::take(&mut *self.children.lock().unwrap_or_else(PoisonError::into_inner));
        for child in &children {
            child.dispose();
        }

        let failures = self.disposables.dispose_all();

        let bindings =
            std::mem::take(&mut *self.bindings.write().unwrap_or_else(PoisonError::into_inner));
        for binding in &bindings {
            binding.clear_cache();
        }
        self.ids.clear();

        tracing::info!(
            level = self.level,
            children = children.len(),
            bindings = bindings.len(),
            failures,
            "Container disposed"
        );
        true
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        self.release();
    }
}

/// Non-owning handle to a container
#[derive(Clone)]
pub(crate) struct WeakContainer(Weak<ContainerInner>);

impl WeakContainer {
    pub(crate) fn upgrade(&self) -> Option<Container> {
        self.0.upgrade().map(|inner| Container { inner })
    }
}

impl Disposer for Container {
    fn add_disposable(&self, disposable: Arc<dyn Disposable>) {
        self.track_disposable(disposable, "<external>");
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("level", &self.inner.level)
            .field("bindings", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::reflect::{Arguments, Dependency, Injectable};
    use crate::lifecycle::LifecycleError;
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        value: usize,
    }

    trait MyTrait: Send + Sync {
        fn get_value(&self) -> i32;
    }

    struct MyTraitImpl {
        value: i32,
    }

    impl MyTrait for MyTraitImpl {
        fn get_value(&self) -> i32 {
            self.value
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let container = Container::new();
        container.bind_instance(Arc::new(Counter { value: 42 }));
        let service = container.resolve::<Counter>().unwrap();
        assert_eq!(service.value, 42);
        assert!(container.contains::<Counter>());
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_register_and_resolve_trait() {
        let container = Container::new();
        container
            .bind_instance(Arc::new(MyTraitImpl { value: 99 }))
            .also::<dyn MyTrait>(|i| i as Arc<dyn MyTrait>);
        let trait_instance = container.resolve::<dyn MyTrait>().unwrap();
        assert_eq!(trait_instance.get_value(), 99);
    }

    #[test]
    fn test_child_sees_parent_and_shadows() {
        let parent = Container::new();
        parent.bind_instance(Arc::new(1u32));
        parent.bind_instance(Arc::new("parent".to_string()));

        let child = parent.create();
        child.bind_instance(Arc::new(2u32));

        assert_eq!(*child.resolve::<String>().unwrap(), "parent");
        assert_eq!(*child.resolve::<u32>().unwrap(), 2);
        assert_eq!(*parent.resolve::<u32>().unwrap(), 1);
        assert!(child.parent().unwrap().ptr_eq(&parent));
    }

    #[test]
    fn test_list_gathers_child_then_parent() {
        let parent = Container::new();
        parent.bind_instance(Arc::new(1u32)).into_list();
        parent.bind_instance(Arc::new(2u32)).into_list();
        let child = parent.create();
        child.bind_instance(Arc::new(3u32)).into_list();

        let values: Vec<u32> = child
            .resolve_all::<u32>()
            .unwrap()
            .into_iter()
            .map(|v| *v)
            .collect();
        assert_eq!(values, vec![3, 1, 2]);
        // list members do not answer point lookups
        assert!(parent.resolve::<u32>().is_err());
    }

    #[test]
    fn test_using_child_released_without_touching_parent() {
        let parent = Container::new();
        parent.bind_instance(Arc::new(7u64));
        let scoped = parent.using(|child| {
            child.bind_instance(Arc::new(8u64));
        });
        assert_eq!(parent.children().len(), 1);
        assert_eq!(*scoped.resolve::<u64>().unwrap(), 8);

        scoped.dispose();
        assert!(parent.children().is_empty());
        assert_eq!(*parent.resolve::<u64>().unwrap(), 7);
        assert!(matches!(scoped.resolve::<u64>(), Err(InjexitError::Disposed)));
    }

    struct Tracked {
        id: usize,
        order: Arc<Mutex<Vec<usize>>>,
    }

    impl Disposable for Tracked {
        fn dispose(&self) -> std::result::Result<(), LifecycleError> {
            self.order.lock().unwrap().push(self.id);
            Ok(())
        }
    }

    #[test]
    fn test_dispose_cascades_children_first() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let parent = Container::new();
        parent.add_disposable(Arc::new(Tracked {
            id: 1,
            order: Arc::clone(&order),
        }));
        let child = parent.create();
        child.add_disposable(Arc::new(Tracked {
            id: 2,
            order: Arc::clone(&order),
        }));
        let grandchild = child.create();
        grandchild.add_disposable(Arc::new(Tracked {
            id: 3,
            order: Arc::clone(&order),
        }));

        parent.dispose();
        parent.dispose();
        assert_eq!(*order.lock().unwrap(), vec![3, 2, 1]);
        assert!(child.is_disposed());
        assert!(grandchild.is_disposed());
    }

    #[test]
    fn test_dropping_last_handle_disposes() {
        let order = Arc::new(Mutex::new(Vec::new()));
        {
            let container = Container::new();
            container.add_disposable(Arc::new(Tracked {
                id: 9,
                order: Arc::clone(&order),
            }));
        }
        assert_eq!(*order.lock().unwrap(), vec![9]);
    }

    #[test]
    fn test_dropped_child_handle_kept_until_disposed() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let parent = Container::new();
        {
            let child = parent.using(|_| {});
            child.add_disposable(Arc::new(Tracked {
                id: 4,
                order: Arc::clone(&order),
            }));
        }
        assert_eq!(parent.children().len(), 1);
        assert!(order.lock().unwrap().is_empty());

        parent.dispose();
        assert_eq!(*order.lock().unwrap(), vec![4]);
    }

    struct Flag(Arc<AtomicBool>);

    impl Disposable for Flag {
        fn dispose(&self) -> std::result::Result<(), LifecycleError> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Report {
        flag: Arc<Flag>,
    }

    impl Injectable for Report {
        fn constructor() -> Vec<Dependency> {
            vec![Dependency::single::<Flag>("flag")]
        }

        fn construct(mut args: Arguments) -> anyhow::Result<Self> {
            Ok(Report {
                flag: args.next_single::<Flag>()?,
            })
        }
    }

    #[test]
    fn test_self_override_does_not_leak_container() {
        let disposed = Arc::new(AtomicBool::new(false));
        {
            let container = Container::new();
            let flag = Arc::new(Flag(Arc::clone(&disposed)));
            container.bind_disposable_instance(Arc::clone(&flag));
            container.bind_self::<Report>().with(&container);

            let report = container.resolve::<Report>().unwrap();
            assert!(Arc::ptr_eq(&report.flag, &flag));
        }
        assert!(disposed.load(Ordering::SeqCst));
    }

    static ENGINES: AtomicUsize = AtomicUsize::new(0);
    static CARS: AtomicUsize = AtomicUsize::new(0);

    struct Engine;

    impl Injectable for Engine {
        fn constructor() -> Vec<Dependency> {
            Vec::new()
        }

        fn construct(_args: Arguments) -> anyhow::Result<Self> {
            ENGINES.fetch_add(1, Ordering::SeqCst);
            Ok(Engine)
        }
    }

    struct Car {
        engine: Arc<Engine>,
    }

    impl Injectable for Car {
        fn constructor() -> Vec<Dependency> {
            vec![Dependency::single::<Engine>("engine")]
        }

        fn construct(mut args: Arguments) -> anyhow::Result<Self> {
            CARS.fetch_add(1, Ordering::SeqCst);
            Ok(Car {
                engine: args.next_single::<Engine>()?,
            })
        }
    }

    #[test]
    fn test_eager_pass_orders_dependencies_across_subtree() {
        let root = Container::new();
        root.bind_self::<Engine>().eager();
        let child = root.create();
        child.bind_self::<Car>().eager();

        root.instantiate_eager_singles().unwrap();
        root.instantiate_eager_singles().unwrap();

        assert_eq!(ENGINES.load(Ordering::SeqCst), 1);
        assert_eq!(CARS.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(
            &child.resolve::<Car>().unwrap().engine,
            &root.resolve::<Engine>().unwrap()
        ));
        assert_eq!(CARS.load(Ordering::SeqCst), 1);
        root.dispose();
    }

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Slow;

    impl Injectable for Slow {
        fn constructor() -> Vec<Dependency> {
            Vec::new()
        }

        fn construct(_args: Arguments) -> anyhow::Result<Self> {
            BUILT.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Slow)
        }
    }

    #[test]
    fn test_racing_threads_share_one_singleton() {
        let container = Container::new();
        container.bind_self::<Slow>().as_single();

        let results: Vec<Arc<Slow>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| container.resolve::<Slow>().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn test_singleton_cached_in_owner_shared_by_children() {
        let parent = Container::new();
        parent.bind_factory(|_| Ok(Arc::new(Counter { value: 0 }))).as_single();
        let a = parent.create().resolve::<Counter>().unwrap();
        let b = parent.create().resolve::<Counter>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
