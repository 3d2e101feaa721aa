use crate::di::binding::{Abstraction, Binding, BindingBuilder, Producer, Scope};
use crate::di::container::Container;
use crate::di::key::{BindingId, TypeKey};
use crate::di::reflect::{erase, Injectable};
use crate::di::resolver::Resolver;
use crate::lifecycle::Disposable;
use std::sync::Arc;

impl Container {
    /// Bind abstraction `T` to concretion `C`, constructed on first resolution
    ///
    /// `cast` converts the concretion into the abstraction, usually an unsizing
    /// coercion to a trait object. Extra abstractions declared by `C` are
    /// served as well.
    ///
    /// # Example
    /// ```rust,ignore
    /// container
    ///     .bind::<dyn UserRepository, SqlUserRepository>(|r| r as Arc<dyn UserRepository>)
    ///     .as_single();
    /// ```
    pub fn bind<T, C>(
        &self,
        cast: impl Fn(Arc<C>) -> Arc<T> + Send + Sync + 'static,
    ) -> BindingBuilder<'_, C>
    where
        T: ?Sized + Send + Sync + 'static,
        C: Injectable,
    {
        let binding = Binding::new(
            Abstraction::new::<C, T>(cast),
            Some(TypeKey::of::<C>()),
            Producer::constructor::<C>(),
            Scope::Transient,
        );
        self.register_constructed::<C>(binding)
    }

    /// Bind concretion `C` to itself
    pub fn bind_self<C: Injectable>(&self) -> BindingBuilder<'_, C> {
        let binding = Binding::new(
            Abstraction::identity::<C>(),
            Some(TypeKey::of::<C>()),
            Producer::constructor::<C>(),
            Scope::Transient,
        );
        self.register_constructed::<C>(binding)
    }

    fn register_constructed<C: Injectable>(&self, binding: Binding) -> BindingBuilder<'_, C> {
        {
            let mut config = binding.config_mut();
            for extra in C::extra_bindings() {
                if !config.abstractions.iter().any(|a| a.key() == extra.key()) {
                    config.abstractions.push(extra);
                }
            }
        }
        BindingBuilder::new(self, self.register(binding))
    }

    /// Bind `T` to an already-built value; always resolves to that same value
    pub fn bind_instance<T: ?Sized + Send + Sync + 'static>(
        &self,
        instance: Arc<T>,
    ) -> BindingBuilder<'_, T> {
        let binding = Binding::new(
            Abstraction::identity::<T>(),
            None,
            Producer::Instance(erase(instance)),
            Scope::Singleton,
        );
        BindingBuilder::new(self, self.register(binding))
    }

    /// Bind `T` to an already-built value that this container disposes of
    pub fn bind_disposable_instance<T: Disposable + 'static>(
        &self,
        instance: Arc<T>,
    ) -> BindingBuilder<'_, T> {
        self.track_disposable(
            Arc::clone(&instance) as Arc<dyn Disposable>,
            std::any::type_name::<T>(),
        );
        self.bind_instance(instance)
    }

    /// Bind `T` to a factory invoked according to the binding's scope
    ///
    /// Errors returned by the factory are reported as construction failures,
    /// except container errors which propagate unchanged.
    pub fn bind_factory<T: ?Sized + Send + Sync + 'static>(
        &self,
        factory: impl Fn(&Resolver<'_>) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    ) -> BindingBuilder<'_, T> {
        let binding = Binding::new(
            Abstraction::identity::<T>(),
            None,
            Producer::Factory(Arc::new(move |resolver: &Resolver<'_>| {
                factory(resolver).map(erase)
            })),
            Scope::Transient,
        );
        BindingBuilder::new(self, self.register(binding))
    }

    /// Expose the binding identified by `target` as `T`
    ///
    /// The target must serve `T` itself; this is checked when the reference
    /// is resolved, so the target may be registered later.
    pub fn bind_reference<T: ?Sized + Send + Sync + 'static>(
        &self,
        target: BindingId,
    ) -> BindingBuilder<'_, T> {
        self.register_reference::<T>(target, None)
    }

    /// Expose the binding identified by `target` as `T`, converting its
    /// concretion `C` with `cast`
    ///
    /// Resolution fails with `AmbiguousReferenceType` when the target's
    /// concretion is not `C`.
    pub fn bind_reference_as<T, C>(
        &self,
        target: BindingId,
        cast: impl Fn(Arc<C>) -> Arc<T> + Send + Sync + 'static,
    ) -> BindingBuilder<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        C: ?Sized + Send + Sync + 'static,
    {
        let cast = (TypeKey::of::<C>(), Abstraction::new::<C, T>(cast));
        self.register_reference::<T>(target, Some(cast))
    }

    fn register_reference<T: ?Sized + Send + Sync + 'static>(
        &self,
        target: BindingId,
        cast: Option<(TypeKey, Abstraction)>,
    ) -> BindingBuilder<'_, T> {
        let binding = Binding::new(
            Abstraction::identity::<T>(),
            None,
            Producer::Reference { target, cast },
            Scope::Transient,
        );
        BindingBuilder::new(self, self.register(binding))
    }
}
