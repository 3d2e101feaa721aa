mod binder;
mod binding;
mod builder;
mod container;
mod gate;
mod injector;
mod key;
mod lazy;
mod reflect;
mod resolver;

pub use binding::{Abstraction, Aggregation, Binding, BindingBuilder, Scope};
pub use builder::ContainerBuilder;
pub use container::Container;
pub use key::{BindingId, TypeKey};
pub use lazy::Lazy;
pub use reflect::{Arguments, Dependency, DependencyKind, Inject, Injectable, Resolved, SelfBinding};
pub use resolver::{Factory, Request, Resolver};
