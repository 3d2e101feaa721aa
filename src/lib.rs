//! # Injexit
//!
//! A hierarchical dependency injection container.
//!
//! Bindings map an abstraction (usually a trait object) to a way of producing
//! it: a constructor, a factory closure, a ready instance, or a reference to
//! another binding. The resolver turns a request into an object graph on
//! demand, child containers shadow their parent's bindings, and disposal
//! cascades from parents to children.
//!
//! ## Features
//!
//! - **Constructor injection**: `#[derive(Injectable)]` describes a type's dependencies
//! - **Member injection**: `#[derive(Inject)]` fills fields of existing objects
//! - **Scopes**: transient or singleton per owning container, optionally eager
//! - **Qualified and list bindings**: `with_id` and `into_list`
//! - **Cycle detection**: reported with the chain of types involved
//!
//! ## Quick Start
//!
//! ```rust
//! use injexit::prelude::*;
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! #[derive(Injectable)]
//! struct FixedClock;
//!
//! impl Clock for FixedClock {
//!     fn now(&self) -> u64 {
//!         42
//!     }
//! }
//!
//! #[derive(Injectable)]
//! struct Scheduler {
//!     clock: Arc<dyn Clock>,
//! }
//!
//! let container = Container::new();
//! container
//!     .bind::<dyn Clock, FixedClock>(|c| c as Arc<dyn Clock>)
//!     .as_single();
//!
//! let scheduler = container.instantiate::<Scheduler>().unwrap();
//! assert_eq!(scheduler.clock.now(), 42);
//! ```

extern crate self as injexit;

pub mod config;
pub mod di;
pub mod error;
pub mod installer;
pub mod lifecycle;

// Re-export core types
pub use config::Settings;
pub use di::{
    Abstraction, Aggregation, Arguments, Binding, BindingBuilder, BindingId, Container,
    ContainerBuilder, Dependency, DependencyKind, Factory, Inject, Injectable, Lazy, Request,
    Resolved, Resolver, Scope, SelfBinding, TypeKey,
};
pub use error::{Chain, InjexitError, Result};
pub use installer::Installer;
pub use lifecycle::{Disposable, DisposeBag, Disposer, LifecycleError};

// Re-export macros
pub use injexit_macro::{Inject, Injectable};

#[doc(hidden)]
pub use anyhow;

/// Prelude module for convenient imports
///
/// ```
/// use injexit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::di::{
        BindingId, Container, ContainerBuilder, Inject, Injectable, Lazy, Request, Resolver,
        Scope,
    };
    pub use crate::error::{InjexitError, Result};
    pub use crate::installer::Installer;
    pub use crate::lifecycle::{Disposable, LifecycleError};
    pub use crate::Settings;
    pub use injexit_macro::{Inject, Injectable};
    pub use std::sync::Arc;
}
