use crate::di::BindingId;
use crate::lifecycle::LifecycleError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, InjexitError>;

/// Abstraction type names visited on the way to a failure, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain(pub Vec<&'static str>);

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        f.write_str(&self.0.join(" -> "))
    }
}

fn fmt_id(id: &Option<BindingId>) -> String {
    match id {
        Some(id) => format!(" (id: {id})"),
        None => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum InjexitError {
    #[error("No binding found for {abstraction}{} while resolving {chain}", fmt_id(.id))]
    NoBindingFound {
        abstraction: &'static str,
        id: Option<BindingId>,
        chain: Chain,
    },

    #[error(
        "Reference to binding {binding} declares {declared}, but the bound concretion {actual} is not assignable to it"
    )]
    AmbiguousReferenceType {
        binding: BindingId,
        declared: &'static str,
        actual: &'static str,
    },

    #[error("Reference points at binding {binding}, which is not registered")]
    UnboundReference { binding: BindingId },

    #[error("Circular dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<&'static str> },

    #[error("Failed to construct {abstraction} while resolving {chain}: {source}")]
    ConstructionFailure {
        abstraction: &'static str,
        chain: Chain,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to inject member `{member}` of {owner}: {source}")]
    MissingRequiredMember {
        owner: &'static str,
        member: &'static str,
        #[source]
        source: Box<InjexitError>,
    },

    #[error("Resolution depth limit of {limit} exceeded while resolving {chain}")]
    DepthExceeded { limit: usize, chain: Chain },

    #[error("Failed to downcast resolved value to {type_name}")]
    Downcast { type_name: &'static str },

    #[error("Container has been disposed")]
    Disposed,

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl InjexitError {
    /// The abstraction chain carried by resolution failures, if any.
    pub fn chain(&self) -> Option<&Chain> {
        match self {
            Self::NoBindingFound { chain, .. }
            | Self::ConstructionFailure { chain, .. }
            | Self::DepthExceeded { chain, .. } => Some(chain),
            Self::MissingRequiredMember { source, .. } => source.chain(),
            _ => None,
        }
    }
}
