use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Runtime identity of a (possibly unsized) type.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdRepr {
    Unique(Uuid),
    Named(Cow<'static, str>),
}

/// Opaque identity of a binding.
///
/// Ids minted with [`BindingId::new`] are unique and cannot be recreated from
/// outside; named ids compare by name so that dependency metadata such as
/// `#[inject(id = "primary")]` can refer to them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingId(IdRepr);

impl BindingId {
    pub fn new() -> Self {
        Self(IdRepr::Unique(Uuid::new_v4()))
    }

    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self(IdRepr::Named(name.into()))
    }

    pub fn is_named(&self) -> bool {
        matches!(self.0, IdRepr::Named(_))
    }
}

impl Default for BindingId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&'static str> for BindingId {
    fn from(name: &'static str) -> Self {
        Self::named(name)
    }
}

impl From<String> for BindingId {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            IdRepr::Unique(uuid) => write!(f, "#{}", uuid.simple()),
            IdRepr::Named(name) => write!(f, "\"{}\"", name),
        }
    }
}
