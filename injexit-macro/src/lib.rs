use proc_macro::TokenStream;

mod inject;
mod injectable;
mod shape;

/// Derive macro describing a struct's constructor to the container
///
/// Every field is a dependency: `Arc<T>` is required, `Option<Arc<T>>` is
/// optional and `Vec<Arc<T>>` collects every binding of `T`.
///
/// # Example
/// ```ignore
/// use injexit::Injectable;
///
/// #[derive(Injectable)]
/// #[bind_also(dyn UserService)]
/// pub struct DefaultUserService {
///     repository: Arc<dyn UserRepository>,
///     #[inject(id = "audit")]
///     audit: Option<Arc<dyn AuditLog>>,
///     listeners: Vec<Arc<dyn UserListener>>,
///     #[inject(skip)]
///     stats: Stats,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject, injectable, bind_also))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}

/// Derive macro listing the `#[inject]` members of an existing object
///
/// # Example
/// ```ignore
/// use injexit::Inject;
///
/// #[derive(Default, Inject)]
/// pub struct ProfileView {
///     #[inject]
///     users: Option<Arc<dyn UserService>>,
///     #[inject(optional, id = "theme")]
///     theme: Option<Arc<Theme>>,
///     title: String,
/// }
/// ```
#[proc_macro_derive(Inject, attributes(inject))]
pub fn derive_inject(input: TokenStream) -> TokenStream {
    inject::derive_inject(input)
}
