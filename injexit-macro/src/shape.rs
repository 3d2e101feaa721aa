use syn::{Attribute, Field, GenericArgument, LitStr, Meta, PathArguments, Type};

/// How a field receives its value from the container
pub enum Shape {
    /// `Arc<T>`
    Single(Type),
    /// `Option<Arc<T>>`
    Optional(Type),
    /// `Vec<Arc<T>>`
    List(Type),
}

impl Shape {
    pub fn of(ty: &Type) -> Option<Shape> {
        let (outer, inner) = generic_argument(ty)?;
        match outer.as_str() {
            "Arc" => Some(Shape::Single(inner.clone())),
            "Option" => arc_inner(inner).map(Shape::Optional),
            "Vec" => arc_inner(inner).map(Shape::List),
            _ => None,
        }
    }
}

fn arc_inner(ty: &Type) -> Option<Type> {
    match generic_argument(ty)? {
        (outer, inner) if outer == "Arc" => Some(inner.clone()),
        _ => None,
    }
}

/// Last path segment of `ty` and its first type argument
fn generic_argument(ty: &Type) -> Option<(String, &Type)> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some((segment.ident.to_string(), inner)),
        _ => None,
    }
}

/// Options of a field's `#[inject(..)]` attribute
#[derive(Default)]
pub struct FieldOptions {
    /// The field carries an `#[inject]` attribute at all
    pub marked: bool,
    pub id: Option<LitStr>,
    pub skip: bool,
    pub self_bind: bool,
    pub optional: bool,
}

impl FieldOptions {
    pub fn from_field(field: &Field) -> syn::Result<Self> {
        let mut options = FieldOptions::default();
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("inject")) {
            options.marked = true;
            options.merge(attr)?;
        }
        Ok(options)
    }

    fn merge(&mut self, attr: &Attribute) -> syn::Result<()> {
        if matches!(attr.meta, Meta::Path(_)) {
            return Ok(());
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                self.id = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("skip") {
                self.skip = true;
            } else if meta.path.is_ident("self_bind") {
                self.self_bind = true;
            } else if meta.path.is_ident("optional") {
                self.optional = true;
            } else {
                return Err(meta.error("expected `id`, `skip`, `self_bind` or `optional`"));
            }
            Ok(())
        })
    }
}
