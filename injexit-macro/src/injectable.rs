use crate::shape::{FieldOptions, Shape};
use darling::FromDeriveInput;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Token, Type};

#[derive(FromDeriveInput)]
#[darling(attributes(injectable), forward_attrs(bind_also))]
struct InjectableOptions {
    attrs: Vec<Attribute>,
    /// Report instances as `Disposable` to their owning container
    #[darling(default)]
    dispose: bool,
}

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let options = match InjectableOptions::from_derive_input(&input) {
        Ok(options) => options,
        Err(e) => return e.write_errors().into(),
    };

    generate_injectable_impl(&input, &options)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn generate_injectable_impl(
    input: &DeriveInput,
    options: &InjectableOptions,
) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "#[derive(Injectable)] can only be applied to structs",
            ))
        }
    };

    let mut dependencies = Vec::new();
    let mut initializers = Vec::new();

    match fields {
        Fields::Named(named) => {
            for field in &named.named {
                let field_name = &field.ident;
                let name = field_name
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                let options = FieldOptions::from_field(field)?;

                if options.skip {
                    initializers.push(quote! { #field_name: ::std::default::Default::default() });
                    continue;
                }

                let shape = Shape::of(&field.ty).ok_or_else(|| {
                    syn::Error::new_spanned(
                        &field.ty,
                        "expected `Arc<T>`, `Option<Arc<T>>` or `Vec<Arc<T>>`; use #[inject(skip)] for other fields",
                    )
                })?;

                let (dependency, next) = match &shape {
                    Shape::Single(ty) => (
                        quote! { ::injexit::Dependency::single::<#ty>(#name) },
                        quote! { args.next_single::<#ty>()? },
                    ),
                    Shape::Optional(ty) => (
                        quote! { ::injexit::Dependency::optional::<#ty>(#name) },
                        quote! { args.next_optional::<#ty>()? },
                    ),
                    Shape::List(ty) => (
                        quote! { ::injexit::Dependency::list::<#ty>(#name) },
                        quote! { args.next_list::<#ty>()? },
                    ),
                };

                let with_id = options.id.as_ref().map(|id| quote! { .with_id(#id) });
                let self_binding = match (&shape, options.self_bind) {
                    (Shape::Single(ty) | Shape::Optional(ty), true) => {
                        Some(quote! { .self_binding(::injexit::SelfBinding::of::<#ty>()) })
                    }
                    (Shape::List(ty), true) => {
                        return Err(syn::Error::new_spanned(
                            ty,
                            "#[inject(self_bind)] is not supported on list dependencies",
                        ))
                    }
                    _ => None,
                };

                dependencies.push(quote! { #dependency #with_id #self_binding });
                initializers.push(quote! { #field_name: #next });
            }
        }
        Fields::Unit => {}
        Fields::Unnamed(_) => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "#[derive(Injectable)] only supports structs with named fields",
            ))
        }
    }

    let construct_body = match fields {
        Fields::Unit => quote! { Self },
        _ => quote! { Self { #(#initializers),* } },
    };

    let extra_bindings = extra_bindings(&options.attrs)?;
    let extra_bindings_fn = (!extra_bindings.is_empty()).then(|| {
        quote! {
            fn extra_bindings() -> ::std::vec::Vec<::injexit::Abstraction> {
                ::std::vec![
                    #(::injexit::Abstraction::new::<Self, #extra_bindings>(
                        |concrete| concrete as ::std::sync::Arc<#extra_bindings>
                    )),*
                ]
            }
        }
    });

    let disposer_fn = options.dispose.then(|| {
        quote! {
            fn disposer(
                this: &::std::sync::Arc<Self>,
            ) -> ::std::option::Option<::std::sync::Arc<dyn ::injexit::Disposable>> {
                ::std::option::Option::Some(
                    ::std::sync::Arc::clone(this) as ::std::sync::Arc<dyn ::injexit::Disposable>
                )
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::injexit::Injectable for #struct_name #ty_generics #where_clause {
            fn constructor() -> ::std::vec::Vec<::injexit::Dependency> {
                ::std::vec![#(#dependencies),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn construct(
                mut args: ::injexit::Arguments,
            ) -> ::injexit::anyhow::Result<Self> {
                ::std::result::Result::Ok(#construct_body)
            }

            #extra_bindings_fn

            #disposer_fn
        }
    })
}

/// Types listed in `#[bind_also(dyn A, dyn B)]`
fn extra_bindings(attrs: &[Attribute]) -> syn::Result<Vec<Type>> {
    let mut types = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("bind_also")) {
        let listed = attr.parse_args_with(Punctuated::<Type, Token![,]>::parse_terminated)?;
        types.extend(listed);
    }
    Ok(types)
}
