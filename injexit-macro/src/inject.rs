use crate::shape::{FieldOptions, Shape};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

pub fn derive_inject(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    generate_inject_impl(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn generate_inject_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "#[derive(Inject)] only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "#[derive(Inject)] can only be applied to structs",
            ))
        }
    };

    let mut members = Vec::new();
    let mut assignments = Vec::new();

    for field in fields {
        let options = FieldOptions::from_field(field)?;
        if !options.marked || options.skip {
            continue;
        }

        let field_name = &field.ident;
        let name = field_name
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let index = members.len();

        let (member, assign) = match Shape::of(&field.ty) {
            Some(Shape::Optional(ty)) if options.optional => (
                quote! { ::injexit::Dependency::optional::<#ty>(#name) },
                quote! {
                    if let ::std::option::Option::Some(value) = value.into_optional::<#ty>()? {
                        self.#field_name = ::std::option::Option::Some(value);
                    }
                },
            ),
            Some(Shape::Optional(ty)) => (
                quote! { ::injexit::Dependency::single::<#ty>(#name) },
                quote! {
                    self.#field_name = ::std::option::Option::Some(value.into_single::<#ty>()?);
                },
            ),
            Some(Shape::List(ty)) => (
                quote! { ::injexit::Dependency::list::<#ty>(#name) },
                quote! { self.#field_name = value.into_list::<#ty>()?; },
            ),
            _ => {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "injected members must be `Option<Arc<T>>` or `Vec<Arc<T>>`",
                ))
            }
        };

        let with_id = options.id.as_ref().map(|id| quote! { .with_id(#id) });
        members.push(quote! { #member #with_id });
        assignments.push(quote! { #index => { #assign } });
    }

    Ok(quote! {
        impl #impl_generics ::injexit::Inject for #struct_name #ty_generics #where_clause {
            fn members(&self) -> ::std::vec::Vec<::injexit::Dependency> {
                ::std::vec![#(#members),*]
            }

            #[allow(unused_variables)]
            fn assign(
                &mut self,
                index: usize,
                value: ::injexit::Resolved,
            ) -> ::injexit::Result<()> {
                match index {
                    #(#assignments)*
                    _ => {}
                }
                ::std::result::Result::Ok(())
            }
        }
    })
}
