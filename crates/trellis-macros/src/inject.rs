//! `#[derive(Injectable)]` implementation.
//!
//! Each field becomes one constructor dependency, in declaration order.
//! Fields marked `#[inject(default)]` are filled with `Default::default()`
//! and are not resolved from the registry.

use proc_macro2::{Ident, Span, TokenStream};
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, spanned::Spanned};

pub fn derive_injectable(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let krate = crate::crate_path(&input.attrs, "inject", quote!(::trellis_core))?;

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.span(),
            "Injectable can only be derived for structs",
        ));
    };

    let mut dep_types = Vec::new();
    let mut bindings = Vec::new();
    let mut values = Vec::new();

    for (index, field) in data.fields.iter().enumerate() {
        let value = if is_default(&field.attrs)? {
            quote!(::core::default::Default::default())
        } else {
            let binding = Ident::new(&format!("__dep{index}"), Span::call_site());
            let ty = &field.ty;
            dep_types.push(quote!(#ty));
            bindings.push(binding.clone());
            quote!(#binding)
        };
        values.push(match &field.ident {
            Some(ident) => quote!(#ident: #value),
            None => value,
        });
    }

    let construction = match &data.fields {
        Fields::Named(_) => quote!(Self { #(#values,)* }),
        Fields::Unnamed(_) => quote!(Self(#(#values,)*)),
        Fields::Unit => quote!(Self),
    };

    Ok(quote! {
        impl #impl_generics #krate::Injectable for #name #ty_generics #where_clause {
            type Deps = (#(#dep_types,)*);

            fn inject(
                (#(#bindings,)*): Self::Deps,
            ) -> ::core::result::Result<Self, #krate::BoxError> {
                ::core::result::Result::Ok(#construction)
            }
        }
    })
}

fn is_default(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut default = false;
    for attr in attrs {
        if !attr.path().is_ident("inject") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                default = true;
                Ok(())
            } else {
                Err(meta.error("unknown inject attribute, expected `default`"))
            }
        })?;
    }
    Ok(default)
}
