//! `#[derive(ConfigSchema)]` implementation.
//!
//! Every field must be declared as `Option<T>`. The inner `T` decides how the
//! field is bound:
//!
//! | Inner type | Binding |
//! |------------|---------|
//! | `String`, `char`, `PathBuf` | leaf (string) |
//! | integer primitives | leaf (integer) |
//! | `f32`, `f64` | leaf (float) |
//! | `bool` | leaf (boolean) |
//! | `Vec`, `VecDeque`, `HashSet`, `BTreeSet`, arrays | leaf (list) |
//! | `HashMap`, `BTreeMap`, `Map` | leaf (map) |
//! | tuples | leaf (tuple) |
//! | `Value` | leaf (any) |
//! | anything else | nested, through `T: ConfigSchema` |
//!
//! # Field attributes `#[config(...)]`
//!
//! | Key | Description |
//! |-----|-------------|
//! | `leaf` | Bind as an opaque value deserialized into `T` |
//! | `rename = "..."` | Match incoming keys against this name instead |
//!
//! # Container attributes
//!
//! `#[config(crate = "path")]` names the runtime crate when it is reached
//! through a re-export, e.g. `#[config(crate = "trellis::config")]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{
    Attribute, Data, DeriveInput, Fields, GenericArgument, PathArguments, Type, spanned::Spanned,
};

#[derive(Default)]
struct FieldAttrs {
    leaf: bool,
    rename: Option<String>,
}

pub fn derive_config_schema(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let krate = crate::crate_path(&input.attrs, "config", quote!(::trellis_config))?;

    let data = match &input.data {
        Data::Struct(data) => data,
        Data::Enum(_) => {
            return Err(syn::Error::new(
                input.span(),
                "ConfigSchema can only be derived for structs with named fields",
            ));
        }
        Data::Union(_) => {
            return Err(syn::Error::new(
                input.span(),
                "ConfigSchema cannot be derived for unions",
            ));
        }
    };

    let (declarations, construction, writes) = match &data.fields {
        Fields::Named(named) => {
            let mut declarations = Vec::new();
            let mut assignments = Vec::new();
            let mut writes = Vec::new();
            for field in &named.named {
                let Some(ident) = field.ident.as_ref() else {
                    continue;
                };
                let attrs = parse_field_attrs(&field.attrs)?;
                let key = attrs
                    .rename
                    .clone()
                    .unwrap_or_else(|| ident.unraw().to_string());
                let inner = option_inner(&field.ty)?;

                let (declaration, take, write) = match classify(inner, attrs.leaf) {
                    Binding::Leaf(kind) => (
                        quote!(.leaf(#key, #krate::LeafKind::#kind)),
                        quote!(bound.take_value::<#inner>(#key)?),
                        quote!(.leaf::<#inner>(#key, &self.#ident)),
                    ),
                    Binding::Nested => (
                        quote!(.nested::<#inner>(#key)),
                        quote!(bound.take_nested::<#inner>(#key)?),
                        quote!(.nested::<#inner>(#key, &self.#ident)),
                    ),
                };
                declarations.push(declaration);
                assignments.push(quote!(#ident: #take));
                writes.push(write);
            }
            (declarations, quote!(Self { #(#assignments,)* }), writes)
        }
        Fields::Unit => (Vec::new(), quote!(Self), Vec::new()),
        Fields::Unnamed(fields) => {
            return Err(syn::Error::new(
                fields.span(),
                "ConfigSchema requires named fields to match configuration keys",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics #krate::ConfigSchema for #name #ty_generics #where_clause {
            fn schema() -> #krate::Schema {
                #krate::Schema::new(::core::any::type_name::<Self>())
                    #(#declarations)*
            }

            #[allow(unused_mut, unused_variables)]
            fn from_bound(
                mut bound: #krate::BoundObject,
            ) -> #krate::ConfigResult<Self> {
                ::core::result::Result::Ok(#construction)
            }

            fn to_value(&self) -> #krate::Value {
                #krate::ValueBuilder::new()
                    #(#writes)*
                    .into_value()
            }
        }
    })
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("config") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("leaf") {
                result.leaf = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                result.rename = Some(meta.value()?.parse::<syn::LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("unknown config attribute, expected `leaf` or `rename`"))
            }
        })?;
    }

    Ok(result)
}

/// Extracts `T` from `Option<T>`.
fn option_inner(ty: &Type) -> syn::Result<&Type> {
    if let Type::Path(path) = ty
        && path.qself.is_none()
        && let Some(segment) = path.path.segments.last()
        && segment.ident == "Option"
        && let PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(GenericArgument::Type(inner)) = args.args.first()
    {
        return Ok(inner);
    }
    Err(syn::Error::new(
        ty.span(),
        "configuration fields must be declared as `Option<_>` so missing keys can be bound as `None`",
    ))
}

enum Binding {
    Leaf(proc_macro2::Ident),
    Nested,
}

fn classify(ty: &Type, forced_leaf: bool) -> Binding {
    let leaf = |kind: &str| Binding::Leaf(proc_macro2::Ident::new(kind, ty.span()));
    if forced_leaf {
        return leaf("Any");
    }

    match ty {
        Type::Tuple(_) => leaf("Tuple"),
        Type::Array(_) | Type::Slice(_) => leaf("List"),
        Type::Path(path) => {
            let Some(segment) = path.path.segments.last() else {
                return Binding::Nested;
            };
            match segment.ident.to_string().as_str() {
                "String" | "char" | "PathBuf" => leaf("String"),
                "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
                | "u128" | "usize" => leaf("Integer"),
                "f32" | "f64" => leaf("Float"),
                "bool" => leaf("Boolean"),
                "Vec" | "VecDeque" | "HashSet" | "BTreeSet" | "LinkedList" => leaf("List"),
                "HashMap" | "BTreeMap" | "Map" => leaf("Map"),
                "Value" => leaf("Any"),
                _ => Binding::Nested,
            }
        }
        _ => leaf("Any"),
    }
}
