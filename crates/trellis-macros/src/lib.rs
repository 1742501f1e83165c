//! Procedural macros for Trellis.
//!
//! - `#[derive(ConfigSchema)]` - describes a configuration struct to the binder
//! - `#[derive(Injectable)]` - wires a struct's fields as constructor dependencies
//!
//! The generated code refers to `::trellis_config` and `::trellis_core`, so
//! the crate using a derive must depend on the matching runtime crate, or
//! point the derive elsewhere with `#[config(crate = "trellis::config")]` /
//! `#[inject(crate = "trellis::core")]` when it only depends on the facade.

mod inject;
mod schema;

use proc_macro::TokenStream;
use quote::ToTokens;
use syn::{Attribute, DeriveInput, parse_macro_input};

/// Derives `trellis_config::ConfigSchema`.
///
/// All fields must be `Option<_>`; a field with no matching key is bound as
/// `None`. Fields whose type is not a string, number, boolean, collection,
/// tuple or `serde_json::Value` are bound recursively and must implement
/// `ConfigSchema` themselves.
///
/// # Attributes
///
/// - `#[config(leaf)]` - bind a custom `Serialize + Deserialize` type as an opaque value
/// - `#[config(rename = "...")]` - match incoming keys against another name
/// - `#[config(crate = "...")]` on the struct - path of the runtime crate,
///   e.g. `"trellis::config"` when only the facade is a dependency
///
/// # Example
///
/// ```rust,ignore
/// use trellis_config::ConfigSchema;
///
/// #[derive(ConfigSchema)]
/// pub struct ComplexObject {
///     pub complex1: Option<Terms>,
///     pub value1: Option<bool>,
///     #[config(rename = "values")]
///     pub value3: Option<Vec<i64>>,
/// }
/// ```
#[proc_macro_derive(ConfigSchema, attributes(config))]
pub fn derive_config_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match schema::derive_config_schema(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derives `trellis_core::Injectable`.
///
/// Fields are resolved in declaration order: `Arc<T>` fields come from the
/// registry, value fields (`String`, numbers, ...) need an explicit argument
/// list at registration.
///
/// # Attributes
///
/// - `#[inject(default)]` - fill the field with `Default::default()`
/// - `#[inject(crate = "...")]` on the struct - path of the runtime crate,
///   e.g. `"trellis::core"`
///
/// # Example
///
/// ```rust,ignore
/// use trellis_core::Injectable;
///
/// #[derive(Injectable)]
/// pub struct MassiveSpawner {
///     spawner: Arc<Spawner>,
///     config: Arc<SpawnConfig>,
///     #[inject(default)]
///     spawned: AtomicUsize,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match inject::derive_injectable(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Reads `#[<attr>(crate = "path")]` from container attributes.
fn crate_path(
    attrs: &[Attribute],
    attr: &str,
    default: proc_macro2::TokenStream,
) -> syn::Result<proc_macro2::TokenStream> {
    let mut path = None;
    for attribute in attrs {
        if !attribute.path().is_ident(attr) {
            continue;
        }
        attribute.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                let lit: syn::LitStr = meta.value()?.parse()?;
                path = Some(lit.parse::<syn::Path>()?);
                Ok(())
            } else {
                Err(meta.error("unknown container attribute, expected `crate`"))
            }
        })?;
    }
    Ok(path.map_or(default, |path| path.into_token_stream()))
}
