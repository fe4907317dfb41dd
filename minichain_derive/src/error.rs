//! `#[derive(Error)]` expansion.
//!
//! ```ignore
//! #[derive(Debug, Error)]
//! pub enum ChainError {
//!     #[error("height {height} is too high (current height {current})")]
//!     HeightTooHigh { height: u32, current: u32 },
//!
//!     #[error("storage failure: {0}")]
//!     Storage(StorageError),
//!
//!     #[error(transparent)]
//!     Block(BlockError),
//! }
//! ```
//!
//! Tuple fields are referenced positionally (`{0}`), struct fields by name.
//! `#[error(transparent)]` forwards `Display` to the variant's single field.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::{Data, DeriveInput, Fields, Lit, Meta, parse_macro_input};

/// What an `#[error(...)]` attribute asked for.
enum Message {
    Format(String),
    Transparent,
}

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Enum(data) => {
            let arms = data
                .variants
                .iter()
                .map(|variant| {
                    let ident = &variant.ident;
                    let message = message(&variant.attrs, variant)?;
                    display_arm(quote! { Self::#ident }, &variant.fields, message, variant)
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Struct(data) => {
            let message = message(&input.attrs, &input.ident)?;
            let arm = display_arm(quote! { Self }, &data.fields, message, &input.ident)?;
            quote! {
                match self {
                    #arm
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

/// Builds one `pattern => write!(...)` arm for a variant or struct body.
fn display_arm<T: ToTokens>(
    path: TokenStream2,
    fields: &Fields,
    message: Message,
    span: &T,
) -> syn::Result<TokenStream2> {
    let arm = match (fields, message) {
        (Fields::Unnamed(unnamed), Message::Transparent) if unnamed.unnamed.len() == 1 => {
            quote! { #path(inner) => ::std::fmt::Display::fmt(inner, f), }
        }
        (_, Message::Transparent) => {
            return Err(syn::Error::new_spanned(
                span,
                "#[error(transparent)] requires exactly one unnamed field",
            ));
        }
        (Fields::Unit, Message::Format(fmt)) => {
            quote! { #path => write!(f, #fmt), }
        }
        (Fields::Unnamed(unnamed), Message::Format(fmt)) => {
            let bindings: Vec<_> = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("f{}", i))
                .collect();
            let fmt = positional_to_named(&fmt, bindings.len());
            let used: Vec<_> = bindings.iter().filter(|b| references(&fmt, b)).collect();
            quote! {
                #[allow(unused_variables)]
                #path(#(#bindings),*) => write!(f, #fmt, #(#used = #used),*),
            }
        }
        (Fields::Named(named), Message::Format(fmt)) => {
            let names: Vec<_> = named.named.iter().filter_map(|f| f.ident.as_ref()).collect();
            let used: Vec<_> = names.iter().filter(|n| references(&fmt, n)).collect();
            quote! {
                #[allow(unused_variables)]
                #path { #(#names),* } => write!(f, #fmt, #(#used = #used),*),
            }
        }
    };
    Ok(arm)
}

/// Reads the `#[error(...)]` attribute attached to `target`.
fn message<T: ToTokens>(attrs: &[syn::Attribute], target: &T) -> syn::Result<Message> {
    for attr in attrs {
        if !attr.path().is_ident("error") {
            continue;
        }
        let Meta::List(list) = &attr.meta else {
            return Err(syn::Error::new_spanned(
                &attr.meta,
                "expected #[error(\"message\")] or #[error(transparent)]",
            ));
        };
        if let Ok(ident) = syn::parse2::<syn::Ident>(list.tokens.clone()) {
            if ident == "transparent" {
                return Ok(Message::Transparent);
            }
        }
        return match syn::parse2::<Lit>(list.tokens.clone()) {
            Ok(Lit::Str(lit)) => Ok(Message::Format(lit.value())),
            _ => Err(syn::Error::new_spanned(
                &attr.meta,
                "error message must be a string literal",
            )),
        };
    }

    Err(syn::Error::new_spanned(
        target,
        "missing #[error(\"...\")] attribute",
    ))
}

/// `write!` rejects named arguments the format string never uses.
fn references(fmt: &str, ident: &syn::Ident) -> bool {
    fmt.contains(&format!("{{{ident}}}")) || fmt.contains(&format!("{{{ident}:"))
}

/// Rewrites `{0}`, `{1:?}` into `{f0}`, `{f1:?}` so the generated `write!`
/// can bind tuple fields by name.
fn positional_to_named(fmt: &str, count: usize) -> String {
    let mut out = fmt.to_string();
    for i in (0..count).rev() {
        out = out
            .replace(&format!("{{{i}}}"), &format!("{{f{i}}}"))
            .replace(&format!("{{{i}:"), &format!("{{f{i}:"));
    }
    out
}
