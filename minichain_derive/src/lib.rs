//! Derive macros for the minichain crate.
//!
//! - `#[derive(BinaryCodec)]` implements the wire codec (`Encode` + `Decode`)
//! - `#[derive(Error)]` implements `Display` and `std::error::Error`

mod binary_codec;
mod error;

use proc_macro::TokenStream;

/// Implements `Encode` and `Decode` by walking fields in declaration order.
///
/// Fields annotated with `#[binary_codec(skip)]` are left out of the encoding
/// and rebuilt with `Default::default()` on decode.
#[proc_macro_derive(BinaryCodec, attributes(binary_codec))]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    binary_codec::derive_binary_codec(input)
}

/// Implements `Display` and `Error` from `#[error("...")]` attributes.
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
