//! Primitive value types shared by the chain and the network layer.
//!
//! - [`hash::Hash`]: 32-byte SHA-256 digest, plus the compute-once [`hash::HashCache`]
//! - [`address::Address`]: 20-byte account address
//! - [`bytes::Bytes`]: shared byte buffer used for payloads and wire frames
//! - [`encoding`]: the deterministic binary codec everything hashes and ships through

pub mod address;
pub mod bytes;
pub mod encoding;
pub mod hash;
pub mod wrapper_types;
