//! Minimal blockchain node.
//!
//! Signed transactions are gossiped into a pending pool; validator nodes
//! periodically extend an append-only, hash-linked chain of headers.

pub mod core;
pub mod crypto;
pub mod network;
pub mod types;
pub mod utils;
