//! Chain data model and admission rules.
//!
//! - [`transaction`]: signed opaque payloads
//! - [`block`]: headers, blocks, signing and verification
//! - [`blockchain`]: the append-only header chain
//! - [`validator`]: pluggable block admission policy
//! - [`storage`]: sinks for accepted block bodies

pub mod block;
pub mod blockchain;
pub mod storage;
pub mod transaction;
pub mod validator;
