//! Networking: transports, the message envelope, the pool and the node loop.
//!
//! - [`transport`]: the transport capability and its errors
//! - [`local_transport`]: in-memory transport over tokio channels
//! - [`rpc`]: envelope framing and RPC decoding
//! - [`txpool`]: pending transactions
//! - [`server`]: the node event loop

pub mod local_transport;
pub mod rpc;
pub mod server;
pub mod transport;
pub mod txpool;
