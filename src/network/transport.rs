//! Transport capability the node talks through.
//!
//! The node only depends on [`Transport`]; [`LocalTransport`](super::local_transport::LocalTransport)
//! is the in-process medium.

use crate::network::rpc::Rpc;
use crate::types::bytes::Bytes;
use crate::types::wrapper_types::BoxFuture;
use minichain_derive::Error;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;

/// Peer address.
pub type NetAddr = String;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("peer not found: {0}")]
    PeerNotFound(NetAddr),

    #[error("failed to send message to {0}")]
    SendFailed(NetAddr),

    #[error("broadcast failed: {0}")]
    BroadcastFailed(String),

    #[error("inbound stream of {0} was already consumed")]
    AlreadyConsumed(NetAddr),
}

/// Message medium between nodes.
pub trait Transport: Send + Sync {
    fn addr(&self) -> NetAddr;

    /// Hands out the inbound stream. Only the first call succeeds.
    fn consume(&self) -> Result<Receiver<Rpc>, TransportError>;

    /// Registers `peer` as a destination of this transport.
    fn connect(&self, peer: Arc<dyn Transport>) -> Result<(), TransportError>;

    /// Pushes `rpc` into this transport's inbound stream.
    fn deliver(&self, rpc: Rpc) -> BoxFuture<'_, Result<(), TransportError>>;

    fn send_message(&self, to: NetAddr, payload: Bytes)
    -> BoxFuture<'_, Result<(), TransportError>>;

    /// Sends `payload` to every connected peer.
    fn broadcast(&self, payload: Bytes) -> BoxFuture<'_, Result<(), TransportError>>;
}
