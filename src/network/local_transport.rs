//! In-memory transport for single-process networks and tests.

use crate::network::rpc::Rpc;
use crate::network::transport::{NetAddr, Transport, TransportError};
use crate::types::bytes::Bytes;
use crate::types::wrapper_types::BoxFuture;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{Receiver, Sender, channel};

/// Inbound queue depth per transport.
const INBOUND_CAPACITY: usize = 1024;

/// Routes messages through tokio channels.
///
/// `connect` is one-directional: `a.connect(b)` lets `a` reach `b` only.
pub struct LocalTransport {
    address: NetAddr,
    peers: DashMap<NetAddr, Arc<dyn Transport>>,
    tx: Sender<Rpc>,
    rx: Mutex<Option<Receiver<Rpc>>>,
}

impl LocalTransport {
    pub fn new(address: impl Into<NetAddr>) -> Arc<LocalTransport> {
        let (tx, rx) = channel(INBOUND_CAPACITY);

        Arc::new(LocalTransport {
            address: address.into(),
            peers: DashMap::new(),
            tx,
            rx: Mutex::new(Some(rx)),
        })
    }

    fn peer(&self, addr: &str) -> Option<Arc<dyn Transport>> {
        self.peers.get(addr).map(|entry| entry.value().clone())
    }
}

impl Transport for LocalTransport {
    fn addr(&self) -> NetAddr {
        self.address.clone()
    }

    fn consume(&self) -> Result<Receiver<Rpc>, TransportError> {
        self.rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| TransportError::AlreadyConsumed(self.addr()))
    }

    fn connect(&self, peer: Arc<dyn Transport>) -> Result<(), TransportError> {
        self.peers.insert(peer.addr(), peer);
        Ok(())
    }

    fn deliver(&self, rpc: Rpc) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            self.tx
                .send(rpc)
                .await
                .map_err(|_| TransportError::SendFailed(self.addr()))
        })
    }

    fn send_message(
        &self,
        to: NetAddr,
        payload: Bytes,
    ) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            let Some(peer) = self.peer(to.trim()) else {
                return Err(TransportError::PeerNotFound(to));
            };
            peer.deliver(Rpc::new(self.addr(), payload)).await
        })
    }

    fn broadcast(&self, payload: Bytes) -> BoxFuture<'_, Result<(), TransportError>> {
        // Snapshot so no map guard is held across an await.
        let peers: Vec<Arc<dyn Transport>> =
            self.peers.iter().map(|entry| entry.value().clone()).collect();

        Box::pin(async move {
            for peer in peers {
                if let Err(e) = peer.deliver(Rpc::new(self.addr(), payload.clone())).await {
                    return Err(TransportError::BroadcastFailed(e.to_string()));
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_is_one_directional() {
        let tr_a = LocalTransport::new("A");
        let tr_b = LocalTransport::new("B");

        tr_a.connect(tr_b.clone()).unwrap();

        assert!(tr_a.peers.contains_key("B"));
        assert_eq!(tr_a.peers.get("B").unwrap().addr(), tr_b.addr());
        assert!(!tr_b.peers.contains_key("A"));
    }

    #[tokio::test]
    async fn send_message_reaches_peer() {
        let tr_a = LocalTransport::new("A");
        let tr_b = LocalTransport::new("B");
        tr_a.connect(tr_b.clone()).unwrap();

        let mut rx = tr_b.consume().unwrap();

        let payload = Bytes::from("The first message.");
        tr_a.send_message(tr_b.addr(), payload.clone()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.from, "A");
        assert_eq!(received.payload, payload);
    }

    #[tokio::test]
    async fn consume_only_once() {
        let tr = LocalTransport::new("A");
        assert!(tr.consume().is_ok());
        assert_eq!(
            tr.consume().err(),
            Some(TransportError::AlreadyConsumed("A".to_string()))
        );
    }

    #[tokio::test]
    async fn broadcast_reaches_every_peer() {
        let tr_a = LocalTransport::new("A");
        let tr_b = LocalTransport::new("B");
        let tr_c = LocalTransport::new("C");

        tr_a.connect(tr_b.clone()).unwrap();
        tr_a.connect(tr_c.clone()).unwrap();

        let mut rx_b = tr_b.consume().unwrap();
        let mut rx_c = tr_c.consume().unwrap();

        let payload = Bytes::from("Broadcast message");
        tr_a.broadcast(payload.clone()).await.unwrap();

        let received_b = rx_b.recv().await.unwrap();
        assert_eq!(received_b.from, "A");
        assert_eq!(received_b.payload, payload);

        let received_c = rx_c.recv().await.unwrap();
        assert_eq!(received_c.from, "A");
        assert_eq!(received_c.payload, payload);
    }

    #[tokio::test]
    async fn broadcast_with_no_peers_is_ok() {
        let tr = LocalTransport::new("alone");
        assert_eq!(tr.broadcast(Bytes::from("x")).await, Ok(()));
    }

    #[tokio::test]
    async fn broadcast_stops_at_dropped_peer() {
        let tr_a = LocalTransport::new("A");
        let tr_b = LocalTransport::new("B");
        tr_a.connect(tr_b.clone()).unwrap();
        drop(tr_b.consume().unwrap());

        let result = tr_a.broadcast(Bytes::from("x")).await;
        assert!(matches!(result, Err(TransportError::BroadcastFailed(_))));
    }

    #[tokio::test]
    async fn send_to_unknown_peer_fails() {
        let tr_a = LocalTransport::new("A");
        let result = tr_a
            .send_message("NonExistent".to_string(), Bytes::from("test"))
            .await;
        assert_eq!(
            result,
            Err(TransportError::PeerNotFound("NonExistent".to_string()))
        );
    }

    #[tokio::test]
    async fn chain_topology_message_passing() {
        // A -> B -> C
        let tr_a = LocalTransport::new("A");
        let tr_b = LocalTransport::new("B");
        let tr_c = LocalTransport::new("C");

        tr_a.connect(tr_b.clone()).unwrap();
        tr_b.connect(tr_c.clone()).unwrap();

        let mut rx_b = tr_b.consume().unwrap();

        tr_a.send_message(tr_b.addr(), Bytes::from("from A")).await.unwrap();
        assert_eq!(rx_b.recv().await.unwrap().from, "A");

        // not connected
        assert!(tr_a.send_message(tr_c.addr(), Bytes::from("test")).await.is_err());
    }
}
