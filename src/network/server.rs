//! Node event loop.
//!
//! Every transport forwards its inbound stream into one intake queue. The
//! loop handles one event at a time (an inbound message or a block-time tick)
//! so pool and chain mutations from the message path never interleave.
//! Re-broadcasts are handed to a separate broadcaster task and never awaited.
//! Forwarders and the broadcaster are owned by [`Server::start`] and aborted
//! before it returns.

use crate::core::block::{Block, BlockError};
use crate::core::blockchain::{Blockchain, ChainError};
use crate::core::transaction::{Transaction, TransactionError};
use crate::crypto::key_pair::PrivateKey;
use crate::network::rpc::{
    DecodeRpcFn, DecodedMessage, DecodedPayload, Message, Rpc, default_rpc_decode,
};
use crate::network::transport::{Transport, TransportError};
use crate::network::txpool::{TXPOOL_CAPACITY, TxPool};
use crate::types::bytes::Bytes;
use crate::types::encoding::Encode;
use crate::{debug, error, info, warn};
use minichain_derive::Error;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

pub const DEFAULT_BLOCK_TIME: Duration = Duration::from_secs(5);
pub const DEFAULT_INTAKE_CAPACITY: usize = 1024;
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    #[error("transaction rejected: {0}")]
    Transaction(TransactionError),
    #[error("block rejected: {0}")]
    Chain(ChainError),
    #[error("block production failed: {0}")]
    Block(BlockError),
    #[error(transparent)]
    Transport(TransportError),
}

impl From<TransactionError> for ServerError {
    fn from(err: TransactionError) -> Self {
        ServerError::Transaction(err)
    }
}

impl From<ChainError> for ServerError {
    fn from(err: ChainError) -> Self {
        ServerError::Chain(err)
    }
}

impl From<BlockError> for ServerError {
    fn from(err: BlockError) -> Self {
        ServerError::Block(err)
    }
}

impl From<TransportError> for ServerError {
    fn from(err: TransportError) -> Self {
        ServerError::Transport(err)
    }
}

/// Node configuration.
pub struct ServerOps {
    /// Prefix for every log line of this node.
    pub id: String,
    pub transports: Vec<Arc<dyn Transport>>,
    /// Present on validators only.
    pub private_key: Option<PrivateKey>,
    /// Block production interval. Zero means [`DEFAULT_BLOCK_TIME`].
    pub block_time: Duration,
    /// Pre-allocation hint for the pool.
    pub tx_pool_capacity: usize,
    pub rpc_decode: DecodeRpcFn,
    pub intake_capacity: usize,
    pub broadcast_capacity: usize,
}

impl ServerOps {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            transports: Vec::new(),
            private_key: None,
            block_time: DEFAULT_BLOCK_TIME,
            tx_pool_capacity: TXPOOL_CAPACITY,
            rpc_decode: default_rpc_decode,
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transports.push(transport);
        self
    }

    pub fn with_transports(mut self, transports: Vec<Arc<dyn Transport>>) -> Self {
        self.transports = transports;
        self
    }

    pub fn with_private_key(mut self, key: PrivateKey) -> Self {
        self.private_key = Some(key);
        self
    }

    pub fn with_block_time(mut self, block_time: Duration) -> Self {
        self.block_time = block_time;
        self
    }

    pub fn with_tx_pool_capacity(mut self, capacity: usize) -> Self {
        self.tx_pool_capacity = capacity;
        self
    }

    pub fn with_rpc_decode(mut self, decode: DecodeRpcFn) -> Self {
        self.rpc_decode = decode;
        self
    }

    pub fn with_intake_capacity(mut self, capacity: usize) -> Self {
        self.intake_capacity = capacity;
        self
    }

    pub fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }
}

/// A node: one chain, one pool, any number of transports.
pub struct Server {
    ops: ServerOps,
    chain: Arc<Blockchain>,
    tx_pool: Arc<TxPool>,
    intake_tx: Option<Sender<Rpc>>,
    intake_rx: Receiver<Rpc>,
    broadcast_tx: Sender<Bytes>,
    broadcast_rx: Option<Receiver<Bytes>>,
}

impl Server {
    pub fn new(mut ops: ServerOps, chain: Blockchain) -> Self {
        if ops.block_time.is_zero() {
            ops.block_time = DEFAULT_BLOCK_TIME;
        }
        let (intake_tx, intake_rx) = channel(ops.intake_capacity.max(1));
        let (broadcast_tx, broadcast_rx) = channel(ops.broadcast_capacity.max(1));
        let tx_pool = Arc::new(TxPool::with_capacity(ops.tx_pool_capacity));

        Self {
            ops,
            chain: Arc::new(chain),
            tx_pool,
            intake_tx: Some(intake_tx),
            intake_rx,
            broadcast_tx,
            broadcast_rx: Some(broadcast_rx),
        }
    }

    pub fn id(&self) -> &str {
        &self.ops.id
    }

    pub fn is_validator(&self) -> bool {
        self.ops.private_key.is_some()
    }

    pub fn chain(&self) -> Arc<Blockchain> {
        self.chain.clone()
    }

    pub fn tx_pool(&self) -> Arc<TxPool> {
        self.tx_pool.clone()
    }

    /// Runs the event loop until `shutdown` fires or its sender is dropped.
    ///
    /// Every task spawned here is aborted and joined before returning, so
    /// queued broadcasts are abandoned and the inbound streams are closed.
    /// Fails only if a transport's inbound stream was already taken.
    pub async fn start(mut self, mut shutdown: oneshot::Receiver<()>) -> Result<(), ServerError> {
        let mut tasks = JoinSet::new();
        self.init_transports(&mut tasks)?;
        self.spawn_broadcaster(&mut tasks);

        let block_time = self.ops.block_time;
        let mut ticker = interval_at(Instant::now() + block_time, block_time);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let is_validator = self.is_validator();

        info!(
            "[{}] server started: validator={} block_time={:?} transports={}",
            self.ops.id,
            is_validator,
            block_time,
            self.ops.transports.len()
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(rpc) = self.intake_rx.recv() => self.handle_rpc(rpc),
                _ = ticker.tick(), if is_validator => {
                    if let Err(e) = self.create_new_block() {
                        error!("[{}] could not create block: {}", self.ops.id, e);
                    }
                }
            }
        }

        tasks.shutdown().await;
        info!("[{}] server shut down", self.ops.id);
        Ok(())
    }

    /// Spawns one forwarder per transport draining into the intake queue.
    fn init_transports(&mut self, tasks: &mut JoinSet<()>) -> Result<(), ServerError> {
        let Some(intake) = self.intake_tx.take() else {
            return Ok(());
        };

        for transport in &self.ops.transports {
            let mut rx = transport.consume()?;
            let sender = intake.clone();

            tasks.spawn(async move {
                while let Some(rpc) = rx.recv().await {
                    if sender.send(rpc).await.is_err() {
                        break;
                    }
                }
            });
        }
        Ok(())
    }

    fn spawn_broadcaster(&mut self, tasks: &mut JoinSet<()>) {
        let Some(mut rx) = self.broadcast_rx.take() else {
            return;
        };
        let transports = self.ops.transports.clone();
        let id = self.ops.id.clone();

        tasks.spawn(async move {
            while let Some(payload) = rx.recv().await {
                for transport in &transports {
                    if let Err(e) = transport.broadcast(payload.clone()).await {
                        warn!("[{}] broadcast via {} failed: {}", id, transport.addr(), e);
                    }
                }
            }
        });
    }

    fn handle_rpc(&self, rpc: Rpc) {
        let from = rpc.from.clone();
        let decoded = match (self.ops.rpc_decode)(rpc) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("[{}] dropping message from {}: {}", self.ops.id, from, e);
                return;
            }
        };

        match self.process_message(decoded) {
            Ok(()) => {}
            Err(ServerError::Chain(e @ ChainError::AlreadyHaveBlock { .. })) => {
                debug!("[{}] ignoring block from {}: {}", self.ops.id, from, e);
            }
            Err(e) => warn!("[{}] message from {} rejected: {}", self.ops.id, from, e),
        }
    }

    /// Dispatches one decoded message to its handler.
    pub fn process_message(&self, message: DecodedMessage) -> Result<(), ServerError> {
        match message.data {
            DecodedPayload::Transaction(tx) => self.process_transaction(tx),
            DecodedPayload::Block(block) => self.process_block(block),
        }
    }

    fn process_transaction(&self, mut tx: Transaction) -> Result<(), ServerError> {
        let hash = tx.hash();
        if self.tx_pool.contains(&hash) {
            debug!("[{}] transaction already in pool: hash={}", self.ops.id, hash);
            return Ok(());
        }

        tx.verify()?;
        tx.set_first_seen(unix_nanos());

        info!(
            "[{}] adding transaction to pool: hash={} pool_len={}",
            self.ops.id,
            hash,
            self.tx_pool.len()
        );

        self.broadcast(Message::transaction(&tx).to_bytes());
        self.tx_pool.add(tx);
        Ok(())
    }

    fn process_block(&self, block: Block) -> Result<(), ServerError> {
        self.chain.add_block(&block)?;
        info!(
            "[{}] accepted block: height={} hash={}",
            self.ops.id,
            block.height(),
            block.hash()
        );
        self.broadcast(Message::block(&block).to_bytes());
        Ok(())
    }

    /// Proposes an empty block on top of the current head. No-op on non-validators.
    pub fn create_new_block(&self) -> Result<(), ServerError> {
        let Some(key) = &self.ops.private_key else {
            return Ok(());
        };

        let head = self.chain.get_header(self.chain.height())?;
        let mut block = Block::from_parent(&head, Vec::new());
        block.sign(key)?;
        self.chain.add_block(&block)?;

        info!(
            "[{}] created block: height={} hash={}",
            self.ops.id,
            block.height(),
            block.hash()
        );
        self.broadcast(Message::block(&block).to_bytes());
        Ok(())
    }

    /// Queues `payload` for the broadcaster. A full queue drops it.
    fn broadcast(&self, payload: Bytes) {
        match self.broadcast_tx.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("[{}] broadcast queue full, dropping message", self.ops.id);
            }
            Err(TrySendError::Closed(_)) => {
                warn!("[{}] broadcaster stopped, dropping message", self.ops.id);
            }
        }
    }
}

fn unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default()
}
