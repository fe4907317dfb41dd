//! Append-only chain of headers.

use crate::core::block::{Block, BlockError, Header};
use crate::core::storage::{MemoryStorage, Storage, StorageError};
use crate::core::validator::{BlockValidator, Validator};
use crate::info;
use crate::types::hash::Hash;
use minichain_derive::Error;
use std::sync::{Mutex, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain already has block {hash} at height {height}")]
    AlreadyHaveBlock { height: u32, hash: Hash },
    #[error("height {height} is too high (current height {current})")]
    HeightTooHigh { height: u32, current: u32 },
    #[error("previous hash mismatch: expected {expected}, got {actual}")]
    PreviousHashMismatch { expected: Hash, actual: Hash },
    #[error(transparent)]
    Block(BlockError),
    #[error("could not persist block: {0}")]
    Storage(StorageError),
}

impl From<BlockError> for ChainError {
    fn from(err: BlockError) -> Self {
        ChainError::Block(err)
    }
}

impl From<StorageError> for ChainError {
    fn from(err: StorageError) -> Self {
        ChainError::Storage(err)
    }
}

/// Headers from genesis to head, plus the sink that receives full blocks.
///
/// Invariant: `headers[i].height == i`. Readers only ever get copies.
pub struct Blockchain {
    headers: RwLock<Vec<Header>>,
    storage: Box<dyn Storage>,
    validator: Box<dyn Validator>,
    /// Serializes validate-then-append so two callers cannot both win one height.
    append_guard: Mutex<()>,
}

impl Blockchain {
    /// Creates a chain backed by [`MemoryStorage`].
    pub fn new(genesis: Block) -> Result<Self, ChainError> {
        Self::with_storage(genesis, MemoryStorage::new())
    }

    /// Creates a chain that persists into `storage`. Genesis is trusted and
    /// appended without validation.
    pub fn with_storage(genesis: Block, storage: impl Storage + 'static) -> Result<Self, ChainError> {
        let chain = Self {
            headers: RwLock::new(Vec::new()),
            storage: Box::new(storage),
            validator: Box::new(BlockValidator),
            append_guard: Mutex::new(()),
        };

        info!(
            "Initializing blockchain with genesis block: height={} hash={}",
            genesis.height(),
            genesis.hash()
        );
        chain.append(&genesis)?;
        Ok(chain)
    }

    /// Replaces the admission policy.
    pub fn set_validator(&mut self, validator: impl Validator + 'static) {
        self.validator = Box::new(validator);
    }

    /// Height of the head header (genesis = 0).
    pub fn height(&self) -> u32 {
        let len = self.headers.read().unwrap_or_else(PoisonError::into_inner).len();
        len.saturating_sub(1) as u32
    }

    pub fn has_block(&self, height: u32) -> bool {
        height <= self.height()
    }

    pub fn get_header(&self, height: u32) -> Result<Header, ChainError> {
        let headers = self.headers.read().unwrap_or_else(PoisonError::into_inner);
        headers
            .get(height as usize)
            .copied()
            .ok_or_else(|| ChainError::HeightTooHigh {
                height,
                current: headers.len().saturating_sub(1) as u32,
            })
    }

    /// Validates `block` against the head, persists it, then appends its header.
    /// On any failure the chain is left as it was.
    pub fn add_block(&self, block: &Block) -> Result<(), ChainError> {
        let _guard = self.append_guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.validator.validate_block(self, block)?;
        self.append(block)
    }

    fn append(&self, block: &Block) -> Result<(), ChainError> {
        self.storage.put(block)?;
        self.headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(block.header);

        info!(
            "Added block: height={} hash={} transactions={}",
            block.height(),
            block.hash(),
            block.transactions.len()
        );
        Ok(())
    }
}
