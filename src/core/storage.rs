//! Sinks for accepted block bodies.
//!
//! The chain keeps only headers; every accepted block is handed to a
//! [`Storage`] exactly once.

use crate::core::block::Block;
use crate::types::hash::Hash;
use minichain_derive::Error;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Block persistence capability.
pub trait Storage: Send + Sync {
    fn put(&self, block: &Block) -> Result<(), StorageError>;
}

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn put(&self, block: &Block) -> Result<(), StorageError> {
        (**self).put(block)
    }
}

/// Keeps accepted blocks in memory, keyed by header hash.
#[derive(Default)]
pub struct MemoryStorage {
    blocks: RwLock<HashMap<Hash, Block>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &Hash) -> Option<Block> {
        self.blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn put(&self, block: &Block) -> Result<(), StorageError> {
        self.blocks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(block.hash(), block.clone());
        Ok(())
    }
}

/// Accepts and discards every block.
#[derive(Default, Clone, Copy)]
pub struct NullStorage;

impl Storage for NullStorage {
    fn put(&self, _block: &Block) -> Result<(), StorageError> {
        Ok(())
    }
}
