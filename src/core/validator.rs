//! Rules deciding whether a block may extend the chain.

use crate::core::block::Block;
use crate::core::blockchain::{Blockchain, ChainError};

/// Block admission policy.
///
/// The chain passes itself in on every call, so policies stay stateless and
/// can be swapped with [`Blockchain::set_validator`].
pub trait Validator: Send + Sync {
    fn validate_block(&self, chain: &Blockchain, block: &Block) -> Result<(), ChainError>;
}

/// Default policy: strictly the next height, linked to the current head,
/// and cryptographically sound.
#[derive(Clone, Copy, Default)]
pub struct BlockValidator;

impl Validator for BlockValidator {
    fn validate_block(&self, chain: &Blockchain, block: &Block) -> Result<(), ChainError> {
        let height = block.height();
        if chain.has_block(height) {
            return Err(ChainError::AlreadyHaveBlock {
                height,
                hash: block.hash(),
            });
        }

        let current = chain.height();
        if current.checked_add(1) != Some(height) {
            return Err(ChainError::HeightTooHigh { height, current });
        }

        let expected = chain.get_header(height - 1)?.hash();
        if expected != block.header.prev_block_hash {
            return Err(ChainError::PreviousHashMismatch {
                expected,
                actual: block.header.prev_block_hash,
            });
        }

        block.verify()?;
        Ok(())
    }
}
