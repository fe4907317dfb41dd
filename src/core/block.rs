//! Block headers and blocks.
//!
//! Only the [`Header`] is hashed and signed; the transaction list is bound to
//! it through `data_hash`.

use crate::core::transaction::{Transaction, TransactionError};
use crate::crypto::key_pair::{KeyError, PrivateKey, PublicKey, Signature};
use crate::types::encoding::Encode;
use crate::types::hash::{Hash, HashCache};
use minichain_derive::{BinaryCodec, Error};
use std::time::{SystemTime, UNIX_EPOCH};

/// Version stamped on newly proposed blocks.
pub const BLOCK_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("block has no signature")]
    NoSignature,
    #[error("block {0} has an invalid signature")]
    InvalidSignature(Hash),
    #[error("block contains an invalid transaction: {0}")]
    Transaction(TransactionError),
    #[error("data hash mismatch: header has {expected}, transactions hash to {actual}")]
    DataHashMismatch { expected: Hash, actual: Hash },
    #[error("could not sign block: {0}")]
    Signing(KeyError),
}

impl From<TransactionError> for BlockError {
    fn from(err: TransactionError) -> Self {
        BlockError::Transaction(err)
    }
}

impl From<KeyError> for BlockError {
    fn from(err: KeyError) -> Self {
        BlockError::Signing(err)
    }
}

/// Block metadata. Its encoding is what gets hashed, signed and chained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, BinaryCodec)]
pub struct Header {
    pub version: u32,
    pub prev_block_hash: Hash,
    /// Unix nanoseconds at proposal time.
    pub timestamp: u64,
    /// Genesis is 0.
    pub height: u32,
    pub data_hash: Hash,
}

impl Header {
    /// SHA-256 over the encoded header. Not cached; use [`Block::hash`] for that.
    pub fn hash(&self) -> Hash {
        let mut h = Hash::builder();
        self.encode(&mut h);
        h.finalize()
    }
}

/// Header plus transaction body, proposer key and block signature.
#[derive(Clone, Debug, Default, PartialEq, Eq, BinaryCodec)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    pub validator: Option<PublicKey>,
    pub signature: Option<Signature>,

    #[binary_codec(skip)]
    cached_hash: HashCache,
}

impl Block {
    /// Wraps an existing header and body; the block starts unsigned.
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
            ..Self::default()
        }
    }

    /// Deterministic, unsigned genesis block shared by every node.
    pub fn genesis() -> Self {
        let header = Header {
            version: BLOCK_VERSION,
            prev_block_hash: Hash::zero(),
            timestamp: 0,
            height: 0,
            data_hash: Self::data_hash(&[]),
        };
        Self::new(header, Vec::new())
    }

    /// Builds the unsigned child of `parent` carrying `transactions`.
    pub fn from_parent(parent: &Header, transactions: Vec<Transaction>) -> Self {
        let header = Header {
            version: BLOCK_VERSION,
            prev_block_hash: parent.hash(),
            timestamp: now_nanos(),
            height: parent.height + 1,
            data_hash: Self::data_hash(&transactions),
        };
        Self::new(header, transactions)
    }

    /// Hashes the concatenated encodings of `transactions`, in order.
    pub fn data_hash(transactions: &[Transaction]) -> Hash {
        let mut h = Hash::builder();
        for tx in transactions {
            tx.encode(&mut h);
        }
        h.finalize()
    }

    /// Signs the encoded header and records the signer as validator.
    pub fn sign(&mut self, key: &PrivateKey) -> Result<(), BlockError> {
        let signature = key.sign(&self.header.to_bytes())?;
        self.validator = Some(key.public_key());
        self.signature = Some(signature);
        Ok(())
    }

    /// Checks, in order: signature presence, the header signature, every
    /// transaction, then the data hash. Stops at the first failure.
    pub fn verify(&self) -> Result<(), BlockError> {
        let (Some(signature), Some(validator)) = (&self.signature, &self.validator) else {
            return Err(BlockError::NoSignature);
        };
        if !validator.verify(&self.header.to_bytes(), signature) {
            return Err(BlockError::InvalidSignature(self.hash()));
        }

        for tx in &self.transactions {
            tx.verify()?;
        }

        let actual = Self::data_hash(&self.transactions);
        if actual != self.header.data_hash {
            return Err(BlockError::DataHashMismatch {
                expected: self.header.data_hash,
                actual,
            });
        }
        Ok(())
    }

    /// Header hash, computed once. Later edits to `header` are not reflected.
    pub fn hash(&self) -> Hash {
        self.cached_hash.get_or_compute(|| self.header.hash())
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::{Decode, DecodeError};
    use crate::utils::test_utils::utils::{random_header, random_tx, signed_block};

    #[test]
    fn header_encoding_has_fixed_field_order() {
        let header = random_header(7);
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), 4 + 32 + 8 + 4 + 32);
        assert_eq!(&bytes[..4], &header.version.to_le_bytes());
        assert_eq!(&bytes[4..36], header.prev_block_hash.as_slice());
        assert_eq!(&bytes[44..48], &7u32.to_le_bytes());
        assert_eq!(Header::from_bytes(&bytes), Ok(header));
    }

    #[test]
    fn header_decode_insufficient_data() {
        let bytes = random_header(3).to_bytes();
        assert_eq!(Header::from_bytes(&bytes[..50]), Err(DecodeError::UnexpectedEof));
    }

    #[test]
    fn different_headers_different_hashes() {
        assert_ne!(random_header(5).hash(), random_header(5).hash());
    }

    #[test]
    fn hash_is_deterministic() {
        let block = Block::new(random_header(1), vec![]);
        assert_eq!(block.hash(), block.hash());
        assert_eq!(block.hash(), block.header.hash());
    }

    #[test]
    fn hash_is_not_recomputed_after_header_mutation() {
        let mut block = Block::new(random_header(1), vec![]);
        let cached = block.hash();
        block.header.height = 99;
        assert_eq!(block.hash(), cached);
        assert_ne!(block.header.hash(), cached);
    }

    #[test]
    fn from_parent_links_to_parent() {
        let parent = random_header(4);
        let block = Block::from_parent(&parent, vec![]);

        assert_eq!(block.header.version, BLOCK_VERSION);
        assert_eq!(block.height(), 5);
        assert_eq!(block.header.prev_block_hash, parent.hash());
        assert_eq!(block.header.data_hash, Block::data_hash(&[]));
        assert!(block.header.timestamp > 0);
        assert!(block.signature.is_none());
    }

    #[test]
    fn genesis_is_deterministic() {
        let genesis = Block::genesis();
        assert_eq!(genesis.height(), 0);
        assert!(genesis.header.prev_block_hash.is_zero());
        assert_eq!(genesis.hash(), Block::genesis().hash());
        assert_eq!(genesis.verify(), Err(BlockError::NoSignature));
    }

    #[test]
    fn empty_signed_block_verifies() {
        let key = PrivateKey::new();
        let block = signed_block(&random_header(0), vec![], &key);
        assert_eq!(block.validator, Some(key.public_key()));
        assert_eq!(block.verify(), Ok(()));
    }

    #[test]
    fn verify_fails_without_signature() {
        let block = Block::from_parent(&random_header(0), vec![]);
        assert_eq!(block.verify(), Err(BlockError::NoSignature));
    }

    #[test]
    fn altered_height_with_stale_signature_fails() {
        let block = signed_block(&random_header(0), vec![], &PrivateKey::new());

        let mut header = block.header;
        header.height += 1;
        let mut forged = Block::new(header, vec![]);
        forged.validator = block.validator.clone();
        forged.signature = block.signature;

        assert_eq!(forged.verify(), Err(BlockError::InvalidSignature(forged.hash())));
    }

    #[test]
    fn verify_fails_with_wrong_validator() {
        let mut block = signed_block(&random_header(0), vec![], &PrivateKey::new());
        block.validator = Some(PrivateKey::new().public_key());
        assert!(matches!(block.verify(), Err(BlockError::InvalidSignature(_))));
    }

    #[test]
    fn block_with_transactions_verifies() {
        let txs = vec![random_tx(), random_tx()];
        let block = signed_block(&random_header(0), txs, &PrivateKey::new());
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.verify(), Ok(()));
    }

    #[test]
    fn verify_reports_first_bad_transaction() {
        let unsigned = Transaction::new(b"unsigned");
        let block = signed_block(&random_header(0), vec![random_tx(), unsigned], &PrivateKey::new());
        assert_eq!(
            block.verify(),
            Err(BlockError::Transaction(TransactionError::SignatureMissing))
        );
    }

    #[test]
    fn verify_detects_body_swapped_after_signing() {
        let mut block = signed_block(&random_header(0), vec![random_tx()], &PrivateKey::new());
        let expected = block.header.data_hash;
        block.transactions.push(random_tx());

        assert_eq!(
            block.verify(),
            Err(BlockError::DataHashMismatch {
                expected,
                actual: Block::data_hash(&block.transactions),
            })
        );
    }

    #[test]
    fn data_hash_depends_on_order() {
        let a = random_tx();
        let b = random_tx();
        assert_ne!(
            Block::data_hash(&[a.clone(), b.clone()]),
            Block::data_hash(&[b, a])
        );
    }

    #[test]
    fn data_hash_is_hash_of_concatenated_encodings() {
        let txs = vec![random_tx(), random_tx()];
        let mut concat = Vec::new();
        for tx in &txs {
            concat.extend_from_slice(&tx.to_bytes());
        }
        assert_eq!(Block::data_hash(&txs), Hash::sha256(&concat));
    }

    #[test]
    fn decoded_block_verifies_and_keeps_hash() {
        let block = signed_block(&random_header(2), vec![random_tx()], &PrivateKey::new());
        let decoded = Block::from_bytes(&block.to_bytes()).unwrap();

        assert_eq!(decoded, block);
        assert_eq!(decoded.hash(), block.hash());
        assert_eq!(decoded.verify(), Ok(()));
    }
}
