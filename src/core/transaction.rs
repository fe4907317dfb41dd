//! Signed transactions carrying an opaque payload.

use crate::crypto::key_pair::{KeyError, PrivateKey, PublicKey, Signature};
use crate::types::bytes::Bytes;
use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};
use crate::types::hash::{Hash, HashCache};
use minichain_derive::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("transaction has no signature")]
    SignatureMissing,
    #[error("transaction {0} has an invalid signature")]
    SignatureInvalid(Hash),
}

/// Opaque payload signed by its sender.
///
/// Identity is the SHA-256 of the payload alone, so re-signing keeps the hash.
/// The hash is computed on first use and kept for the lifetime of the value,
/// even if `data` is edited afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub data: Bytes,
    pub from: Option<PublicKey>,
    pub signature: Option<Signature>,

    cached_hash: HashCache,
    /// Local admission time in Unix nanoseconds; only used for pool ordering.
    first_seen: i64,
}

impl Transaction {
    /// Creates an unsigned transaction.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Signs the payload and binds the signer as `from`, replacing any previous signature.
    pub fn sign(&mut self, key: &PrivateKey) -> Result<(), KeyError> {
        let signature = key.sign(&self.data)?;
        self.from = Some(key.public_key());
        self.signature = Some(signature);
        Ok(())
    }

    pub fn verify(&self) -> Result<(), TransactionError> {
        let (Some(signature), Some(from)) = (&self.signature, &self.from) else {
            return Err(TransactionError::SignatureMissing);
        };
        if !from.verify(&self.data, signature) {
            return Err(TransactionError::SignatureInvalid(self.hash()));
        }
        Ok(())
    }

    pub fn hash(&self) -> Hash {
        self.cached_hash.get_or_compute(|| Hash::sha256(&self.data))
    }

    pub fn first_seen(&self) -> i64 {
        self.first_seen
    }

    pub fn set_first_seen(&mut self, nanos: i64) {
        self.first_seen = nanos;
    }
}

impl Encode for Transaction {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.data.encode(out);
        self.from.encode(out);
        self.signature.encode(out);
        self.hash().encode(out);
        self.first_seen.encode(out);
    }
}

impl Decode for Transaction {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let data = Bytes::decode(input)?;
        let from = Option::<PublicKey>::decode(input)?;
        let signature = Option::<Signature>::decode(input)?;
        let hash = Hash::decode(input)?;
        let first_seen = i64::decode(input)?;

        if Hash::sha256(&data) != hash {
            return Err(DecodeError::HashMismatch);
        }

        Ok(Self {
            data,
            from,
            signature,
            cached_hash: HashCache::seeded(hash),
            first_seen,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::utils::random_tx;

    #[test]
    fn sign_then_verify() {
        let key = PrivateKey::new();
        let mut tx = Transaction::new(b"foo");
        tx.sign(&key).unwrap();

        assert_eq!(tx.from, Some(key.public_key()));
        assert!(tx.signature.is_some());
        assert_eq!(tx.verify(), Ok(()));
    }

    #[test]
    fn verify_fails_without_signature() {
        let tx = Transaction::new(b"foo");
        assert_eq!(tx.verify(), Err(TransactionError::SignatureMissing));
    }

    #[test]
    fn verify_fails_with_wrong_public_key() {
        let mut tx = Transaction::new(b"foo");
        tx.sign(&PrivateKey::new()).unwrap();
        tx.from = Some(PrivateKey::new().public_key());

        assert_eq!(tx.verify(), Err(TransactionError::SignatureInvalid(tx.hash())));
    }

    #[test]
    fn verify_is_repeatable() {
        let tx = random_tx();
        assert_eq!(tx.verify(), Ok(()));
        assert_eq!(tx.verify(), Ok(()));
    }

    #[test]
    fn hash_covers_payload_only() {
        let mut tx = Transaction::new(b"payload");
        assert_eq!(tx.hash(), Hash::sha256(b"payload"));

        tx.sign(&PrivateKey::new()).unwrap();
        let first = tx.hash();
        tx.sign(&PrivateKey::new()).unwrap();
        assert_eq!(tx.hash(), first);
    }

    #[test]
    fn hash_is_not_recomputed_after_mutation() {
        let mut tx = Transaction::new(b"before");
        let cached = tx.hash();
        tx.data = Bytes::from("after");
        assert_eq!(tx.hash(), cached);
    }

    #[test]
    fn first_seen_accessors() {
        let mut tx = Transaction::new(b"foo");
        assert_eq!(tx.first_seen(), 0);
        tx.set_first_seen(42);
        assert_eq!(tx.first_seen(), 42);
    }

    #[test]
    fn decoded_transaction_still_verifies() {
        let mut tx = random_tx();
        tx.set_first_seen(1_700_000_000_000_000_000);

        let decoded = Transaction::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.hash(), tx.hash());
        assert_eq!(decoded.first_seen(), tx.first_seen());
        assert_eq!(decoded.verify(), Ok(()));
    }

    #[test]
    fn decode_rejects_forged_hash() {
        let tx = random_tx();
        let mut bytes = tx.to_bytes().to_vec();
        // hash sits right before the trailing i64
        let hash_start = bytes.len() - 8 - 32;
        bytes[hash_start] ^= 0xFF;

        assert_eq!(Transaction::from_bytes(&bytes), Err(DecodeError::HashMismatch));
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let bytes = random_tx().to_bytes();
        assert_eq!(
            Transaction::from_bytes(&bytes[..bytes.len() - 1]),
            Err(DecodeError::UnexpectedEof)
        );
    }
}
