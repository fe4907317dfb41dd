//! 32-byte SHA-256 digests and the compute-once cache that holds them.

use crate::types::encoding::EncodeSink;
use minichain_derive::BinaryCodec;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;

/// SHA-256 digest length in bytes.
pub const HASH_LEN: usize = 32;

/// Fixed-size 32-byte hash.
///
/// Equality is byte-wise. The all-zero value is only a "nothing here" marker
/// (e.g. the genesis parent); caches use [`HashCache`] instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, BinaryCodec)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    pub fn zero() -> Hash {
        Hash([0u8; HASH_LEN])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Builds a hash from exactly [`HASH_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Hash> {
        <[u8; HASH_LEN]>::try_from(bytes).ok().map(Hash)
    }

    /// Fills a hash from the OS entropy source.
    pub fn random() -> Hash {
        let mut value = [0u8; HASH_LEN];
        OsRng.fill_bytes(&mut value);
        Hash(value)
    }

    /// One-shot SHA-256 of `data`.
    pub fn sha256(data: &[u8]) -> Hash {
        Hash(Sha256::digest(data).into())
    }

    /// Starts an incremental SHA-256 computation.
    pub fn builder() -> HashBuilder {
        HashBuilder::new()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Incremental SHA-256.
///
/// Doubles as an [`EncodeSink`], so `value.encode(&mut builder)` hashes the
/// wire form of `value` without an intermediate buffer.
pub struct HashBuilder {
    hasher: Sha256,
}

impl HashBuilder {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSink for HashBuilder {
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }
}

/// Compute-once slot for a derived hash.
///
/// The first call to [`get_or_compute`](Self::get_or_compute) fixes the value
/// for the lifetime of the owner; later mutations of the owner do not refresh
/// it. Caches carry no identity, so any two compare equal.
#[derive(Clone, Debug, Default)]
pub struct HashCache(OnceLock<Hash>);

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache that already holds `hash`.
    pub fn seeded(hash: Hash) -> Self {
        Self(OnceLock::from(hash))
    }

    pub fn get_or_compute(&self, compute: impl FnOnce() -> Hash) -> Hash {
        *self.0.get_or_init(compute)
    }

    pub fn get(&self) -> Option<Hash> {
        self.0.get().copied()
    }
}

impl PartialEq for HashCache {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl Eq for HashCache {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::Encode;

    #[test]
    fn zero_hash_is_zero() {
        assert!(Hash::zero().is_zero());
        assert!(Hash::default().is_zero());
        assert!(!Hash::sha256(b"x").is_zero());
    }

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            Hash::sha256(b"abc").to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn builder_over_encoding_equals_one_shot() {
        let value: Vec<u8> = b"streamed".to_vec();
        let mut builder = Hash::builder();
        value.encode(&mut builder);
        assert_eq!(builder.finalize(), Hash::sha256(value.to_bytes().as_slice()));
    }

    #[test]
    fn from_slice_requires_exact_length() {
        assert!(Hash::from_slice(&[1u8; HASH_LEN]).is_some());
        assert!(Hash::from_slice(&[1u8; HASH_LEN - 1]).is_none());
        assert!(Hash::from_slice(&[1u8; HASH_LEN + 1]).is_none());
    }

    #[test]
    fn random_hashes_differ() {
        assert_ne!(Hash::random(), Hash::random());
    }

    #[test]
    fn cache_computes_once() {
        let cache = HashCache::new();
        assert_eq!(cache.get(), None);
        let first = cache.get_or_compute(|| Hash::sha256(b"first"));
        let second = cache.get_or_compute(|| Hash::sha256(b"second"));
        assert_eq!(first, second);
        assert_eq!(cache.get(), Some(first));
    }

    #[test]
    fn cache_holds_a_legitimate_zero_hash() {
        let cache = HashCache::new();
        assert_eq!(cache.get_or_compute(Hash::zero), Hash::zero());
        assert_eq!(cache.get_or_compute(|| Hash::sha256(b"later")), Hash::zero());
    }
}
