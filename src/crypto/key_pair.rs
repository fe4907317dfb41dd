//! ECDSA key pairs on secp256k1.
//!
//! Messages are hashed with SHA-256 by the signer. Public keys travel in
//! compressed SEC1 form (33 bytes) and derive their [`Address`] from it.

use crate::types::address::{ADDRESS_LEN, Address};
use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};
use crate::types::hash::{HASH_LEN, Hash};
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{SigningKey, VerifyingKey};
use minichain_derive::Error;
use rand_core::OsRng;
use std::fmt;

/// Length of a compressed SEC1 public key.
pub const PUBLIC_KEY_LEN: usize = 33;

/// Length of an encoded signature (`r || s`).
pub const SIGNATURE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid public key encoding")]
    InvalidPublicKey,
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Private key used by transaction senders and block validators.
///
/// Never encoded or sent over the network.
#[derive(Clone)]
pub struct PrivateKey {
    key: SigningKey,
}

impl PrivateKey {
    /// Generates a key from OS entropy.
    pub fn new() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    /// Returns `None` if `bytes` is not a valid secp256k1 scalar.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        SigningKey::from_slice(bytes).ok().map(|key| Self { key })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(self.key.verifying_key().clone())
    }

    /// Signs the SHA-256 digest of `data`.
    pub fn sign(&self, data: &[u8]) -> Result<Signature, KeyError> {
        self.key
            .try_sign(data)
            .map(Signature)
            .map_err(|e| KeyError::Signing(e.to_string()))
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.public_key().address())
    }
}

/// Public half of a key pair.
///
/// Keeps its compressed encoding alongside the curve point so hashing and
/// address derivation never re-serialize.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    key: VerifyingKey,
    compressed: [u8; PUBLIC_KEY_LEN],
}

impl PublicKey {
    fn from_verifying_key(key: VerifyingKey) -> Self {
        let point = key.to_encoded_point(true);
        let mut compressed = [0u8; PUBLIC_KEY_LEN];
        compressed.copy_from_slice(point.as_bytes());
        Self { key, compressed }
    }

    /// Parses a compressed or uncompressed SEC1 encoding.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(Self::from_verifying_key)
            .map_err(|_| KeyError::InvalidPublicKey)
    }

    /// Compressed SEC1 encoding.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.compressed
    }

    /// Low 20 bytes of SHA-256 over the compressed encoding.
    pub fn address(&self) -> Address {
        let digest = Hash::sha256(&self.compressed);
        let mut addr = [0u8; ADDRESS_LEN];
        addr.copy_from_slice(&digest.0[HASH_LEN - ADDRESS_LEN..]);
        Address(addr)
    }

    pub fn verify(&self, data: &[u8], signature: &Signature) -> bool {
        self.key.verify(data, &signature.0).is_ok()
    }
}

impl Encode for PublicKey {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&self.compressed);
    }
}

impl Decode for PublicKey {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let raw = <[u8; PUBLIC_KEY_LEN]>::decode(input)?;
        PublicKey::from_sec1_bytes(&raw).map_err(|_| DecodeError::InvalidValue)
    }
}

/// ECDSA signature: the scalar pair `(r, s)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature(k256::ecdsa::Signature);

impl Signature {
    fn half(&self, offset: usize) -> [u8; 32] {
        let bytes = self.0.to_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes[offset..offset + 32]);
        out
    }

    /// Big-endian `r` component.
    pub fn r(&self) -> [u8; 32] {
        self.half(0)
    }

    /// Big-endian `s` component.
    pub fn s(&self) -> [u8; 32] {
        self.half(32)
    }
}

impl Encode for Signature {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&self.0.to_bytes());
    }
}

impl Decode for Signature {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let raw = <[u8; SIGNATURE_LEN]>::decode(input)?;
        k256::ecdsa::Signature::from_slice(&raw)
            .map(Signature)
            .map_err(|_| DecodeError::InvalidValue)
    }
}
