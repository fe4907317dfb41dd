//! Shared, immutable-by-default byte buffer.

use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink, MAX_VEC_LEN, take};
use std::ops::Deref;
use std::sync::Arc;

/// Reference-counted byte buffer.
///
/// Payloads are handed to the pool, the rebroadcast queue and every peer
/// transport; clones share one allocation. Writes copy on demand.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Bytes(Arc<Vec<u8>>);

impl Bytes {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self(Arc::new(data.into()))
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self(Arc::new(data))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.as_ref().clone()
    }

    /// Appends bytes, detaching from other clones first.
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        Arc::make_mut(&mut self.0).extend_from_slice(data);
    }
}

impl Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Encode for Bytes {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.len().encode(out);
        out.write(self.as_slice());
    }
}

impl Decode for Bytes {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let len = usize::decode(input)?;
        if len > MAX_VEC_LEN {
            return Err(DecodeError::LengthOverflow);
        }
        Ok(Bytes::from(take(input, len)?))
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl From<&[u8]> for Bytes {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}

impl<const N: usize> From<&[u8; N]> for Bytes {
    fn from(data: &[u8; N]) -> Self {
        Self::new(data.as_slice())
    }
}

impl From<&str> for Bytes {
    fn from(data: &str) -> Self {
        Self::new(data)
    }
}

impl From<String> for Bytes {
    fn from(data: String) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_until_written() {
        let a = Bytes::from("shared");
        let mut b = a.clone();
        b.extend_from_slice(b"!");
        assert_eq!(a.as_slice(), b"shared");
        assert_eq!(b.as_slice(), b"shared!");
    }

    #[test]
    fn decode_reads_exactly_the_prefixed_length() {
        let encoded = Bytes::from("abc").to_bytes();
        let mut input = encoded.as_slice();
        let decoded = Bytes::decode(&mut input).unwrap();
        assert_eq!(decoded.as_slice(), b"abc");
        assert!(input.is_empty());
    }
}
