//! Deterministic binary codec shared by every wire and hashing path.
//!
//! # Layout
//!
//! - Integers: little-endian, fixed width (`usize` travels as `u64`)
//! - `bool`: one byte, `0` or `1`
//! - `Vec<T>`: u64 length prefix, then the elements
//! - `Option<T>`: one tag byte (`0` = None, `1` = Some) then the value
//! - `[T; N]`: the elements back to back, no prefix
//!
//! Encoding never fails. Decoding works on a shrinking `&[u8]` cursor so
//! composite types can be read field by field.

use crate::types::bytes::Bytes;
use minichain_derive::Error;

/// Destination for encoded bytes.
///
/// Byte buffers, size counters and hashers all implement it, so a value can
/// be hashed without materialising its encoding first.
pub trait EncodeSink {
    fn write(&mut self, bytes: &[u8]);
}

/// Sink that only counts how many bytes would be written.
#[derive(Default)]
pub struct SizeCounter {
    len: usize,
}

impl SizeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl EncodeSink for SizeCounter {
    fn write(&mut self, bytes: &[u8]) {
        self.len += bytes.len();
    }
}

impl EncodeSink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

impl EncodeSink for Bytes {
    fn write(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Types with a binary wire form.
pub trait Encode {
    fn encode<S: EncodeSink>(&self, out: &mut S);

    /// Encodes into a buffer sized exactly for the value.
    fn to_bytes(&self) -> Bytes {
        let mut counter = SizeCounter::new();
        self.encode(&mut counter);

        let mut out = Vec::with_capacity(counter.len());
        self.encode(&mut out);
        Bytes::from_vec(out)
    }
}

/// Reasons untrusted input fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid value")]
    InvalidValue,
    #[error("length prefix exceeds the allowed maximum")]
    LengthOverflow,
    #[error("embedded content hash does not match the payload")]
    HashMismatch,
}

/// Types that can be rebuilt from their wire form.
pub trait Decode: Sized {
    /// Reads one value and advances `input` past it.
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError>;

    /// Decodes a value that must span the whole of `data`.
    fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let mut input = data;
        let value = Self::decode(&mut input)?;
        if !input.is_empty() {
            return Err(DecodeError::InvalidValue);
        }
        Ok(value)
    }
}

/// Upper bound on decoded collection lengths.
pub const MAX_VEC_LEN: usize = 1_000_000;

/// Splits `n` bytes off the front of `input`.
pub(crate) fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], DecodeError> {
    if input.len() < n {
        return Err(DecodeError::UnexpectedEof);
    }
    let (head, rest) = input.split_at(n);
    *input = rest;
    Ok(head)
}

macro_rules! impl_le_int {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode<S: EncodeSink>(&self, out: &mut S) {
                    out.write(&self.to_le_bytes());
                }
            }

            impl Decode for $t {
                fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
                    let raw = take(input, std::mem::size_of::<$t>())?;
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(raw);
                    Ok(<$t>::from_le_bytes(buf))
                }
            }
        )*
    };
}

impl_le_int!(u8, u32, u64, i64);

impl Encode for usize {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        (*self as u64).encode(out);
    }
}

impl Decode for usize {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        usize::try_from(u64::decode(input)?).map_err(|_| DecodeError::LengthOverflow)
    }
}

impl Encode for bool {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&[u8::from(*self)]);
    }
}

impl Decode for bool {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        match u8::decode(input)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(DecodeError::InvalidValue),
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.len().encode(out);
        for item in self {
            item.encode(out);
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let len = usize::decode(input)?;
        if len > MAX_VEC_LEN {
            return Err(DecodeError::LengthOverflow);
        }
        // Never trust the prefix for the allocation size.
        let mut items = Vec::with_capacity(len.min(input.len()));
        for _ in 0..len {
            items.push(T::decode(input)?);
        }
        Ok(items)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        match self {
            None => 0u8.encode(out),
            Some(value) => {
                1u8.encode(out);
                value.encode(out);
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        match u8::decode(input)? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(input)?)),
            _ => Err(DecodeError::InvalidValue),
        }
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(self);
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(take(input, N)?);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_counter_matches_encoded_length() {
        let value: Vec<u32> = vec![1, 2, 3];
        let mut counter = SizeCounter::new();
        value.encode(&mut counter);
        assert_eq!(counter.len(), value.to_bytes().len());
        assert_eq!(counter.len(), 8 + 3 * 4);
    }

    #[test]
    fn integers_are_little_endian() {
        assert_eq!(0x1234_5678u32.to_bytes().as_slice(), &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!((-1i64).to_bytes().as_slice(), &[0xFF; 8]);
    }

    #[test]
    fn vec_carries_u64_length_prefix() {
        let bytes = vec![0xAAu8, 0xBB].to_bytes();
        assert_eq!(&bytes[..8], &2u64.to_le_bytes());
        assert_eq!(&bytes[8..], &[0xAA, 0xBB]);
    }

    #[test]
    fn vec_rejects_oversized_prefix() {
        let bytes = ((MAX_VEC_LEN as u64) + 1).to_bytes();
        assert_eq!(Vec::<u8>::from_bytes(&bytes), Err(DecodeError::LengthOverflow));
    }

    #[test]
    fn vec_with_lying_prefix_hits_eof() {
        let mut bytes = Vec::new();
        1000u64.encode(&mut bytes);
        bytes.extend_from_slice(&[1, 2, 3]);
        assert_eq!(Vec::<u8>::from_bytes(&bytes), Err(DecodeError::UnexpectedEof));
    }

    #[test]
    fn option_tags() {
        assert_eq!(None::<u32>.to_bytes().as_slice(), &[0]);
        let some = Some(7u32).to_bytes();
        assert_eq!(some[0], 1);
        assert_eq!(Option::<u32>::from_bytes(&some), Ok(Some(7)));
        assert_eq!(Option::<u32>::from_bytes(&[2, 0, 0, 0, 0]), Err(DecodeError::InvalidValue));
    }

    #[test]
    fn bool_rejects_values_above_one() {
        assert_eq!(bool::from_bytes(&[1]), Ok(true));
        assert_eq!(bool::from_bytes(&[2]), Err(DecodeError::InvalidValue));
    }

    #[test]
    fn fixed_arrays_have_no_prefix() {
        let bytes = [9u8, 8, 7].to_bytes();
        assert_eq!(bytes.as_slice(), &[9, 8, 7]);
    }

    #[test]
    fn from_bytes_rejects_trailing_input() {
        assert_eq!(u8::from_bytes(&[1, 2]), Err(DecodeError::InvalidValue));
    }

    #[test]
    fn decode_advances_cursor() {
        let mut input: &[u8] = &[0x01, 0x02, 0x03, 0x04, 0x05, 0xFF];
        assert_eq!(u8::decode(&mut input), Ok(0x01));
        assert_eq!(u32::decode(&mut input), Ok(0x0504_0302));
        assert_eq!(input, &[0xFF]);
        assert_eq!(u32::decode(&mut input), Err(DecodeError::UnexpectedEof));
    }
}
