//! 20-byte account addresses derived from public keys.

use minichain_derive::BinaryCodec;
use std::fmt;

pub const ADDRESS_LEN: usize = 20;

/// Account address: the low 20 bytes of the SHA-256 of a compressed public key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, BinaryCodec)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Builds an address from exactly [`ADDRESS_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Address> {
        <[u8; ADDRESS_LEN]>::try_from(bytes).ok().map(Address)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_checks_length() {
        assert_eq!(Address::from_slice(&[7u8; 20]), Some(Address([7u8; 20])));
        assert_eq!(Address::from_slice(&[7u8; 32]), None);
    }

    #[test]
    fn displays_as_hex() {
        let mut raw = [0u8; 20];
        raw[19] = 0xab;
        assert_eq!(Address(raw).to_string(), format!("{}ab", "00".repeat(19)));
    }
}
