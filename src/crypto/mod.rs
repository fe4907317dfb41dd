//! Key management and ECDSA signatures over secp256k1.

pub mod key_pair;
