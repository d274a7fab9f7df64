//! # Addresses
//!
//! A 20-byte account identifier shared by externally owned accounts and
//! deployed contracts. The text form is `0x` followed by 40 hex digits.
//! Parsing is case-insensitive, so mixed-case checksummed fixtures are
//! accepted as-is; display is always lowercase.
//!
//! Contract addresses are derived deterministically from the deployer and its
//! deployment nonce:
//!
//! ```text
//! address = BLAKE3(domain || deployer || nonce_be)[..20]
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{ADDRESS_DERIVATION_DOMAIN, ADDRESS_HEX_LENGTH, ADDRESS_LENGTH};

/// Errors produced when parsing an address from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The string does not start with `0x`.
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),

    /// The string has the wrong number of characters.
    #[error("address must be {expected} characters, got {actual}")]
    InvalidLength {
        /// Required length including the prefix.
        expected: usize,
        /// Length of the rejected input.
        actual: usize,
    },

    /// The body is not valid hex.
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),
}

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The zero address. Never a valid owner.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Wraps raw bytes as an address.
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Derives the address of the `nonce`-th contract deployed by `deployer`.
    pub fn derive(deployer: &Address, nonce: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(ADDRESS_DERIVATION_DOMAIN);
        hasher.update(&deployer.0);
        hasher.update(&nonce.to_be_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest.as_bytes()[..ADDRESS_LENGTH]);
        Self(bytes)
    }

    /// Deterministic address for a human-readable label. Handy for tests,
    /// demos and dev tooling where real keys are irrelevant.
    pub fn from_label(label: &str) -> Self {
        let digest = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest.as_bytes()[..ADDRESS_LENGTH]);
        Self(bytes)
    }

    /// Returns `true` for the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix(s.to_string()))?;

        if s.len() != ADDRESS_HEX_LENGTH {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_HEX_LENGTH,
                actual: s.len(),
            });
        }

        let mut bytes = [0u8; ADDRESS_LENGTH];
        hex::decode_to_slice(body, &mut bytes)
            .map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
