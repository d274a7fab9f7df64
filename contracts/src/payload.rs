//! # Call Payloads
//!
//! A transaction stored in a wallet carries an opaque byte payload. When the
//! wallet executes it, the receiving contract decodes those bytes into a
//! [`Call`] and dispatches on it. The empty payload is reserved for plain
//! value transfers and never decodes to a call.
//!
//! Payloads are `bincode`-encoded [`Call`] values. In JSON they travel as
//! `0x`-prefixed hex strings (see [`hex_bytes`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::address::Address;

/// Errors produced when decoding a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// An empty payload is a plain transfer, not a call.
    #[error("empty payload does not encode a call")]
    Empty,

    /// The bytes do not decode to any known call.
    #[error("malformed call payload: {0}")]
    Malformed(String),
}

/// Every instruction a payload can encode.
///
/// Grouped by the contract that accepts it. Sending a call to the wrong kind
/// of contract fails at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    // -- Registry ------------------------------------------------------------
    /// Relay: add `owner` to the calling wallet.
    AddOwnerForWallet(Address),
    /// Relay: remove `owner` from the calling wallet.
    DeleteOwnerForWallet(Address),
    /// Relay: change the calling wallet's confirmation threshold.
    SetConfirmationsRequiredForWallet(u64),
    /// Deploy a new wallet. The caller becomes its creator.
    CreateWallet {
        /// Initial owners, in order.
        owners: Vec<Address>,
        /// Initial confirmation threshold.
        required: u64,
    },

    // -- Wallet --------------------------------------------------------------
    /// Registry-only: add an owner.
    AddOwner(Address),
    /// Registry-only: remove an owner.
    DeleteOwner(Address),
    /// Registry-only: change the confirmation threshold.
    SetConfirmationsRequired(u64),
    /// Owner-only: confirm a pending transaction.
    ConfirmTransaction(u64),
    /// Owner-only: execute a confirmed transaction.
    ExecuteTransaction(u64),

    // -- Counter -------------------------------------------------------------
    /// Increment the counter by the given amount.
    Add(u64),
}

impl Call {
    /// Encodes the call into payload bytes. Never returns an empty vector.
    pub fn encode(&self) -> Vec<u8> {
        // Serializing a plain enum into memory cannot fail.
        bincode::serialize(self).unwrap_or_default()
    }

    /// Decodes payload bytes back into a call.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Empty`] for the empty payload and
    /// [`PayloadError::Malformed`] for anything that is not a valid call.
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.is_empty() {
            return Err(PayloadError::Empty);
        }
        bincode::deserialize(bytes).map_err(|e| PayloadError::Malformed(e.to_string()))
    }

    /// Function-style name of the call, for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Call::AddOwnerForWallet(_) => "addOwnerForWallet",
            Call::DeleteOwnerForWallet(_) => "deleteOwnerForWallet",
            Call::SetConfirmationsRequiredForWallet(_) => "setNumConfirmationsRequiredForWallet",
            Call::CreateWallet { .. } => "createMultiSigWallet",
            Call::AddOwner(_) => "addOwner",
            Call::DeleteOwner(_) => "deleteOwner",
            Call::SetConfirmationsRequired(_) => "setNumConfirmationsRequired",
            Call::ConfirmTransaction(_) => "confirmTransaction",
            Call::ExecuteTransaction(_) => "executeTransaction",
            Call::Add(_) => "add",
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serde adapter that writes byte vectors as `0x`-prefixed hex strings.
///
/// Use with `#[serde(with = "crate::payload::hex_bytes")]`.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let body = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(body).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_call_decodes_to_same_call() {
        let call = Call::AddOwnerForWallet(Address::from_label("new-owner"));
        let bytes = call.encode();
        assert!(!bytes.is_empty());
        assert_eq!(Call::decode(&bytes).unwrap(), call);
    }

    #[test]
    fn empty_payload_is_not_a_call() {
        assert_eq!(Call::decode(&[]), Err(PayloadError::Empty));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = Call::decode(&[0xff, 0xff, 0xff, 0xff, 0x01]).unwrap_err();
        assert!(matches!(err, PayloadError::Malformed(_)));
    }

    #[test]
    fn names_follow_function_style() {
        assert_eq!(Call::Add(1).to_string(), "add");
        assert_eq!(
            Call::SetConfirmationsRequiredForWallet(3).name(),
            "setNumConfirmationsRequiredForWallet"
        );
    }

    #[test]
    fn hex_bytes_adapter_round_trips() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Wrapper {
            #[serde(with = "hex_bytes")]
            data: Vec<u8>,
        }

        let w = Wrapper {
            data: vec![0xde, 0xad, 0xbe, 0xef],
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"data":"0xdeadbeef"}"#);
        assert_eq!(serde_json::from_str::<Wrapper>(&json).unwrap(), w);

        let empty: Wrapper = serde_json::from_str(r#"{"data":"0x"}"#).unwrap();
        assert!(empty.data.is_empty());
    }
}
