//! # Contract Events
//!
//! Append-only log records emitted by wallets and registries. Watchers read
//! them from [`Runtime::logs`](crate::runtime::Runtime::logs); a call that
//! fails takes its events down with it.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::payload::hex_bytes;

/// An event emitted by a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    // -- Wallet governance ---------------------------------------------------
    /// A new owner was appended to the wallet's owner list.
    OwnerAdded {
        /// The address that became an owner.
        owner: Address,
    },
    /// An owner was removed from the wallet.
    OwnerRemoved {
        /// The address that is no longer an owner.
        owner: Address,
    },
    /// The wallet's confirmation threshold changed.
    ConfirmationsRequiredChanged {
        /// The new threshold.
        required: u64,
    },

    // -- Wallet transactions -------------------------------------------------
    /// An owner proposed a transaction.
    SubmitTransaction {
        /// The proposing owner.
        owner: Address,
        /// Index assigned to the transaction.
        tx_index: u64,
        /// Call target.
        target: Address,
        /// Value to transfer with the call.
        value: u128,
        /// Encoded call payload; empty for plain transfers.
        #[serde(with = "hex_bytes")]
        payload: Vec<u8>,
    },
    /// An owner confirmed a transaction.
    ConfirmTransaction {
        /// The confirming owner.
        owner: Address,
        /// The confirmed transaction.
        tx_index: u64,
    },
    /// An owner withdrew a confirmation.
    RevokeConfirmation {
        /// The revoking owner.
        owner: Address,
        /// The affected transaction.
        tx_index: u64,
    },
    /// An owner executed a transaction.
    ExecuteTransaction {
        /// The executing owner.
        owner: Address,
        /// The executed transaction.
        tx_index: u64,
    },
    /// The wallet received value without a call payload.
    Deposit {
        /// Who sent the value.
        sender: Address,
        /// Amount received.
        amount: u128,
        /// Wallet balance after the deposit.
        balance: u128,
    },

    // -- Registry ------------------------------------------------------------
    /// The registry deployed a wallet.
    WalletCreated {
        /// The caller that requested the deployment.
        creator: Address,
        /// Address of the new wallet.
        wallet: Address,
    },
    /// The registry relayed an owner addition into `wallet`.
    OwnerAddedForWallet {
        /// The wallet that requested the relay.
        wallet: Address,
        /// The owner that was added.
        owner: Address,
    },
    /// The registry relayed an owner removal into `wallet`.
    OwnerDeletedForWallet {
        /// The wallet that requested the relay.
        wallet: Address,
        /// The owner that was removed.
        owner: Address,
    },
    /// The registry relayed a threshold change into `wallet`.
    ConfirmationsRequiredSetForWallet {
        /// The wallet that requested the relay.
        wallet: Address,
        /// The new threshold.
        required: u64,
    },
}

impl Event {
    /// Short event name, as used in metrics labels and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Event::OwnerAdded { .. } => "OwnerAdded",
            Event::OwnerRemoved { .. } => "OwnerRemoved",
            Event::ConfirmationsRequiredChanged { .. } => "ConfirmationsRequiredChanged",
            Event::SubmitTransaction { .. } => "SubmitTransaction",
            Event::ConfirmTransaction { .. } => "ConfirmTransaction",
            Event::RevokeConfirmation { .. } => "RevokeConfirmation",
            Event::ExecuteTransaction { .. } => "ExecuteTransaction",
            Event::Deposit { .. } => "Deposit",
            Event::WalletCreated { .. } => "WalletCreated",
            Event::OwnerAddedForWallet { .. } => "OwnerAddedForWallet",
            Event::OwnerDeletedForWallet { .. } => "OwnerDeletedForWallet",
            Event::ConfirmationsRequiredSetForWallet { .. } => {
                "ConfirmationsRequiredSetForWallet"
            }
        }
    }
}

/// One entry in the runtime's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the log. Strictly increasing.
    pub sequence: u64,
    /// The contract that emitted the event.
    pub emitter: Address,
    /// The event itself.
    pub event: Event,
}
