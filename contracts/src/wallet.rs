//! # Multi-Signature Wallet Contract
//!
//! Holds funds and performs arbitrary calls, but only after a quorum of
//! owners has approved the specific call. The transaction lifecycle is:
//!
//! 1. **Submit**: an owner proposes `(target, value, payload)` and gets back
//!    a transaction index.
//! 2. **Confirm**: owners confirm the proposal, one confirmation each.
//!    A confirmation can be withdrawn with **revoke** until execution.
//! 3. **Execute**: once confirmations reach the threshold, any owner
//!    executes it. Execution is terminal and happens at most once.
//!
//! ## Governance
//!
//! The owner list and the threshold can only be changed by the registry that
//! deployed the wallet. The registry in turn only relays requests coming from
//! the wallet itself, so every governance change has to pass the wallet's own
//! quorum first (see [`super::registry`]).
//!
//! This module is a pure state machine. Moving value and dispatching calls is
//! the job of [`super::runtime`], which also guarantees that a failed call
//! leaves no trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::address::Address;
use crate::events::Event;
use crate::payload::hex_bytes;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during wallet operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// A governance entry point was called by someone other than the registry.
    #[error("unauthorized: {caller} is not this wallet's registry")]
    NotAuthorizedAdmin {
        /// The rejected caller.
        caller: Address,
    },

    /// The zero address was supplied where an owner was expected.
    #[error("invalid address: the zero address cannot be an owner")]
    InvalidAddress,

    /// A wallet needs at least one owner.
    #[error("invalid owner list: at least one owner is required")]
    InvalidOwnerLength,

    /// The address is already an owner.
    #[error("owner already exists: {0}")]
    OwnerAlreadyExists(Address),

    /// The address is not an owner.
    #[error("owner not found: {0}")]
    OwnerNotFound(Address),

    /// The threshold is zero or exceeds the number of owners.
    #[error("invalid threshold: {required} confirmations with {owners} owners")]
    InvalidThreshold {
        /// The rejected threshold.
        required: u64,
        /// Owner count at the time of the check.
        owners: usize,
    },

    /// The caller is not an owner of this wallet.
    #[error("unauthorized: {0} is not an owner")]
    NotOwner(Address),

    /// No transaction with this index has been submitted.
    #[error("transaction not found: {0}")]
    TransactionNotFound(u64),

    /// The caller already confirmed this transaction.
    #[error("transaction {tx_index} already confirmed by {owner}")]
    AlreadyConfirmed {
        /// The transaction index.
        tx_index: u64,
        /// The owner that tried to confirm twice.
        owner: Address,
    },

    /// The caller has no confirmation on this transaction to revoke.
    #[error("transaction {tx_index} not confirmed by {owner}")]
    NotConfirmed {
        /// The transaction index.
        tx_index: u64,
        /// The owner without a confirmation.
        owner: Address,
    },

    /// The transaction has already been executed.
    #[error("transaction already executed: {0}")]
    AlreadyExecuted(u64),

    /// The transaction does not have enough confirmations yet.
    #[error("transaction {tx_index} has {have} confirmations, needs {need}")]
    InsufficientConfirmations {
        /// The transaction index.
        tx_index: u64,
        /// Confirmations recorded so far.
        have: u64,
        /// Confirmations required.
        need: u64,
    },

    /// The target call failed. Nothing from the execution attempt survives.
    #[error("transaction {tx_index} execution failed: {reason}")]
    ExecutionFailed {
        /// The transaction index.
        tx_index: u64,
        /// Why the target call failed.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A proposed call, together with its approval state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Contract or account the call is sent to.
    pub target: Address,
    /// Value moved from the wallet to `target`.
    pub value: u128,
    /// Encoded call; empty for a plain transfer.
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    /// Set once, when the transaction is executed.
    pub executed: bool,
    /// Always equal to `confirmed_by.len()`.
    pub num_confirmations: u64,
    /// Owners that currently confirm this transaction.
    confirmed_by: HashSet<Address>,
}

impl Transaction {
    /// Returns `true` if `owner` currently confirms this transaction.
    pub fn is_confirmed_by(&self, owner: &Address) -> bool {
        self.confirmed_by.contains(owner)
    }

    /// Every address whose confirmation is counted, sorted. Owners deleted
    /// after confirming stay in this list.
    pub fn confirmers(&self) -> Vec<Address> {
        let mut confirmers: Vec<Address> = self.confirmed_by.iter().copied().collect();
        confirmers.sort();
        confirmers
    }
}

/// The call a wallet hands to the runtime once execution has been approved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    /// Index of the transaction being executed.
    pub tx_index: u64,
    /// Call target.
    pub target: Address,
    /// Value to move.
    pub value: u128,
    /// Encoded call.
    pub payload: Vec<u8>,
}

/// A multi-signature wallet.
///
/// Owners are kept twice: an ordered list (iteration and display order) and
/// a membership set for constant-time checks. Every mutation updates both.
/// Only the list is serialized; the set and each transaction's confirmation
/// count are rebuilt when a wallet is deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "WalletState")]
pub struct MultiSigWallet {
    /// The registry that deployed this wallet. Fixed at construction.
    registry: Address,
    /// Owners in insertion order.
    owners: Vec<Address>,
    /// Membership index over `owners`.
    #[serde(skip_serializing)]
    is_owner: HashSet<Address>,
    /// Confirmations needed before a transaction may execute.
    num_confirmations_required: u64,
    /// Every transaction ever submitted, indexed by position.
    transactions: Vec<Transaction>,
    /// Timestamp when the wallet was deployed.
    created_at: DateTime<Utc>,
}

impl MultiSigWallet {
    /// Creates a wallet bound to `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidOwnerLength`] for an empty owner list,
    /// [`WalletError::InvalidAddress`] if any owner is the zero address,
    /// [`WalletError::OwnerAlreadyExists`] if an owner is listed twice, and
    /// [`WalletError::InvalidThreshold`] unless `1 <= required <= owners.len()`.
    pub fn new(owners: Vec<Address>, required: u64, registry: Address) -> Result<Self, WalletError> {
        if owners.is_empty() {
            return Err(WalletError::InvalidOwnerLength);
        }

        let mut is_owner = HashSet::with_capacity(owners.len());
        for owner in &owners {
            if owner.is_zero() {
                return Err(WalletError::InvalidAddress);
            }
            if !is_owner.insert(*owner) {
                return Err(WalletError::OwnerAlreadyExists(*owner));
            }
        }

        check_threshold(required, owners.len())?;

        Ok(Self {
            registry,
            owners,
            is_owner,
            num_confirmations_required: required,
            transactions: Vec::new(),
            created_at: Utc::now(),
        })
    }

    // -- Reads ---------------------------------------------------------------

    /// Owners in insertion order.
    pub fn owners(&self) -> &[Address] {
        &self.owners
    }

    /// Number of owners.
    pub fn owners_count(&self) -> usize {
        self.owners.len()
    }

    /// Returns `true` if `address` is an owner.
    pub fn is_owner(&self, address: &Address) -> bool {
        self.is_owner.contains(address)
    }

    /// Current confirmation threshold.
    pub fn num_confirmations_required(&self) -> u64 {
        self.num_confirmations_required
    }

    /// The registry this wallet trusts for governance calls.
    pub fn registry(&self) -> Address {
        self.registry
    }

    /// Number of submitted transactions.
    pub fn transaction_count(&self) -> u64 {
        self.transactions.len() as u64
    }

    /// Looks up a transaction by index.
    pub fn transaction(&self, tx_index: u64) -> Option<&Transaction> {
        usize::try_from(tx_index)
            .ok()
            .and_then(|i| self.transactions.get(i))
    }

    /// Returns `true` if `owner` currently confirms transaction `tx_index`.
    pub fn is_confirmed(&self, tx_index: u64, owner: &Address) -> bool {
        self.transaction(tx_index)
            .map(|tx| tx.is_confirmed_by(owner))
            .unwrap_or(false)
    }

    /// Timestamp when the wallet was deployed.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // -- Governance (registry only) ------------------------------------------

    /// Appends `owner` to the owner list.
    ///
    /// # Errors
    ///
    /// [`WalletError::NotAuthorizedAdmin`] unless `caller` is the registry,
    /// [`WalletError::InvalidAddress`] for the zero address, and
    /// [`WalletError::OwnerAlreadyExists`] for an existing owner.
    pub fn add_owner(&mut self, caller: Address, owner: Address) -> Result<Event, WalletError> {
        self.only_registry(caller)?;
        if owner.is_zero() {
            return Err(WalletError::InvalidAddress);
        }
        if self.is_owner(&owner) {
            return Err(WalletError::OwnerAlreadyExists(owner));
        }

        self.owners.push(owner);
        self.is_owner.insert(owner);
        Ok(Event::OwnerAdded { owner })
    }

    /// Removes `owner`, keeping the remaining owners in their relative order.
    ///
    /// The threshold is not re-checked: removing owners can leave it above
    /// the owner count, after which nothing can execute until the threshold
    /// is lowered.
    ///
    /// # Errors
    ///
    /// [`WalletError::NotAuthorizedAdmin`] unless `caller` is the registry,
    /// [`WalletError::InvalidAddress`] for the zero address, and
    /// [`WalletError::OwnerNotFound`] if `owner` is not an owner.
    pub fn delete_owner(&mut self, caller: Address, owner: Address) -> Result<Event, WalletError> {
        self.only_registry(caller)?;
        if owner.is_zero() {
            return Err(WalletError::InvalidAddress);
        }
        if !self.is_owner.remove(&owner) {
            return Err(WalletError::OwnerNotFound(owner));
        }

        self.owners.retain(|o| *o != owner);
        Ok(Event::OwnerRemoved { owner })
    }

    /// Sets the confirmation threshold.
    ///
    /// # Errors
    ///
    /// [`WalletError::NotAuthorizedAdmin`] unless `caller` is the registry, and
    /// [`WalletError::InvalidThreshold`] unless `1 <= required <= owners_count()`.
    pub fn set_confirmations_required(
        &mut self,
        caller: Address,
        required: u64,
    ) -> Result<Event, WalletError> {
        self.only_registry(caller)?;
        check_threshold(required, self.owners.len())?;

        self.num_confirmations_required = required;
        Ok(Event::ConfirmationsRequiredChanged { required })
    }

    // -- Transactions (owners only) ------------------------------------------

    /// Proposes a call and returns its index along with the submission event.
    ///
    /// # Errors
    ///
    /// [`WalletError::NotOwner`] if `caller` is not an owner.
    pub fn submit_transaction(
        &mut self,
        caller: Address,
        target: Address,
        value: u128,
        payload: Vec<u8>,
    ) -> Result<(u64, Event), WalletError> {
        self.only_owner(caller)?;

        let tx_index = self.transactions.len() as u64;
        self.transactions.push(Transaction {
            target,
            value,
            payload: payload.clone(),
            executed: false,
            num_confirmations: 0,
            confirmed_by: HashSet::new(),
        });

        Ok((
            tx_index,
            Event::SubmitTransaction {
                owner: caller,
                tx_index,
                target,
                value,
                payload,
            },
        ))
    }

    /// Records `caller`'s confirmation of transaction `tx_index`.
    ///
    /// # Errors
    ///
    /// [`WalletError::NotOwner`], [`WalletError::TransactionNotFound`],
    /// [`WalletError::AlreadyExecuted`], or [`WalletError::AlreadyConfirmed`]
    /// on a second confirmation by the same owner.
    pub fn confirm_transaction(&mut self, caller: Address, tx_index: u64) -> Result<Event, WalletError> {
        self.only_owner(caller)?;
        let tx = self.pending_mut(tx_index)?;

        if !tx.confirmed_by.insert(caller) {
            return Err(WalletError::AlreadyConfirmed {
                tx_index,
                owner: caller,
            });
        }
        tx.num_confirmations = tx.confirmed_by.len() as u64;

        Ok(Event::ConfirmTransaction {
            owner: caller,
            tx_index,
        })
    }

    /// Withdraws `caller`'s confirmation of transaction `tx_index`.
    ///
    /// # Errors
    ///
    /// [`WalletError::NotOwner`], [`WalletError::TransactionNotFound`],
    /// [`WalletError::AlreadyExecuted`], or [`WalletError::NotConfirmed`] if
    /// `caller` never confirmed (or already revoked).
    pub fn revoke_confirmation(&mut self, caller: Address, tx_index: u64) -> Result<Event, WalletError> {
        self.only_owner(caller)?;
        let tx = self.pending_mut(tx_index)?;

        if !tx.confirmed_by.remove(&caller) {
            return Err(WalletError::NotConfirmed {
                tx_index,
                owner: caller,
            });
        }
        tx.num_confirmations = tx.confirmed_by.len() as u64;

        Ok(Event::RevokeConfirmation {
            owner: caller,
            tx_index,
        })
    }

    /// Approves execution of transaction `tx_index`, marks it executed and
    /// returns the call the runtime must perform.
    ///
    /// The executed flag is set before the call is made, so a reentrant
    /// attempt to execute the same index sees [`WalletError::AlreadyExecuted`].
    /// If the call then fails, the runtime discards this state change along
    /// with everything else the execution did.
    ///
    /// # Errors
    ///
    /// [`WalletError::NotOwner`], [`WalletError::TransactionNotFound`],
    /// [`WalletError::AlreadyExecuted`], or
    /// [`WalletError::InsufficientConfirmations`].
    pub fn begin_execution(&mut self, caller: Address, tx_index: u64) -> Result<PendingCall, WalletError> {
        self.only_owner(caller)?;
        let need = self.num_confirmations_required;
        let tx = self.pending_mut(tx_index)?;

        if tx.num_confirmations < need {
            return Err(WalletError::InsufficientConfirmations {
                tx_index,
                have: tx.num_confirmations,
                need,
            });
        }
        tx.executed = true;

        Ok(PendingCall {
            tx_index,
            target: tx.target,
            value: tx.value,
            payload: tx.payload.clone(),
        })
    }

    // -- Guards --------------------------------------------------------------

    fn only_registry(&self, caller: Address) -> Result<(), WalletError> {
        if caller != self.registry {
            return Err(WalletError::NotAuthorizedAdmin { caller });
        }
        Ok(())
    }

    fn only_owner(&self, caller: Address) -> Result<(), WalletError> {
        if !self.is_owner(&caller) {
            return Err(WalletError::NotOwner(caller));
        }
        Ok(())
    }

    /// An existing, not yet executed transaction.
    fn pending_mut(&mut self, tx_index: u64) -> Result<&mut Transaction, WalletError> {
        let tx = usize::try_from(tx_index)
            .ok()
            .and_then(|i| self.transactions.get_mut(i))
            .ok_or(WalletError::TransactionNotFound(tx_index))?;

        if tx.executed {
            return Err(WalletError::AlreadyExecuted(tx_index));
        }
        Ok(tx)
    }
}

/// Serialized form of a [`MultiSigWallet`].
#[derive(Deserialize)]
struct WalletState {
    registry: Address,
    owners: Vec<Address>,
    num_confirmations_required: u64,
    transactions: Vec<Transaction>,
    created_at: DateTime<Utc>,
}

impl TryFrom<WalletState> for MultiSigWallet {
    type Error = WalletError;

    /// Rebuilds the owner index and the confirmation counts. The threshold is
    /// not re-checked: deleting owners may legitimately leave it above the
    /// owner count.
    fn try_from(state: WalletState) -> Result<Self, Self::Error> {
        let mut is_owner = HashSet::with_capacity(state.owners.len());
        for owner in &state.owners {
            if owner.is_zero() {
                return Err(WalletError::InvalidAddress);
            }
            if !is_owner.insert(*owner) {
                return Err(WalletError::OwnerAlreadyExists(*owner));
            }
        }

        let mut transactions = state.transactions;
        for tx in &mut transactions {
            tx.num_confirmations = tx.confirmed_by.len() as u64;
        }

        Ok(Self {
            registry: state.registry,
            owners: state.owners,
            is_owner,
            num_confirmations_required: state.num_confirmations_required,
            transactions,
            created_at: state.created_at,
        })
    }
}

fn check_threshold(required: u64, owners: usize) -> Result<(), WalletError> {
    if required == 0 || required > owners as u64 {
        return Err(WalletError::InvalidThreshold { required, owners });
    }
    Ok(())
}
