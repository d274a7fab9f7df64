//! # Wallet Registry Contract
//!
//! Deploys multi-signature wallets, indexes them by creator, and relays
//! governance calls back into them.
//!
//! ## Security Model
//!
//! - **Deployment**: anyone can create a wallet. The new wallet is bound to
//!   this registry for life and added to the recognition set.
//! - **Relay gating**: the relay entry points only accept calls whose caller
//!   is a wallet this registry deployed, and they only ever act on that same
//!   caller. A wallet therefore reaches its own governance entry points by
//!   executing a quorum-approved transaction that targets the registry:
//!
//!   ```text
//!   Wallet.execute -> Registry.relay* -> Wallet.addOwner / deleteOwner / setThreshold
//!   ```
//!
//!   At the last hop the caller genuinely is the registry, which is the only
//!   caller the wallet accepts for governance.
//!
//! The registry never touches wallet state itself. The runtime performs the
//! last hop through the wallet's own gated methods.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::address::Address;
use crate::events::Event;
use crate::wallet::{MultiSigWallet, WalletError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A wallet needs at least one owner.
    #[error("invalid owner length: at least one owner is required")]
    InvalidOwnerLength,

    /// An owner entry is the zero address.
    #[error("invalid address: the zero address cannot be an owner")]
    InvalidAddress,

    /// The threshold is zero or exceeds the number of owners.
    #[error("invalid threshold: {required} confirmations with {owners} owners")]
    InvalidThreshold {
        /// The rejected threshold.
        required: u64,
        /// Number of owners supplied.
        owners: usize,
    },

    /// A relay entry point was called by something other than a wallet this
    /// registry deployed.
    #[error("unauthorized: {0} is not a wallet created by this registry")]
    NotRecognizedWallet(Address),

    /// The relayed wallet operation itself failed.
    #[error("wallet rejected relayed call: {0}")]
    Wallet(#[from] WalletError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A governance change the registry relays into the calling wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Governance {
    /// Add an owner.
    AddOwner(Address),
    /// Remove an owner.
    DeleteOwner(Address),
    /// Change the confirmation threshold.
    SetConfirmationsRequired(u64),
}

impl Governance {
    /// Applies the change to `wallet` on behalf of `caller` and returns the
    /// wallet's event. The wallet only accepts its own registry as caller.
    pub fn apply(self, wallet: &mut MultiSigWallet, caller: Address) -> Result<Event, WalletError> {
        match self {
            Governance::AddOwner(owner) => wallet.add_owner(caller, owner),
            Governance::DeleteOwner(owner) => wallet.delete_owner(caller, owner),
            Governance::SetConfirmationsRequired(n) => wallet.set_confirmations_required(caller, n),
        }
    }

    /// The registry-side event recorded after a successful relay.
    pub fn relay_event(self, wallet: Address) -> Event {
        match self {
            Governance::AddOwner(owner) => Event::OwnerAddedForWallet { wallet, owner },
            Governance::DeleteOwner(owner) => Event::OwnerDeletedForWallet { wallet, owner },
            Governance::SetConfirmationsRequired(required) => {
                Event::ConfirmationsRequiredSetForWallet { wallet, required }
            }
        }
    }
}

/// The wallet registry (factory).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRegistry {
    /// This registry's own address; every wallet it deploys trusts it.
    address: Address,
    /// Wallets per creator, in deployment order.
    wallets_by_creator: HashMap<Address, Vec<Address>>,
    /// Every wallet this registry deployed.
    recognized: HashSet<Address>,
}

impl WalletRegistry {
    /// Creates an empty registry living at `address`.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            wallets_by_creator: HashMap::new(),
            recognized: HashSet::new(),
        }
    }

    /// The registry's own address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Builds a new wallet for `creator` and records it at `wallet_address`.
    ///
    /// The address comes from the runtime, which derives it from this
    /// registry's deployment nonce. Returns the wallet (for the runtime to
    /// install) and the creation event.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidOwnerLength`] for an empty owner list,
    /// [`RegistryError::InvalidAddress`] for a zero owner,
    /// [`RegistryError::InvalidThreshold`] unless `1 <= required <= owners.len()`,
    /// and [`RegistryError::Wallet`] for anything the wallet constructor
    /// rejects beyond that (duplicate owners).
    pub fn create_wallet(
        &mut self,
        creator: Address,
        wallet_address: Address,
        owners: Vec<Address>,
        required: u64,
    ) -> Result<(MultiSigWallet, Event), RegistryError> {
        if owners.is_empty() {
            return Err(RegistryError::InvalidOwnerLength);
        }
        if owners.iter().any(Address::is_zero) {
            return Err(RegistryError::InvalidAddress);
        }
        if required == 0 || required > owners.len() as u64 {
            return Err(RegistryError::InvalidThreshold {
                required,
                owners: owners.len(),
            });
        }

        let wallet = MultiSigWallet::new(owners, required, self.address)?;

        self.wallets_by_creator
            .entry(creator)
            .or_default()
            .push(wallet_address);
        self.recognized.insert(wallet_address);

        Ok((
            wallet,
            Event::WalletCreated {
                creator,
                wallet: wallet_address,
            },
        ))
    }

    /// Wallets deployed on behalf of `creator`, oldest first.
    pub fn wallets_of(&self, creator: &Address) -> &[Address] {
        self.wallets_by_creator
            .get(creator)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns `true` if this registry deployed `address`.
    pub fn is_wallet(&self, address: &Address) -> bool {
        self.recognized.contains(address)
    }

    /// Total number of wallets deployed.
    pub fn wallet_count(&self) -> usize {
        self.recognized.len()
    }

    /// Gate for the relay entry points.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRecognizedWallet`] unless `caller` is a wallet
    /// deployed by this registry.
    pub fn ensure_wallet(&self, caller: Address) -> Result<(), RegistryError> {
        if !self.is_wallet(&caller) {
            return Err(RegistryError::NotRecognizedWallet(caller));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owners() -> Vec<Address> {
        ["alice", "bob", "carol"]
            .iter()
            .map(|l| Address::from_label(l))
            .collect()
    }

    fn registry() -> WalletRegistry {
        WalletRegistry::new(Address::from_label("registry"))
    }

    /// Creates a wallet at the address derived from `nonce`.
    fn create(
        r: &mut WalletRegistry,
        nonce: u64,
        owners: Vec<Address>,
        required: u64,
    ) -> Result<(Address, MultiSigWallet, Event), RegistryError> {
        let address = Address::derive(&r.address(), nonce);
        let (wallet, event) = r.create_wallet(Address::from_label("c"), address, owners, required)?;
        Ok((address, wallet, event))
    }

    #[test]
    fn create_rejects_empty_owners() {
        let mut r = registry();
        let err = create(&mut r, 0, vec![], 1).unwrap_err();
        assert_eq!(err, RegistryError::InvalidOwnerLength);
    }

    #[test]
    fn create_rejects_zero_owner() {
        let mut r = registry();
        let err = create(&mut r, 0, vec![Address::ZERO], 1).unwrap_err();
        assert_eq!(err, RegistryError::InvalidAddress);
    }

    #[test]
    fn create_rejects_bad_threshold() {
        let mut r = registry();
        let err = create(&mut r, 0, owners(), 4).unwrap_err();
        assert_eq!(
            err,
            RegistryError::InvalidThreshold {
                required: 4,
                owners: 3
            }
        );
        assert_eq!(r.wallet_count(), 0);
    }

    #[test]
    fn create_rejects_duplicate_owner() {
        let mut r = registry();
        let o = owners();
        let err = create(&mut r, 0, vec![o[0], o[0]], 1).unwrap_err();
        assert_eq!(err, RegistryError::Wallet(WalletError::OwnerAlreadyExists(o[0])));
    }

    #[test]
    fn create_records_wallet_under_creator() {
        let mut r = registry();
        let creator = Address::from_label("creator");
        let a = Address::derive(&r.address(), 0);
        let b = Address::derive(&r.address(), 1);
        let (wallet, event) = r.create_wallet(creator, a, owners(), 2).unwrap();
        r.create_wallet(creator, b, owners(), 1).unwrap();

        assert_ne!(a, b);
        assert_eq!(r.wallets_of(&creator), &[a, b]);
        assert!(r.is_wallet(&a) && r.is_wallet(&b));
        assert_eq!(wallet.registry(), r.address());
        assert_eq!(wallet.owners(), owners().as_slice());
        assert_eq!(event, Event::WalletCreated { creator, wallet: a });
    }

    #[test]
    fn wallets_of_unknown_creator_is_empty() {
        let r = registry();
        assert!(r.wallets_of(&Address::from_label("nobody")).is_empty());
    }

    #[test]
    fn ensure_wallet_gates_unknown_callers() {
        let mut r = registry();
        let (wallet, _, _) = create(&mut r, 0, owners(), 2).unwrap();
        let stranger = Address::from_label("stranger");

        assert!(r.ensure_wallet(wallet).is_ok());
        assert_eq!(
            r.ensure_wallet(stranger),
            Err(RegistryError::NotRecognizedWallet(stranger))
        );
    }

    #[test]
    fn governance_applies_with_registry_as_caller() {
        let mut r = registry();
        let (address, mut wallet, _) = create(&mut r, 0, owners(), 2).unwrap();
        let dave = Address::from_label("dave");

        let event = Governance::AddOwner(dave)
            .apply(&mut wallet, r.address())
            .unwrap();
        assert_eq!(event, Event::OwnerAdded { owner: dave });
        assert!(wallet.is_owner(&dave));

        assert_eq!(
            Governance::AddOwner(dave).relay_event(address),
            Event::OwnerAddedForWallet {
                wallet: address,
                owner: dave
            }
        );
    }
}
