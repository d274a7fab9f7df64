//! # Contract Runtime
//!
//! Hosts deployed contracts and external accounts, moves value between them,
//! dispatches encoded calls, and keeps the event log.
//!
//! ## Call Model
//!
//! Every public entry point takes the caller explicitly and runs as one
//! atomic call: the runtime snapshots its state up front and restores the
//! snapshot if anything fails, so a failed call leaves no balance change, no
//! contract mutation and no event behind. Nested frames (a wallet calling the
//! registry, the registry calling back into the wallet) share the top-level
//! snapshot, because a failing inner frame always fails its caller.
//!
//! Only external accounts originate calls. A contract acts solely from inside
//! a call it received, so a top-level caller that is a deployed contract is
//! rejected with [`RuntimeError::ContractCaller`].
//!
//! Snapshots are full clones. That is fine for the wallet counts this runtime
//! is meant for; a journal would replace it if state ever outgrows memory.
//!
//! ## Dispatch
//!
//! [`Runtime::transfer`] is the `invoke(target, value, payload)` capability.
//! Value moves first, then:
//!
//! | Target            | Empty payload          | Non-empty payload                |
//! |-------------------|------------------------|----------------------------------|
//! | plain account     | accepted               | accepted (opaque receiver)       |
//! | wallet            | deposit, emits event   | wallet-facing [`Call`]           |
//! | registry          | rejected               | registry-facing [`Call`]         |
//! | counter           | rejected               | [`Call::Add`]                    |
//!
//! Calls are non-payable: value sent together with a call payload fails.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::config::{MAX_CALL_DEPTH, STATE_VERSION};
use crate::counter::{Counter, CounterError};
use crate::events::{Event, LogEntry};
use crate::payload::{Call, PayloadError};
use crate::registry::{Governance, RegistryError, WalletRegistry};
use crate::wallet::{MultiSigWallet, WalletError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by runtime entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A wallet rejected the call.
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// A registry rejected the call.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The payload could not be decoded.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// A counter rejected the call.
    #[error(transparent)]
    Counter(#[from] CounterError),

    /// No contract lives at the address.
    #[error("no contract deployed at {0}")]
    UnknownContract(Address),

    /// The contract at the address is not a wallet.
    #[error("contract at {0} is not a wallet")]
    NotAWallet(Address),

    /// The contract at the address is not a registry.
    #[error("contract at {0} is not a wallet registry")]
    NotARegistry(Address),

    /// The contract at the address is not a counter.
    #[error("contract at {0} is not a counter")]
    NotACounter(Address),

    /// The sender cannot cover the value being moved.
    #[error("insufficient balance: {account} has {balance}, needs {required}")]
    InsufficientBalance {
        /// The account being debited.
        account: Address,
        /// Its balance.
        balance: u128,
        /// The amount requested.
        required: u128,
    },

    /// Crediting the account would overflow its balance.
    #[error("balance overflow crediting {0}")]
    BalanceOverflow(Address),

    /// Value was sent along with a call that does not accept value.
    #[error("{call} is not payable")]
    NonPayable {
        /// The rejected call.
        call: &'static str,
    },

    /// The target does not implement the requested call.
    #[error("{target} does not support {call}")]
    UnsupportedCall {
        /// The call target.
        target: Address,
        /// The requested call.
        call: &'static str,
    },

    /// Nested calls went deeper than [`MAX_CALL_DEPTH`].
    #[error("call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),

    /// A deployed contract was named as the originator of a top-level call.
    #[error("{0} is a contract and cannot originate a call")]
    ContractCaller(Address),

    /// A deployment derived an address that is already taken.
    #[error("address already in use: {0}")]
    AddressInUse(Address),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A deployed contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Contract {
    /// A wallet registry.
    Registry(WalletRegistry),
    /// A multi-signature wallet.
    Wallet(MultiSigWallet),
    /// A counter target.
    Counter(Counter),
}

impl Contract {
    /// Human-readable kind, for logs and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Contract::Registry(_) => "registry",
            Contract::Wallet(_) => "wallet",
            Contract::Counter(_) => "counter",
        }
    }
}

/// Which kind of contract a call lands on. Looked up before dispatch so the
/// dispatcher never holds a borrow of the contract across nested calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Account,
    Registry,
    Wallet,
    Counter,
}

/// The contract runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runtime {
    /// Snapshot schema version.
    version: u16,
    /// Balances of every account and contract that ever held value.
    balances: HashMap<Address, u128>,
    /// Deployed contracts by address.
    contracts: HashMap<Address, Contract>,
    /// Deployment nonces per deployer, for address derivation.
    nonces: HashMap<Address, u64>,
    /// The event log.
    logs: Vec<LogEntry>,
    /// Current nesting depth while a call is in flight.
    #[serde(skip)]
    depth: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Creates an empty runtime.
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            balances: HashMap::new(),
            contracts: HashMap::new(),
            nonces: HashMap::new(),
            logs: Vec::new(),
            depth: 0,
        }
    }

    // -- Reads ---------------------------------------------------------------

    /// Snapshot schema version this runtime was written with.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Balance of `account`; zero if it never held value.
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// The full event log, oldest first.
    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Log entries with `sequence >= from`.
    pub fn logs_since(&self, from: u64) -> &[LogEntry] {
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(self.logs.len());
        &self.logs[start..]
    }

    /// Events emitted by `emitter`, oldest first.
    pub fn events_from<'a>(&'a self, emitter: &'a Address) -> impl Iterator<Item = &'a Event> + 'a {
        self.logs
            .iter()
            .filter(move |entry| entry.emitter == *emitter)
            .map(|entry| &entry.event)
    }

    /// The contract at `address`, if any.
    pub fn contract(&self, address: &Address) -> Option<&Contract> {
        self.contracts.get(address)
    }

    /// Every deployed contract, in no particular order.
    pub fn contracts(&self) -> impl Iterator<Item = (&Address, &Contract)> {
        self.contracts.iter()
    }

    /// Addresses of every deployed contract, sorted.
    pub fn contract_addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.contracts.keys().copied().collect();
        addresses.sort();
        addresses
    }

    /// The wallet at `address`.
    pub fn wallet(&self, address: &Address) -> Result<&MultiSigWallet, RuntimeError> {
        match self.contracts.get(address) {
            Some(Contract::Wallet(w)) => Ok(w),
            Some(_) => Err(RuntimeError::NotAWallet(*address)),
            None => Err(RuntimeError::UnknownContract(*address)),
        }
    }

    /// The registry at `address`.
    pub fn registry(&self, address: &Address) -> Result<&WalletRegistry, RuntimeError> {
        match self.contracts.get(address) {
            Some(Contract::Registry(r)) => Ok(r),
            Some(_) => Err(RuntimeError::NotARegistry(*address)),
            None => Err(RuntimeError::UnknownContract(*address)),
        }
    }

    /// The counter at `address`.
    pub fn counter(&self, address: &Address) -> Result<&Counter, RuntimeError> {
        match self.contracts.get(address) {
            Some(Contract::Counter(c)) => Ok(c),
            Some(_) => Err(RuntimeError::NotACounter(*address)),
            None => Err(RuntimeError::UnknownContract(*address)),
        }
    }

    /// `getOwners()` on the wallet at `wallet`.
    pub fn owners(&self, wallet: &Address) -> Result<Vec<Address>, RuntimeError> {
        Ok(self.wallet(wallet)?.owners().to_vec())
    }

    /// `walletsOf(creator)` on the registry at `registry`.
    pub fn wallets_of(&self, registry: &Address, creator: &Address) -> Result<Vec<Address>, RuntimeError> {
        Ok(self.registry(registry)?.wallets_of(creator).to_vec())
    }

    // -- Setup ---------------------------------------------------------------

    /// Mints `amount` into `account`. Genesis allocation for dev and test
    /// networks; there is no other way to create value.
    pub fn credit(&mut self, account: Address, amount: u128) -> Result<u128, RuntimeError> {
        let balance = self
            .balance_of(&account)
            .checked_add(amount)
            .ok_or(RuntimeError::BalanceOverflow(account))?;
        self.balances.insert(account, balance);
        debug!(account = %account, amount, balance, "account credited");
        Ok(balance)
    }

    /// Deploys a wallet registry on behalf of `deployer`.
    pub fn deploy_registry(&mut self, deployer: Address) -> Result<Address, RuntimeError> {
        let address = self.transact(|rt| {
            rt.ensure_external(deployer)?;
            let address = rt.next_address(deployer);
            rt.install(address, Contract::Registry(WalletRegistry::new(address)))?;
            Ok(address)
        })?;
        info!(registry = %address, deployer = %deployer, "registry deployed");
        Ok(address)
    }

    /// Deploys a counter on behalf of `deployer`.
    pub fn deploy_counter(&mut self, deployer: Address) -> Result<Address, RuntimeError> {
        let address = self.transact(|rt| {
            rt.ensure_external(deployer)?;
            let address = rt.next_address(deployer);
            rt.install(address, Contract::Counter(Counter::new()))?;
            Ok(address)
        })?;
        info!(counter = %address, deployer = %deployer, "counter deployed");
        Ok(address)
    }

    // -- Registry entry points -----------------------------------------------

    /// `createWallet(owners, required)` on `registry`, called by `caller`.
    pub fn create_wallet(
        &mut self,
        caller: Address,
        registry: Address,
        owners: Vec<Address>,
        required: u64,
    ) -> Result<Address, RuntimeError> {
        self.call(caller, |rt| rt.create_wallet_frame(caller, registry, owners, required))
    }

    /// `relayAddOwner(owner)` on `registry`, called by `caller`.
    pub fn relay_add_owner(&mut self, caller: Address, registry: Address, owner: Address) -> Result<(), RuntimeError> {
        self.call(caller, |rt| rt.relay_frame(caller, registry, Governance::AddOwner(owner)))
    }

    /// `relayDeleteOwner(owner)` on `registry`, called by `caller`.
    pub fn relay_delete_owner(
        &mut self,
        caller: Address,
        registry: Address,
        owner: Address,
    ) -> Result<(), RuntimeError> {
        self.call(caller, |rt| rt.relay_frame(caller, registry, Governance::DeleteOwner(owner)))
    }

    /// `relaySetThreshold(required)` on `registry`, called by `caller`.
    pub fn relay_set_confirmations_required(
        &mut self,
        caller: Address,
        registry: Address,
        required: u64,
    ) -> Result<(), RuntimeError> {
        self.call(caller, |rt| rt.relay_frame(caller, registry, Governance::SetConfirmationsRequired(required)))
    }

    // -- Wallet governance entry points --------------------------------------

    /// `addOwner(owner)` on `wallet`, called by `caller`.
    pub fn add_owner(&mut self, caller: Address, wallet: Address, owner: Address) -> Result<(), RuntimeError> {
        self.call(caller, |rt| rt.governance_frame(caller, wallet, Governance::AddOwner(owner)))
    }

    /// `deleteOwner(owner)` on `wallet`, called by `caller`.
    pub fn delete_owner(&mut self, caller: Address, wallet: Address, owner: Address) -> Result<(), RuntimeError> {
        self.call(caller, |rt| rt.governance_frame(caller, wallet, Governance::DeleteOwner(owner)))
    }

    /// `setRequiredConfirmations(required)` on `wallet`, called by `caller`.
    pub fn set_confirmations_required(
        &mut self,
        caller: Address,
        wallet: Address,
        required: u64,
    ) -> Result<(), RuntimeError> {
        self.call(caller, |rt| rt.governance_frame(caller, wallet, Governance::SetConfirmationsRequired(required)))
    }

    // -- Wallet transaction entry points -------------------------------------

    /// `submit(target, value, payload)` on `wallet`; returns the new index.
    pub fn submit_transaction(
        &mut self,
        caller: Address,
        wallet: Address,
        target: Address,
        value: u128,
        payload: Vec<u8>,
    ) -> Result<u64, RuntimeError> {
        self.call(caller, |rt| {
            let (tx_index, event) = rt
                .wallet_mut(&wallet)?
                .submit_transaction(caller, target, value, payload)?;
            debug!(wallet = %wallet, tx_index, proposer = %caller, "transaction submitted");
            rt.emit(wallet, event);
            Ok(tx_index)
        })
    }

    /// `confirm(tx_index)` on `wallet`.
    pub fn confirm_transaction(&mut self, caller: Address, wallet: Address, tx_index: u64) -> Result<(), RuntimeError> {
        self.call(caller, |rt| rt.confirm_frame(caller, wallet, tx_index))
    }

    /// `revoke(tx_index)` on `wallet`.
    pub fn revoke_confirmation(&mut self, caller: Address, wallet: Address, tx_index: u64) -> Result<(), RuntimeError> {
        self.call(caller, |rt| {
            let event = rt.wallet_mut(&wallet)?.revoke_confirmation(caller, tx_index)?;
            debug!(wallet = %wallet, tx_index, owner = %caller, "confirmation revoked");
            rt.emit(wallet, event);
            Ok(())
        })
    }

    /// `execute(tx_index)` on `wallet`.
    pub fn execute_transaction(&mut self, caller: Address, wallet: Address, tx_index: u64) -> Result<(), RuntimeError> {
        self.call(caller, |rt| rt.execute_frame(caller, wallet, tx_index))
    }

    // -- Value transfer ------------------------------------------------------

    /// Sends `value` and `payload` from `caller` to `target`.
    pub fn transfer(
        &mut self,
        caller: Address,
        target: Address,
        value: u128,
        payload: &[u8],
    ) -> Result<(), RuntimeError> {
        self.transact(|rt| {
            rt.ensure_external(caller)?;
            rt.invoke(caller, target, value, payload)
        })
    }

    /// Sends `amount` to `wallet` with no payload: the deposit path.
    pub fn deposit(&mut self, caller: Address, wallet: Address, amount: u128) -> Result<(), RuntimeError> {
        self.transfer(caller, wallet, amount, &[])
    }

    // -- Call machinery ------------------------------------------------------

    /// Runs `f` atomically: on error every change it made is discarded.
    fn transact<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, RuntimeError>) -> Result<T, RuntimeError> {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    /// Runs `f` as one nested call frame, enforcing the depth bound.
    fn frame<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, RuntimeError>) -> Result<T, RuntimeError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::CallDepthExceeded(MAX_CALL_DEPTH));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// A top-level call from `caller`: one atomic frame.
    fn call<T>(
        &mut self,
        caller: Address,
        f: impl FnOnce(&mut Self) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        self.transact(|rt| {
            rt.ensure_external(caller)?;
            rt.frame(f)
        })
    }

    /// Rejects a deployed contract as the originator of a top-level call.
    fn ensure_external(&self, caller: Address) -> Result<(), RuntimeError> {
        if self.kind_of(&caller) != Kind::Account {
            return Err(RuntimeError::ContractCaller(caller));
        }
        Ok(())
    }

    /// The `invoke(target, value, payload)` capability.
    fn invoke(&mut self, caller: Address, target: Address, value: u128, payload: &[u8]) -> Result<(), RuntimeError> {
        self.frame(|rt| {
            rt.move_value(caller, target, value)?;
            let kind = rt.kind_of(&target);

            if payload.is_empty() {
                return match kind {
                    Kind::Account => Ok(()),
                    Kind::Wallet => {
                        let balance = rt.balance_of(&target);
                        debug!(wallet = %target, sender = %caller, amount = value, balance, "deposit received");
                        rt.emit(
                            target,
                            Event::Deposit {
                                sender: caller,
                                amount: value,
                                balance,
                            },
                        );
                        Ok(())
                    }
                    Kind::Registry | Kind::Counter => Err(RuntimeError::UnsupportedCall {
                        target,
                        call: "receive",
                    }),
                };
            }

            if kind == Kind::Account {
                return Ok(());
            }

            let call = Call::decode(payload)?;
            if value > 0 {
                return Err(RuntimeError::NonPayable { call: call.name() });
            }
            rt.dispatch(caller, target, kind, call)
        })
    }

    fn dispatch(&mut self, caller: Address, target: Address, kind: Kind, call: Call) -> Result<(), RuntimeError> {
        debug!(caller = %caller, target = %target, call = call.name(), "dispatching call");
        match (kind, call) {
            (Kind::Registry, Call::AddOwnerForWallet(owner)) => {
                self.relay_frame(caller, target, Governance::AddOwner(owner))
            }
            (Kind::Registry, Call::DeleteOwnerForWallet(owner)) => {
                self.relay_frame(caller, target, Governance::DeleteOwner(owner))
            }
            (Kind::Registry, Call::SetConfirmationsRequiredForWallet(required)) => {
                self.relay_frame(caller, target, Governance::SetConfirmationsRequired(required))
            }
            (Kind::Registry, Call::CreateWallet { owners, required }) => self
                .create_wallet_frame(caller, target, owners, required)
                .map(|_| ()),
            (Kind::Wallet, Call::AddOwner(owner)) => {
                self.governance_frame(caller, target, Governance::AddOwner(owner))
            }
            (Kind::Wallet, Call::DeleteOwner(owner)) => {
                self.governance_frame(caller, target, Governance::DeleteOwner(owner))
            }
            (Kind::Wallet, Call::SetConfirmationsRequired(required)) => {
                self.governance_frame(caller, target, Governance::SetConfirmationsRequired(required))
            }
            (Kind::Wallet, Call::ConfirmTransaction(tx_index)) => self.confirm_frame(caller, target, tx_index),
            (Kind::Wallet, Call::ExecuteTransaction(tx_index)) => self.execute_frame(caller, target, tx_index),
            (Kind::Counter, Call::Add(amount)) => {
                self.counter_mut(&target)?.add(amount)?;
                Ok(())
            }
            (_, call) => Err(RuntimeError::UnsupportedCall {
                target,
                call: call.name(),
            }),
        }
    }

    fn create_wallet_frame(
        &mut self,
        caller: Address,
        registry: Address,
        owners: Vec<Address>,
        required: u64,
    ) -> Result<Address, RuntimeError> {
        let address = self.next_address(registry);
        let (wallet, event) = self
            .registry_mut(&registry)?
            .create_wallet(caller, address, owners, required)?;
        self.install(address, Contract::Wallet(wallet))?;
        info!(wallet = %address, registry = %registry, creator = %caller, required, "wallet created");
        self.emit(registry, event);
        Ok(address)
    }

    /// Registry relay: only a wallet the registry deployed may call it, and
    /// the change is applied to that same wallet with the registry as caller.
    fn relay_frame(&mut self, caller: Address, registry: Address, change: Governance) -> Result<(), RuntimeError> {
        self.registry(&registry)?.ensure_wallet(caller)?;

        self.frame(|rt| {
            let event = change
                .apply(rt.wallet_mut(&caller)?, registry)
                .map_err(RegistryError::from)?;
            rt.emit(caller, event);
            Ok(())
        })?;

        info!(wallet = %caller, registry = %registry, change = ?change, "governance change relayed");
        self.emit(registry, change.relay_event(caller));
        Ok(())
    }

    /// Direct call to a wallet's governance entry point. Succeeds only when
    /// `caller` is the wallet's registry.
    fn governance_frame(&mut self, caller: Address, wallet: Address, change: Governance) -> Result<(), RuntimeError> {
        let event = change.apply(self.wallet_mut(&wallet)?, caller)?;
        self.emit(wallet, event);
        Ok(())
    }

    fn confirm_frame(&mut self, caller: Address, wallet: Address, tx_index: u64) -> Result<(), RuntimeError> {
        let event = self.wallet_mut(&wallet)?.confirm_transaction(caller, tx_index)?;
        debug!(wallet = %wallet, tx_index, owner = %caller, "transaction confirmed");
        self.emit(wallet, event);
        Ok(())
    }

    /// Marks the transaction executed, then performs its call. If the call
    /// fails the error becomes [`WalletError::ExecutionFailed`] and the
    /// enclosing snapshot restores the executed flag with everything else.
    fn execute_frame(&mut self, caller: Address, wallet: Address, tx_index: u64) -> Result<(), RuntimeError> {
        let pending = self.wallet_mut(&wallet)?.begin_execution(caller, tx_index)?;

        if let Err(err) = self.invoke(wallet, pending.target, pending.value, &pending.payload) {
            warn!(wallet = %wallet, tx_index, error = %err, "transaction execution failed");
            return Err(WalletError::ExecutionFailed {
                tx_index,
                reason: err.to_string(),
            }
            .into());
        }

        info!(wallet = %wallet, tx_index, executor = %caller, target = %pending.target, "transaction executed");
        self.emit(
            wallet,
            Event::ExecuteTransaction {
                owner: caller,
                tx_index,
            },
        );
        Ok(())
    }

    // -- Helpers -------------------------------------------------------------

    fn kind_of(&self, address: &Address) -> Kind {
        match self.contracts.get(address) {
            None => Kind::Account,
            Some(Contract::Registry(_)) => Kind::Registry,
            Some(Contract::Wallet(_)) => Kind::Wallet,
            Some(Contract::Counter(_)) => Kind::Counter,
        }
    }

    fn wallet_mut(&mut self, address: &Address) -> Result<&mut MultiSigWallet, RuntimeError> {
        match self.contracts.get_mut(address) {
            Some(Contract::Wallet(w)) => Ok(w),
            Some(_) => Err(RuntimeError::NotAWallet(*address)),
            None => Err(RuntimeError::UnknownContract(*address)),
        }
    }

    fn registry_mut(&mut self, address: &Address) -> Result<&mut WalletRegistry, RuntimeError> {
        match self.contracts.get_mut(address) {
            Some(Contract::Registry(r)) => Ok(r),
            Some(_) => Err(RuntimeError::NotARegistry(*address)),
            None => Err(RuntimeError::UnknownContract(*address)),
        }
    }

    fn counter_mut(&mut self, address: &Address) -> Result<&mut Counter, RuntimeError> {
        match self.contracts.get_mut(address) {
            Some(Contract::Counter(c)) => Ok(c),
            Some(_) => Err(RuntimeError::NotACounter(*address)),
            None => Err(RuntimeError::UnknownContract(*address)),
        }
    }

    /// Derives the next contract address for `deployer`. Every deployment,
    /// whether from an account or from a registry, draws on the same nonce.
    fn next_address(&mut self, deployer: Address) -> Address {
        let nonce = self.nonces.entry(deployer).or_insert(0);
        let address = Address::derive(&deployer, *nonce);
        *nonce += 1;
        address
    }

    fn install(&mut self, address: Address, contract: Contract) -> Result<(), RuntimeError> {
        if self.contracts.contains_key(&address) {
            return Err(RuntimeError::AddressInUse(address));
        }
        self.contracts.insert(address, contract);
        Ok(())
    }

    fn move_value(&mut self, from: Address, to: Address, value: u128) -> Result<(), RuntimeError> {
        if value == 0 {
            return Ok(());
        }

        let balance = self.balance_of(&from);
        if balance < value {
            return Err(RuntimeError::InsufficientBalance {
                account: from,
                balance,
                required: value,
            });
        }
        self.balances.insert(from, balance - value);

        let credited = self
            .balance_of(&to)
            .checked_add(value)
            .ok_or(RuntimeError::BalanceOverflow(to))?;
        self.balances.insert(to, credited);
        Ok(())
    }

    fn emit(&mut self, emitter: Address, event: Event) {
        let sequence = self.logs.len() as u64;
        self.logs.push(LogEntry {
            sequence,
            emitter,
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn bob() -> Address {
        Address::from_label("bob")
    }

    fn carol() -> Address {
        Address::from_label("carol")
    }

    /// Runtime with a registry and a 2-of-3 wallet created by alice.
    fn setup() -> (Runtime, Address, Address) {
        let mut rt = Runtime::new();
        let registry = rt.deploy_registry(Address::from_label("deployer")).unwrap();
        let wallet = rt
            .create_wallet(alice(), registry, vec![alice(), bob(), carol()], 2)
            .unwrap();
        (rt, registry, wallet)
    }

    #[test]
    fn plain_transfer_moves_value() {
        let mut rt = Runtime::new();
        rt.credit(alice(), 100).unwrap();
        rt.transfer(alice(), bob(), 40, &[]).unwrap();
        assert_eq!(rt.balance_of(&alice()), 60);
        assert_eq!(rt.balance_of(&bob()), 40);
    }

    #[test]
    fn transfer_beyond_balance_fails_without_side_effects() {
        let mut rt = Runtime::new();
        rt.credit(alice(), 10).unwrap();
        let err = rt.transfer(alice(), bob(), 11, &[]).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::InsufficientBalance {
                account: alice(),
                balance: 10,
                required: 11
            }
        );
        assert_eq!(rt.balance_of(&alice()), 10);
        assert_eq!(rt.balance_of(&bob()), 0);
    }

    #[test]
    fn deposit_emits_event_with_new_balance() {
        let (mut rt, _, wallet) = setup();
        rt.credit(carol(), 1_000).unwrap();

        rt.deposit(carol(), wallet, 300).unwrap();
        rt.deposit(carol(), wallet, 200).unwrap();

        let last = rt.logs().last().unwrap();
        assert_eq!(last.emitter, wallet);
        assert_eq!(
            last.event,
            Event::Deposit {
                sender: carol(),
                amount: 200,
                balance: 500
            }
        );
        assert_eq!(rt.balance_of(&wallet), 500);
    }

    #[test]
    fn registry_rejects_plain_value() {
        let (mut rt, registry, _) = setup();
        rt.credit(alice(), 5).unwrap();
        let err = rt.transfer(alice(), registry, 5, &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::UnsupportedCall { call: "receive", .. }));
        assert_eq!(rt.balance_of(&alice()), 5);
    }

    #[test]
    fn calls_are_not_payable() {
        let (mut rt, _, wallet) = setup();
        rt.credit(alice(), 5).unwrap();
        let err = rt
            .transfer(alice(), wallet, 5, &Call::ConfirmTransaction(0).encode())
            .unwrap_err();
        assert_eq!(
            err,
            RuntimeError::NonPayable {
                call: "confirmTransaction"
            }
        );
    }

    #[test]
    fn mistargeted_call_is_unsupported() {
        let (mut rt, _, wallet) = setup();
        let err = rt
            .transfer(alice(), wallet, 0, &Call::Add(1).encode())
            .unwrap_err();
        assert_eq!(
            err,
            RuntimeError::UnsupportedCall {
                target: wallet,
                call: "add"
            }
        );
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let (mut rt, registry, _) = setup();
        let err = rt.transfer(alice(), registry, 0, &[0xff; 8]).unwrap_err();
        assert!(matches!(err, RuntimeError::Payload(PayloadError::Malformed(_))));
    }

    #[test]
    fn failed_call_discards_events() {
        let (mut rt, _, wallet) = setup();
        let before = rt.logs().len();
        assert!(rt.confirm_transaction(alice(), wallet, 7).is_err());
        assert_eq!(rt.logs().len(), before);
    }

    #[test]
    fn log_sequence_is_contiguous() {
        let (mut rt, _, wallet) = setup();
        rt.submit_transaction(alice(), wallet, bob(), 0, vec![]).unwrap();
        rt.confirm_transaction(alice(), wallet, 0).unwrap();
        for (i, entry) in rt.logs().iter().enumerate() {
            assert_eq!(entry.sequence, i as u64);
        }
        assert_eq!(rt.logs_since(1).len(), rt.logs().len() - 1);
        assert!(rt.logs_since(u64::MAX).is_empty());
    }

    #[test]
    fn lookups_distinguish_contract_kinds() {
        let (rt, registry, wallet) = setup();
        assert!(matches!(rt.wallet(&registry), Err(RuntimeError::NotAWallet(_))));
        assert!(matches!(rt.registry(&wallet), Err(RuntimeError::NotARegistry(_))));
        assert!(matches!(
            rt.wallet(&bob()),
            Err(RuntimeError::UnknownContract(_))
        ));
        assert_eq!(rt.contract(&wallet).unwrap().kind(), "wallet");
        assert_eq!(rt.contract_addresses().len(), 2);
    }

    /// Single-owner wallet that is also its own owner, so its transactions
    /// can execute one another.
    fn self_owned_wallet() -> (Runtime, Address) {
        let mut rt = Runtime::new();
        let registry = rt.deploy_registry(Address::from_label("deployer")).unwrap();
        let wallet = rt.create_wallet(alice(), registry, vec![alice()], 1).unwrap();
        let tx = rt
            .submit_transaction(alice(), wallet, registry, 0, Call::AddOwnerForWallet(wallet).encode())
            .unwrap();
        rt.confirm_transaction(alice(), wallet, tx).unwrap();
        rt.execute_transaction(alice(), wallet, tx).unwrap();
        (rt, wallet)
    }

    /// Submits transactions 1..=len where each executes the next one and the
    /// last pays bob. Returns the index of the first link.
    fn chain(rt: &mut Runtime, wallet: Address, len: u64) -> u64 {
        for i in 1..=len {
            let (target, payload) = if i == len {
                (bob(), vec![])
            } else {
                (wallet, Call::ExecuteTransaction(i + 1).encode())
            };
            let tx = rt.submit_transaction(alice(), wallet, target, 0, payload).unwrap();
            rt.confirm_transaction(alice(), wallet, tx).unwrap();
        }
        1
    }

    #[test]
    fn nested_execution_chain_runs() {
        let (mut rt, wallet) = self_owned_wallet();
        let first = chain(&mut rt, wallet, 10);
        rt.execute_transaction(alice(), wallet, first).unwrap();

        let w = rt.wallet(&wallet).unwrap();
        assert!((1..=10).all(|i| w.transaction(i).unwrap().executed));
    }

    #[test]
    fn call_depth_is_bounded() {
        let (mut rt, wallet) = self_owned_wallet();
        let len = MAX_CALL_DEPTH as u64 + 5;
        let first = chain(&mut rt, wallet, len);

        match rt.execute_transaction(alice(), wallet, first).unwrap_err() {
            RuntimeError::Wallet(WalletError::ExecutionFailed { reason, .. }) => {
                assert!(reason.contains("call depth limit"), "reason: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
        let w = rt.wallet(&wallet).unwrap();
        assert!((1..=len).all(|i| !w.transaction(i).unwrap().executed));
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let (mut rt, registry, wallet) = setup();
        rt.credit(alice(), 1_000_000_000_000_000_000_000).unwrap();
        rt.deposit(alice(), wallet, 100_000_000_000_000_000_000).unwrap();
        rt.submit_transaction(alice(), wallet, bob(), 1, vec![]).unwrap();

        let json = serde_json::to_string(&rt).unwrap();
        let back: Runtime = serde_json::from_str(&json).unwrap();

        assert_eq!(back.version(), STATE_VERSION);
        assert_eq!(back.balance_of(&wallet), 100_000_000_000_000_000_000);
        assert_eq!(back.wallets_of(&registry, &alice()).unwrap(), vec![wallet]);
        assert_eq!(back.wallet(&wallet).unwrap().transaction_count(), 1);
        assert_eq!(back.logs(), rt.logs());
    }
}
