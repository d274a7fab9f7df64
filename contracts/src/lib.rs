// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Quorum Contracts
//!
//! Shared-custody wallets with registry-mediated governance:
//!
//! - **Multi-Signature Wallet**: a fixed owner set proposes, confirms and
//!   executes arbitrary calls once a confirmation threshold is met.
//! - **Wallet Registry**: deploys wallets, indexes them by creator, and is
//!   the only caller a wallet accepts for owner and threshold changes. A
//!   wallet governs itself by executing a transaction that calls back into
//!   the registry's relay entry points.
//! - **Runtime**: hosts contracts and accounts, moves value, dispatches
//!   encoded calls, and keeps the event log. Every call is atomic.
//!
//! ## Design Principles
//!
//! 1. Contracts are plain state machines. They validate, mutate and return
//!    an [`Event`]; only the [`Runtime`] talks to other contracts.
//! 2. Callers are explicit arguments, never ambient state.
//! 3. A failed call changes nothing, including the event log.
//! 4. Balances use checked arithmetic.
//! 5. Every public type is serializable (serde) for snapshots and the RPC
//!    surface.

pub mod address;
pub mod config;
pub mod counter;
pub mod events;
pub mod payload;
pub mod registry;
pub mod runtime;
pub mod wallet;

pub use address::{Address, AddressError};
pub use counter::{Counter, CounterError};
pub use events::{Event, LogEntry};
pub use payload::{Call, PayloadError};
pub use registry::{Governance, RegistryError, WalletRegistry};
pub use runtime::{Contract, Runtime, RuntimeError};
pub use wallet::{MultiSigWallet, PendingCall, Transaction, WalletError};
