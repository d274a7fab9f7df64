//! # Contract Configuration & Constants
//!
//! Every constant the contracts depend on lives here. Changing any of them
//! changes derived wallet addresses or the shape of stored state, so treat
//! them as frozen once a runtime snapshot has been written to disk.

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Length of an address in bytes. Same width as an EVM account address so
/// fixtures from Ethereum tooling can be reused verbatim.
pub const ADDRESS_LENGTH: usize = 20;

/// Length of the textual address form: `0x` followed by two hex digits per byte.
pub const ADDRESS_HEX_LENGTH: usize = 2 + ADDRESS_LENGTH * 2;

/// Domain separator mixed into contract address derivation, so a derived
/// address can never collide with a hash computed for some other purpose.
pub const ADDRESS_DERIVATION_DOMAIN: &[u8] = b"quorum/contract-address/v1";

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Maximum nesting depth of contract-to-contract calls. A wallet executing a
/// relay call into its registry, which calls back into the wallet, uses three
/// frames. Anything near this bound is a runaway reentrancy loop.
pub const MAX_CALL_DEPTH: usize = 64;

/// Contract schema version stamped into serialized runtime snapshots.
pub const STATE_VERSION: u16 = 1;
