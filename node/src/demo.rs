//! # Governance Walkthrough
//!
//! Drives a fresh in-memory runtime through the full wallet lifecycle: a
//! registry deploys a 2-of-3 wallet, the wallet receives a deposit, pays a
//! recipient, adds an owner to itself through the registry relay, and calls
//! a counter contract. A direct relay attempt by an outsider is rejected
//! along the way.

use anyhow::{bail, Context, Result};

use quorum_contracts::{Address, Call, LogEntry, RegistryError, Runtime, RuntimeError};

/// Addresses involved in the walkthrough.
pub struct DemoOutcome {
    pub runtime: Runtime,
    pub registry: Address,
    pub wallet: Address,
    pub counter: Address,
    pub new_owner: Address,
}

/// Runs the walkthrough and returns the final runtime.
pub fn run() -> Result<DemoOutcome> {
    let deployer = Address::from_label("deployer");
    let [alice, bob, carol] = ["alice", "bob", "carol"].map(Address::from_label);
    let donor = Address::from_label("donor");
    let recipient = Address::from_label("recipient");
    let erin = Address::from_label("erin");

    let mut rt = Runtime::new();
    let registry = rt.deploy_registry(deployer)?;
    let counter = rt.deploy_counter(deployer)?;

    let wallet = rt
        .create_wallet(alice, registry, vec![alice, bob, carol], 2)
        .context("wallet creation failed")?;

    rt.credit(donor, 1_000)?;
    rt.deposit(donor, wallet, 100)?;

    // Plain transfer: alice proposes, bob's confirmation completes the quorum.
    let pay = rt.submit_transaction(alice, wallet, recipient, 1, vec![])?;
    rt.confirm_transaction(alice, wallet, pay)?;
    match rt.execute_transaction(carol, wallet, pay) {
        Err(RuntimeError::Wallet(e)) => tracing::info!(error = %e, "execution refused below quorum"),
        Err(e) => return Err(e.into()),
        Ok(()) => bail!("transaction executed with a single confirmation"),
    }
    rt.confirm_transaction(bob, wallet, pay)?;
    rt.execute_transaction(carol, wallet, pay)?;

    // Governance: the wallet asks its registry to add erin as an owner.
    let add = rt.submit_transaction(bob, wallet, registry, 0, Call::AddOwnerForWallet(erin).encode())?;
    rt.confirm_transaction(bob, wallet, add)?;
    rt.confirm_transaction(carol, wallet, add)?;
    rt.execute_transaction(bob, wallet, add)?;

    // Nobody can skip the quorum by calling the relay directly.
    match rt.relay_add_owner(alice, registry, donor) {
        Err(RuntimeError::Registry(RegistryError::NotRecognizedWallet(_))) => {
            tracing::info!("direct relay rejected");
        }
        Err(e) => return Err(e.into()),
        Ok(()) => bail!("registry accepted a relay from an outsider"),
    }

    // Nor by naming the wallet itself as the caller.
    match rt.relay_add_owner(wallet, registry, donor) {
        Err(RuntimeError::ContractCaller(_)) => tracing::info!("impersonated wallet rejected"),
        Err(e) => return Err(e.into()),
        Ok(()) => bail!("registry accepted a call originated by a contract"),
    }

    // Delegated call: the new owner helps drive a counter.
    let bump = rt.submit_transaction(erin, wallet, counter, 0, Call::Add(7).encode())?;
    rt.confirm_transaction(erin, wallet, bump)?;
    rt.confirm_transaction(alice, wallet, bump)?;
    rt.execute_transaction(erin, wallet, bump)?;

    Ok(DemoOutcome {
        runtime: rt,
        registry,
        wallet,
        counter,
        new_owner: erin,
    })
}

/// Renders one log entry as a table row.
pub fn format_entry(entry: &LogEntry) -> String {
    let details = serde_json::to_value(&entry.event)
        .ok()
        .and_then(|v| v.get(entry.event.name()).cloned())
        .map(|v| v.to_string())
        .unwrap_or_default();
    format!(
        "{:>4}  {}  {:<34} {}",
        entry.sequence,
        entry.emitter,
        entry.event.name(),
        details
    )
}
