//! Integration tests for the multi-signature wallet.
//!
//! These run wallets inside a full runtime: deployed by a registry, funded
//! by deposits, and executing real calls against accounts and contracts.

use quorum_contracts::{Address, Call, Event, Runtime, RuntimeError, WalletError};

fn owner(i: usize) -> Address {
    [
        "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
        "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
        "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc",
    ][i]
        .parse()
        .unwrap()
}

fn outsider() -> Address {
    "0x90f79bf6eb2c4f870365e785982e1f101e93b906".parse().unwrap()
}

fn target() -> Address {
    Address::from_label("target")
}

/// Helper: a runtime holding a 2-of-3 wallet funded with `funds`.
fn funded_wallet(funds: u128) -> (Runtime, Address) {
    let mut rt = Runtime::new();
    let registry = rt.deploy_registry(Address::from_label("deployer")).unwrap();
    let wallet = rt
        .create_wallet(owner(0), registry, vec![owner(0), owner(1), owner(2)], 2)
        .unwrap();
    if funds > 0 {
        rt.credit(owner(0), funds).unwrap();
        rt.deposit(owner(0), wallet, funds).unwrap();
    }
    (rt, wallet)
}

// ---------------------------------------------------------------------------
// Lifecycle Tests
// ---------------------------------------------------------------------------

#[test]
fn transfer_lifecycle_two_of_three() {
    let (mut rt, wallet) = funded_wallet(10);

    // 1. Submit
    let tx = rt.submit_transaction(owner(0), wallet, target(), 1, vec![]).unwrap();
    assert_eq!(tx, 0);

    // 2. One confirmation is not enough
    rt.confirm_transaction(owner(0), wallet, tx).unwrap();
    let err = rt.execute_transaction(owner(0), wallet, tx).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::Wallet(WalletError::InsufficientConfirmations {
            tx_index: 0,
            have: 1,
            need: 2
        })
    );

    // 3. Second confirmation reaches the threshold
    rt.confirm_transaction(owner(1), wallet, tx).unwrap();
    rt.execute_transaction(owner(2), wallet, tx).unwrap();

    assert_eq!(rt.balance_of(&target()), 1);
    assert_eq!(rt.balance_of(&wallet), 9);
    assert!(rt.wallet(&wallet).unwrap().transaction(tx).unwrap().executed);
    assert_eq!(
        rt.logs().last().unwrap().event,
        Event::ExecuteTransaction {
            owner: owner(2),
            tx_index: 0
        }
    );
}

#[test]
fn submit_emits_full_transaction_details() {
    let (mut rt, wallet) = funded_wallet(0);
    let payload = Call::Add(3).encode();
    rt.submit_transaction(owner(1), wallet, target(), 7, payload.clone())
        .unwrap();

    let entry = rt.logs().last().unwrap();
    assert_eq!(entry.emitter, wallet);
    assert_eq!(
        entry.event,
        Event::SubmitTransaction {
            owner: owner(1),
            tx_index: 0,
            target: target(),
            value: 7,
            payload,
        }
    );
}

#[test]
fn execute_twice_is_rejected() {
    let (mut rt, wallet) = funded_wallet(10);
    let tx = rt.submit_transaction(owner(0), wallet, target(), 1, vec![]).unwrap();
    rt.confirm_transaction(owner(0), wallet, tx).unwrap();
    rt.confirm_transaction(owner(1), wallet, tx).unwrap();
    rt.execute_transaction(owner(0), wallet, tx).unwrap();

    let err = rt.execute_transaction(owner(1), wallet, tx).unwrap_err();
    assert_eq!(err, RuntimeError::Wallet(WalletError::AlreadyExecuted(0)));
    assert_eq!(rt.balance_of(&target()), 1);
}

#[test]
fn revoke_drops_below_threshold() {
    let (mut rt, wallet) = funded_wallet(10);
    let tx = rt.submit_transaction(owner(0), wallet, target(), 1, vec![]).unwrap();
    rt.confirm_transaction(owner(0), wallet, tx).unwrap();
    rt.confirm_transaction(owner(1), wallet, tx).unwrap();
    rt.revoke_confirmation(owner(1), wallet, tx).unwrap();

    assert!(matches!(
        rt.execute_transaction(owner(0), wallet, tx),
        Err(RuntimeError::Wallet(WalletError::InsufficientConfirmations { have: 1, .. }))
    ));
    assert!(!rt.wallet(&wallet).unwrap().is_confirmed(tx, &owner(1)));
}

#[test]
fn execute_calls_counter_contract() {
    let (mut rt, wallet) = funded_wallet(0);
    let counter = rt.deploy_counter(Address::from_label("deployer")).unwrap();

    let tx = rt
        .submit_transaction(owner(0), wallet, counter, 0, Call::Add(5).encode())
        .unwrap();
    rt.confirm_transaction(owner(0), wallet, tx).unwrap();
    rt.confirm_transaction(owner(2), wallet, tx).unwrap();
    rt.execute_transaction(owner(1), wallet, tx).unwrap();

    assert_eq!(rt.counter(&counter).unwrap().num(), 5);
}

// ---------------------------------------------------------------------------
// Failure & Rollback Tests
// ---------------------------------------------------------------------------

#[test]
fn failed_execution_rolls_back_everything() {
    // Wallet holds nothing, so the transfer cannot be funded.
    let (mut rt, wallet) = funded_wallet(0);
    let tx = rt.submit_transaction(owner(0), wallet, target(), 1, vec![]).unwrap();
    rt.confirm_transaction(owner(0), wallet, tx).unwrap();
    rt.confirm_transaction(owner(1), wallet, tx).unwrap();
    let log_len = rt.logs().len();

    let err = rt.execute_transaction(owner(0), wallet, tx).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Wallet(WalletError::ExecutionFailed { tx_index: 0, .. })
    ));

    let stored = rt.wallet(&wallet).unwrap().transaction(tx).unwrap();
    assert!(!stored.executed);
    assert_eq!(stored.num_confirmations, 2);
    assert_eq!(rt.logs().len(), log_len);

    // Retry succeeds once the wallet is funded.
    rt.credit(outsider(), 1).unwrap();
    rt.deposit(outsider(), wallet, 1).unwrap();
    rt.execute_transaction(owner(0), wallet, tx).unwrap();
    assert_eq!(rt.balance_of(&target()), 1);
}

#[test]
fn failing_target_call_surfaces_as_execution_failed() {
    let (mut rt, wallet) = funded_wallet(0);
    let counter = rt.deploy_counter(Address::from_label("deployer")).unwrap();

    // A wallet call sent to a counter is not something the counter supports.
    let tx = rt
        .submit_transaction(owner(0), wallet, counter, 0, Call::ConfirmTransaction(0).encode())
        .unwrap();
    rt.confirm_transaction(owner(0), wallet, tx).unwrap();
    rt.confirm_transaction(owner(1), wallet, tx).unwrap();

    match rt.execute_transaction(owner(0), wallet, tx).unwrap_err() {
        RuntimeError::Wallet(WalletError::ExecutionFailed { reason, .. }) => {
            assert!(reason.contains("confirmTransaction"), "reason: {reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(rt.counter(&counter).unwrap().num(), 0);
}

#[test]
fn outsider_is_rejected_everywhere() {
    let (mut rt, wallet) = funded_wallet(10);
    let tx = rt.submit_transaction(owner(0), wallet, target(), 1, vec![]).unwrap();
    let not_owner = RuntimeError::Wallet(WalletError::NotOwner(outsider()));

    assert_eq!(
        rt.submit_transaction(outsider(), wallet, target(), 1, vec![]),
        Err(not_owner.clone())
    );
    assert_eq!(rt.confirm_transaction(outsider(), wallet, tx), Err(not_owner.clone()));
    assert_eq!(rt.revoke_confirmation(outsider(), wallet, tx), Err(not_owner.clone()));
    assert_eq!(rt.execute_transaction(outsider(), wallet, tx), Err(not_owner));
}

#[test]
fn wallet_cannot_act_as_top_level_caller() {
    let (mut rt, wallet) = funded_wallet(10);
    let rejected = RuntimeError::ContractCaller(wallet);

    assert_eq!(rt.transfer(wallet, target(), 5, &[]), Err(rejected.clone()));
    assert_eq!(
        rt.submit_transaction(wallet, wallet, target(), 5, vec![]),
        Err(rejected)
    );
    assert_eq!(rt.balance_of(&wallet), 10);
    assert_eq!(rt.balance_of(&target()), 0);
    assert_eq!(rt.wallet(&wallet).unwrap().transaction_count(), 0);
}

#[test]
fn unknown_transaction_is_rejected() {
    let (mut rt, wallet) = funded_wallet(0);
    assert_eq!(
        rt.confirm_transaction(owner(0), wallet, 3),
        Err(RuntimeError::Wallet(WalletError::TransactionNotFound(3)))
    );
}

// ---------------------------------------------------------------------------
// Deposit Tests
// ---------------------------------------------------------------------------

#[test]
fn deposit_reports_balance_after_each_deposit() {
    let (mut rt, wallet) = funded_wallet(0);
    rt.credit(outsider(), 1_000).unwrap();

    for (amount, expected) in [(100u128, 100u128), (250, 350), (1, 351)] {
        rt.deposit(outsider(), wallet, amount).unwrap();
        assert_eq!(
            rt.logs().last().unwrap().event,
            Event::Deposit {
                sender: outsider(),
                amount,
                balance: expected
            }
        );
    }
    assert_eq!(rt.balance_of(&outsider()), 649);
}

#[test]
fn governance_entry_points_reject_direct_callers() {
    let (mut rt, wallet) = funded_wallet(0);
    let expected = RuntimeError::Wallet(WalletError::NotAuthorizedAdmin { caller: owner(0) });

    assert_eq!(rt.add_owner(owner(0), wallet, outsider()), Err(expected.clone()));
    assert_eq!(rt.delete_owner(owner(0), wallet, owner(1)), Err(expected.clone()));
    assert_eq!(rt.set_confirmations_required(owner(0), wallet, 1), Err(expected));
    assert_eq!(rt.owners(&wallet).unwrap(), vec![owner(0), owner(1), owner(2)]);
}
