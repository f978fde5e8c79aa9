//! Lock manager behavior exercised across real threads: the grant
//! matrix and lock upgrades under genuine concurrency. The matrix
//! itself is already exercised directly in `txn::lock`'s unit tests;
//! this file drives the manager the way two concurrent transactions
//! actually would, each pinned to its own thread.

use std::sync::Arc;
use std::time::Duration;

use reldb_core::txn::{LockManager, LockMode};

fn manager() -> Arc<LockManager> {
    Arc::new(LockManager::new(Duration::from_millis(30)))
}

/// T1 acquires S(r), then upgrades to X(r) (sole holder, granted).
/// T2 concurrently requests S(r) and is denied with a lock conflict
/// after the retry budget is exhausted.
#[test]
fn sole_holder_upgrades_while_a_concurrent_shared_request_is_denied() {
    let lm = manager();

    lm.acquire("r", 1, LockMode::Shared).unwrap();
    lm.acquire("r", 1, LockMode::Exclusive).unwrap();

    let lm2 = lm.clone();
    let handle = std::thread::spawn(move || lm2.acquire("r", 2, LockMode::Shared));

    let result = handle.join().unwrap();
    assert!(result.is_err(), "T2's shared request must be denied while T1 holds X");
    assert_eq!(result.unwrap_err().kind(), reldb_core::error::ErrorKind::Concurrency);
}

/// Releasing frees the resource for a transaction that was previously
/// blocked on it — modeled here as a fresh attempt after release rather
/// than a literal wakeup, matching the manager's retry-once design. A
/// `crossbeam` channel pins down the interleaving instead of racing on
/// a sleep: the holder only releases once it knows the other thread has
/// already issued its (blocking) request.
#[test]
fn release_unblocks_a_subsequent_competing_request() {
    let lm = manager();
    lm.acquire("r", 1, LockMode::Exclusive).unwrap();

    let (about_to_block, confirmed_about_to_block) = crossbeam::channel::bounded(1);
    let lm2 = lm.clone();
    let blocked = std::thread::spawn(move || {
        about_to_block.send(()).unwrap();
        lm2.acquire("r", 2, LockMode::Exclusive)
    });

    confirmed_about_to_block.recv().unwrap();
    lm.release("r", 1);

    // the blocked thread's single retry may or may not land after the
    // release depending on scheduling; either a grant or a conflict is
    // an acceptable outcome of *this* thread's race, but a fresh
    // request after both finish must succeed now that the resource is free.
    let _ = blocked.join().unwrap();
    lm.release("r", 2);
    lm.acquire("r", 3, LockMode::Exclusive).unwrap();
}

/// Several concurrent shared readers are all granted; none conflicts.
#[test]
fn many_concurrent_shared_readers_all_succeed() {
    let lm = manager();
    let handles: Vec<_> = (1..=8)
        .map(|xid| {
            let lm = lm.clone();
            std::thread::spawn(move || lm.acquire("r", xid, LockMode::Shared))
        })
        .collect();

    for h in handles {
        h.join().unwrap().unwrap();
    }
}

/// `release_all` drops every lock a transaction holds across distinct
/// resources, as happens at commit/abort.
#[test]
fn release_all_frees_every_resource_a_transaction_held() {
    let lm = manager();
    lm.acquire("r1", 1, LockMode::Shared).unwrap();
    lm.acquire("r2", 1, LockMode::Exclusive).unwrap();

    lm.release_all(1);

    lm.acquire("r1", 2, LockMode::Exclusive).unwrap();
    lm.acquire("r2", 2, LockMode::Exclusive).unwrap();
}
