use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, warn};

use crate::error::SmallError;
use crate::txn::Xid;
use crate::types::SimpleResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

struct LockEntry {
    mode: LockMode,
    /// multiset of holders; nested acquisitions push the same xid again
    holders: Vec<Xid>,
}

/// Resource-keyed shared/exclusive lock table. Grant matrix:
///
/// | held \ requested | S | X |
/// |---|---|---|
/// | — | grant | grant |
/// | S | grant | grant iff sole holder (upgrade) |
/// | X | grant iff sole holder | deny |
///
/// A failed attempt sleeps for `wait_timeout` and retries exactly once;
/// a second failure is a `LockConflict`. No deadlock detection.
pub struct LockManager {
    table: Mutex<HashMap<String, LockEntry>>,
    wait_timeout: Duration,
}

impl LockManager {
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            wait_timeout,
        }
    }

    pub fn acquire(&self, resource: &str, xid: Xid, mode: LockMode) -> SimpleResult {
        if self.try_acquire(resource, xid, mode) {
            return Ok(());
        }

        std::thread::sleep(self.wait_timeout);

        if self.try_acquire(resource, xid, mode) {
            return Ok(());
        }

        warn!("lock conflict on {} for xid {} ({:?})", resource, xid, mode);
        Err(SmallError::lock_conflict(&format!(
            "lock conflict on resource {:?} requested by xid {}",
            resource, xid
        )))
    }

    fn try_acquire(&self, resource: &str, xid: Xid, mode: LockMode) -> bool {
        let mut table = self.table.lock().unwrap();

        let granted = match table.get(resource) {
            None => true,
            Some(entry) => match (entry.mode, mode) {
                (LockMode::Shared, LockMode::Shared) => true,
                (LockMode::Shared, LockMode::Exclusive) => {
                    entry.holders.iter().all(|&h| h == xid)
                }
                (LockMode::Exclusive, LockMode::Shared) => {
                    entry.holders.iter().all(|&h| h == xid)
                }
                (LockMode::Exclusive, LockMode::Exclusive) => false,
            },
        };

        if !granted {
            return false;
        }

        let entry = table.entry(resource.to_string()).or_insert_with(|| LockEntry {
            mode,
            holders: Vec::new(),
        });
        entry.mode = mode;
        entry.holders.push(xid);
        debug!("granted {:?} on {} to xid {}", mode, resource, xid);
        true
    }

    pub fn release(&self, resource: &str, xid: Xid) {
        let mut table = self.table.lock().unwrap();
        let mut drop_entry = false;
        if let Some(entry) = table.get_mut(resource) {
            if let Some(pos) = entry.holders.iter().position(|&h| h == xid) {
                entry.holders.remove(pos);
            }
            drop_entry = entry.holders.is_empty();
        }
        if drop_entry {
            table.remove(resource);
        }
    }

    pub fn release_all(&self, xid: Xid) {
        let mut table = self.table.lock().unwrap();
        table.retain(|_, entry| {
            entry.holders.retain(|&h| h != xid);
            !entry.holders.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> LockManager {
        LockManager::new(Duration::from_millis(20))
    }

    #[test]
    fn shared_locks_are_compatible() {
        let lm = manager();
        lm.acquire("r", 1, LockMode::Shared).unwrap();
        lm.acquire("r", 2, LockMode::Shared).unwrap();
    }

    #[test]
    fn sole_shared_holder_can_upgrade_to_exclusive() {
        let lm = manager();
        lm.acquire("r", 1, LockMode::Shared).unwrap();
        lm.acquire("r", 1, LockMode::Exclusive).unwrap();
    }

    #[test]
    fn second_transaction_denied_exclusive_upgrade() {
        let lm = manager();
        lm.acquire("r", 1, LockMode::Shared).unwrap();
        lm.acquire("r", 2, LockMode::Shared).unwrap();
        let err = lm.acquire("r", 1, LockMode::Exclusive).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Concurrency);
    }

    #[test]
    fn exclusive_denies_any_other_requester() {
        let lm = manager();
        lm.acquire("r", 1, LockMode::Exclusive).unwrap();
        assert!(lm.acquire("r", 2, LockMode::Shared).is_err());
        assert!(lm.acquire("r", 2, LockMode::Exclusive).is_err());
    }

    #[test]
    fn release_frees_the_resource_for_others() {
        let lm = manager();
        lm.acquire("r", 1, LockMode::Exclusive).unwrap();
        lm.release("r", 1);
        lm.acquire("r", 2, LockMode::Exclusive).unwrap();
    }

    #[test]
    fn lock_upgrade_then_competing_shared_request_is_denied() {
        let lm = manager();
        lm.acquire("r", 1, LockMode::Shared).unwrap();
        lm.acquire("r", 1, LockMode::Exclusive).unwrap();
        let err = lm.acquire("r", 2, LockMode::Shared).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Concurrency);
    }
}
