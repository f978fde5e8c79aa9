use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shorthand accessors for `RwLock`, so call sites read `x.rl()` /
/// `x.wl()` instead of `x.read().unwrap()` / `x.write().unwrap()`.
///
/// (credit: this pattern is borrowed from tikv's codebase)
pub trait HandyRwLock<T> {
    fn rl(&self) -> RwLockReadGuard<'_, T>;
    fn wl(&self) -> RwLockWriteGuard<'_, T>;
}

impl<T> HandyRwLock<T> for RwLock<T> {
    fn rl(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap()
    }

    fn wl(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap()
    }
}
