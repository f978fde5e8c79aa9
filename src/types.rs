use std::sync::{Arc, RwLock};

use crate::error::SmallError;

/// Shared, interior-mutable handle to a subsystem, matching the
/// `Arc<RwLock<T>>` convention used throughout for buffer pool, lock
/// table, and catalog state.
pub type Pod<T> = Arc<RwLock<T>>;

pub type ResultPod<T> = Result<Pod<T>, SmallError>;

pub type SimpleResult = Result<(), SmallError>;

pub fn new_pod<T>(value: T) -> Pod<T> {
    Arc::new(RwLock::new(value))
}
