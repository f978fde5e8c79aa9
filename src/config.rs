/// Tunables threaded through a `Database` instance rather than read from
/// module-level constants, so tests can exercise e.g. a two-page buffer
/// pool without feature-flag gymnastics.
#[derive(Debug, Clone)]
pub struct Config {
    /// bytes per page, on disk and in the buffer pool
    pub page_size: usize,
    /// maximum number of pages held in the buffer pool at once
    pub buffer_pool_capacity: usize,
    /// a B+ tree node splits once it holds more than this many keys
    pub btree_split_order: usize,
    /// how long a blocked lock request waits before retrying once
    pub lock_wait_timeout: std::time::Duration,
    /// redo log flushes once the in-memory buffer exceeds this many bytes
    /// (independent of the unconditional flush-on-commit trigger)
    pub redo_flush_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: 8 * 1024,
            buffer_pool_capacity: 100,
            btree_split_order: 10,
            lock_wait_timeout: std::time::Duration::from_secs(3),
            redo_flush_threshold: 4096,
        }
    }
}

impl Config {
    /// A configuration tuned for fast, small-footprint tests: tiny buffer
    /// pool and split order so eviction/splitting paths are reachable
    /// with a handful of rows.
    pub fn small_for_test() -> Self {
        Self {
            page_size: 4 * 1024,
            buffer_pool_capacity: 3,
            btree_split_order: 4,
            lock_wait_timeout: std::time::Duration::from_millis(50),
            redo_flush_threshold: 256,
        }
    }
}
