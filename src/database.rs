use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::SmallError;
use crate::storage::BufferPool;
use crate::txn::{LockManager, RedoLog, TransactionManager};
use crate::types::{new_pod, Pod, SimpleResult};

/// Owns every shared subsystem and is threaded explicitly to tables,
/// indexes, and the planner, instead of being reached through
/// process-wide singletons (per the "global mutable state" design note).
pub struct Database {
    pub config: Config,
    pub base_dir: PathBuf,
    pub buffer_pool: Pod<BufferPool>,
    pub redo_log: Pod<RedoLog>,
    pub lock_manager: Arc<LockManager>,
    pub tx_manager: Arc<TransactionManager>,
    pub catalog: Pod<Catalog>,
}

impl Database {
    pub fn new<P: AsRef<Path>>(base_dir: P, config: Config) -> Result<Arc<Self>, SmallError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        std::fs::create_dir_all(base_dir.join("undo"))?;

        let redo_log = RedoLog::open(base_dir.join("redo.log"), config.redo_flush_threshold)?;

        Ok(Arc::new(Self {
            buffer_pool: new_pod(BufferPool::new(config.buffer_pool_capacity)),
            redo_log: new_pod(redo_log),
            lock_manager: Arc::new(LockManager::new(config.lock_wait_timeout)),
            tx_manager: Arc::new(TransactionManager::new(base_dir.join("undo"))),
            catalog: new_pod(Catalog::new()),
            config,
            base_dir,
        }))
    }

    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.base_dir.join(format!("{}.tbl", table_name))
    }

    pub fn index_path(&self, index_name: &str) -> PathBuf {
        self.base_dir.join(format!("{}.idx", index_name))
    }

    /// Runs the ARIES-style recovery protocol. Call once at
    /// startup, after the catalog has been populated with every table
    /// the redo log might reference.
    pub fn recover(self: &Arc<Self>) -> SimpleResult {
        self.tx_manager.clone().recover(self)
    }

    /// Writes a CHECKPOINT record and flushes every dirty page to disk.
    pub fn checkpoint(self: &Arc<Self>) -> SimpleResult {
        self.tx_manager.clone().checkpoint(self)
    }
}
