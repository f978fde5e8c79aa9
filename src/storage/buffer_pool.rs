use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::SmallError;
use crate::storage::page::Page;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageKey {
    pub relation: String,
    pub pageno: u32,
}

impl PageKey {
    pub fn new(relation: &str, pageno: u32) -> Self {
        Self {
            relation: relation.to_string(),
            pageno,
        }
    }
}

/// Size-bounded page cache with classic LRU eviction and pinning.
///
/// `order` tracks recency with the LRU key at the front and the MRU key
/// at the back; every access promotes a key to the back. This is the
/// same policy as a doubly-linked-list LRU, expressed with a plain
/// `Vec` instead of an intrusive list, since the cache sizes this engine
/// targets make the O(capacity) reshuffle cheap.
pub struct BufferPool {
    capacity: usize,
    pages: HashMap<PageKey, Page>,
    order: Vec<PageKey>,
    pinned: HashSet<PageKey>,
    dirty: HashSet<PageKey>,
    /// recently-evicted pages, kept around so a checkpoint started just
    /// after eviction can still find and flush a page that was dirty
    evicted: HashMap<PageKey, Page>,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pages: HashMap::new(),
            order: Vec::new(),
            pinned: HashSet::new(),
            dirty: HashSet::new(),
            evicted: HashMap::new(),
        }
    }

    fn touch(&mut self, key: &PageKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push(key.clone());
    }

    pub fn contains(&self, key: &PageKey) -> bool {
        self.pages.contains_key(key)
    }

    pub fn get(&mut self, key: &PageKey) -> Option<&Page> {
        if self.pages.contains_key(key) {
            self.touch(key);
            self.pages.get(key)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, key: &PageKey) -> Option<&mut Page> {
        if self.pages.contains_key(key) {
            self.touch(key);
            self.pages.get_mut(key)
        } else {
            None
        }
    }

    /// Inserts a new MRU entry. If this exceeds capacity, evicts the
    /// least-recently-used unpinned entry. If every entry is pinned,
    /// rolls back the insertion and returns `NoSpace`.
    pub fn put(&mut self, key: PageKey, page: Page) -> Result<(), SmallError> {
        if self.pages.contains_key(&key) {
            self.pages.insert(key.clone(), page);
            self.touch(&key);
            return Ok(());
        }

        self.pages.insert(key.clone(), page);
        self.order.push(key.clone());

        if self.pages.len() > self.capacity {
            let victim = self
                .order
                .iter()
                .find(|k| !self.pinned.contains(*k) && **k != key)
                .cloned();

            match victim {
                Some(victim_key) => {
                    debug!("evicting page {:?}", victim_key);
                    self.evict(&victim_key);
                }
                None => {
                    // every other entry is pinned: roll back our own insert
                    self.order.retain(|k| k != &key);
                    self.pages.remove(&key);
                    return Err(SmallError::capacity(
                        "buffer pool exhausted: every page is pinned",
                    ));
                }
            }
        }

        Ok(())
    }

    fn evict(&mut self, key: &PageKey) {
        self.order.retain(|k| k != key);
        if let Some(page) = self.pages.remove(key) {
            self.evicted.insert(key.clone(), page);
        }
    }

    pub fn pin(&mut self, key: &PageKey) {
        self.pinned.insert(key.clone());
    }

    pub fn unpin(&mut self, key: &PageKey) {
        self.pinned.remove(key);
    }

    pub fn mark_dirty(&mut self, key: &PageKey) {
        assert!(self.pages.contains_key(key) || self.evicted.contains_key(key));
        self.dirty.insert(key.clone());
    }

    pub fn unmark_dirty(&mut self, key: &PageKey) {
        self.dirty.remove(key);
    }

    /// Yields `(key, page)` for every dirty page, consulting the
    /// recently-evicted map for keys no longer resident.
    pub fn iter_dirty(&self) -> Vec<(PageKey, Page)> {
        let mut keys: Vec<&PageKey> = self.dirty.iter().collect();
        keys.sort();
        keys.into_iter()
            .map(|k| {
                let page = self
                    .pages
                    .get(k)
                    .or_else(|| self.evicted.get(k))
                    .unwrap_or_else(|| panic!("dirty page missing from pool: {:?}", k));
                (k.clone(), page.clone())
            })
            .collect()
    }

    /// Largest pageno currently dirty for `relation`, or `-1` if none.
    /// Used to compute a table's page count when memory holds pages not
    /// yet flushed to disk.
    pub fn find_max_pageno(&self, relation: &str) -> i64 {
        self.dirty
            .iter()
            .filter(|k| k.relation == relation)
            .map(|k| k.pageno as i64)
            .max()
            .unwrap_or(-1)
    }

    pub fn clear_evicted(&mut self, key: &PageKey) {
        self.evicted.remove(key);
    }
}
