use std::io::SeekFrom;

use log::debug;

use crate::database::Database;
use crate::error::SmallError;
use crate::storage::buffer_pool::PageKey;
use crate::storage::page::{Page, SlotState};
use crate::storage::schema::Schema;
use crate::storage::value::Tuple;
use crate::storage::Location;
use crate::txn::redo::{RedoAction, RedoRecord};
use crate::txn::undo::UndoRecord;
use crate::txn::Xid;
use crate::types::SimpleResult;
use crate::util::{HandyRwLock, SmallFile};

/// A heap table: `<name>.tbl` on disk, a byte-aligned sequence of pages.
/// Every mutation logs one undo and one redo record and stamps the
/// touched page's header lsn before returning.
pub struct Table {
    pub name: String,
    pub schema: Schema,
}

impl Table {
    pub fn new(name: &str, schema: Schema) -> Self {
        Self {
            name: name.to_string(),
            schema,
        }
    }

    fn disk_page_count(&self, db: &Database) -> Result<u64, SmallError> {
        let path = db.table_path(&self.name);
        if !path.exists() {
            return Ok(0);
        }
        let file = SmallFile::new(&path)?;
        Ok(file.get_size()? / db.config.page_size as u64)
    }

    /// `max(disk_pages, 1 + max_dirty_pageno)` — accounts for
    /// pages allocated in memory but not yet flushed to disk.
    pub fn page_count(&self, db: &Database) -> Result<u64, SmallError> {
        let disk_pages = self.disk_page_count(db)? as i64;
        let max_dirty = db.buffer_pool.rl().find_max_pageno(&self.name);
        Ok(std::cmp::max(disk_pages, max_dirty + 1) as u64)
    }

    fn read_page_from_disk(&self, db: &Database, pageno: u32) -> Result<Page, SmallError> {
        let path = db.table_path(&self.name);
        let mut file = SmallFile::new(&path)?;
        let offset = pageno as u64 * db.config.page_size as u64;
        file.seek(SeekFrom::Start(offset))?;
        let bytes = file.read_exact_bytes(db.config.page_size)?;
        Ok(Page::deserialize(db.config.page_size, &bytes))
    }

    /// Ensures the buffer pool holds `pageno`, loading it from disk (or
    /// allocating a fresh empty page if it is past the end of the file)
    /// if necessary, and returns its key.
    fn ensure_loaded(&self, db: &Database, pageno: u32) -> Result<PageKey, SmallError> {
        let key = PageKey::new(&self.name, pageno);
        if db.buffer_pool.rl().contains(&key) {
            return Ok(key);
        }

        let disk_pages = self.disk_page_count(db)?;
        let page = if (pageno as u64) < disk_pages {
            self.read_page_from_disk(db, pageno)?
        } else {
            Page::new(db.config.page_size)
        };

        db.buffer_pool.wl().put(key.clone(), page)?;
        Ok(key)
    }

    fn allocate_page(&self, db: &Database) -> Result<u32, SmallError> {
        let pageno = self.page_count(db)? as u32;
        let key = PageKey::new(&self.name, pageno);
        let mut wl = db.buffer_pool.wl();
        wl.put(key.clone(), Page::new(db.config.page_size))?;
        wl.mark_dirty(&key);
        debug!("allocated page {} for table {}", pageno, self.name);
        Ok(pageno)
    }

    fn log_mutation(
        &self,
        db: &Database,
        xid: Xid,
        redo_action: RedoAction,
        loc: Location,
        redo_data: Vec<u8>,
        undo_action: RedoAction,
        undo_data: Vec<u8>,
    ) -> Result<u64, SmallError> {
        db.tx_manager.append_undo(
            xid,
            &UndoRecord::mutation(xid as i64, undo_action, &self.name, (loc.pageno, loc.sid as u32), undo_data),
        )?;

        let lsn = db.tx_manager.append_redo(
            db,
            &RedoRecord::mutation(xid as i64, redo_action, &self.name, (loc.pageno, loc.sid as u32), redo_data),
        )?;

        let key = PageKey::new(&self.name, loc.pageno);
        let mut wl = db.buffer_pool.wl();
        if let Some(page) = wl.get_mut(&key) {
            page.set_header(lsn);
        }
        drop(wl);
        db.buffer_pool.wl().mark_dirty(&key);

        Ok(lsn)
    }

    pub fn is_dead(&self, db: &Database, loc: Location) -> Result<bool, SmallError> {
        let key = self.ensure_loaded(db, loc.pageno)?;
        let mut wl = db.buffer_pool.wl();
        let page = wl.get_mut(&key).unwrap();
        Ok(page.slot_state(loc.sid) != SlotState::Normal)
    }

    pub fn get_one(&self, db: &Database, loc: Location) -> Result<Option<Tuple>, SmallError> {
        let key = self.ensure_loaded(db, loc.pageno)?;
        let mut wl = db.buffer_pool.wl();
        let page = wl.get_mut(&key).unwrap();
        if !page.is_normal(loc.sid) {
            return Ok(None);
        }
        let bytes = page.select(loc.sid);
        Ok(Some(Tuple::decode(&bytes, &self.schema)))
    }

    pub fn get_page_tuple_count(&self, db: &Database, pageno: u32) -> Result<usize, SmallError> {
        let key = self.ensure_loaded(db, pageno)?;
        let mut wl = db.buffer_pool.wl();
        let page = wl.get_mut(&key).unwrap();
        Ok((0..page.slot_count()).filter(|&s| page.is_normal(s)).count())
    }

    /// Lazily enumerates every non-tombstoned location in the table, in
    /// `(pageno, sid)` order.
    pub fn get_all_locations(&self, db: &Database) -> Result<Vec<Location>, SmallError> {
        let mut out = Vec::new();
        let page_count = self.page_count(db)?;
        for pageno in 0..page_count as u32 {
            let key = self.ensure_loaded(db, pageno)?;
            let mut wl = db.buffer_pool.wl();
            let page = wl.get_mut(&key).unwrap();
            for sid in 0..page.slot_count() {
                if page.is_normal(sid) {
                    out.push(Location::new(pageno, sid));
                }
            }
        }
        Ok(out)
    }

    /// Inserts at the last page, allocating a new page and retrying on
    /// `Full`. Logs one undo (inverse: `TableDelete`) and one redo
    /// (`TableInsert`) record.
    pub fn insert_one(&self, db: &Database, xid: Xid, tuple: &Tuple) -> Result<Location, SmallError> {
        let record = tuple.encode(&self.schema);

        loop {
            let page_count = self.page_count(db)?;
            let pageno = if page_count == 0 {
                self.allocate_page(db)?
            } else {
                page_count as u32 - 1
            };

            let key = self.ensure_loaded(db, pageno)?;
            let sid_result = {
                let mut wl = db.buffer_pool.wl();
                let page = wl.get_mut(&key).unwrap();
                page.insert(&record)
            };

            match sid_result {
                Ok(sid) => {
                    let loc = Location::new(pageno, sid);
                    self.log_mutation(
                        db,
                        xid,
                        RedoAction::TableInsert,
                        loc,
                        record.clone(),
                        RedoAction::TableDelete,
                        Vec::new(),
                    )?;
                    return Ok(loc);
                }
                Err(_) => {
                    self.allocate_page(db)?;
                    continue;
                }
            }
        }
    }

    /// Attempts an in-place overwrite; falls back to delete+insert and
    /// returns the new location if the record no longer fits. Both
    /// paths stamp the page lsn and mark the page dirty.
    pub fn update_one(&self, db: &Database, xid: Xid, loc: Location, tuple: &Tuple) -> Result<Location, SmallError> {
        let pre_image = self
            .get_one(db, loc)?
            .ok_or_else(|| SmallError::logical("update of a non-existent/dead location"))?
            .encode(&self.schema);

        let new_record = tuple.encode(&self.schema);

        let key = self.ensure_loaded(db, loc.pageno)?;
        let new_sid = {
            let mut wl = db.buffer_pool.wl();
            let page = wl.get_mut(&key).unwrap();
            page.update(loc.sid, &new_record)?
        };

        let new_loc = Location::new(loc.pageno, new_sid);
        self.log_mutation(
            db,
            xid,
            RedoAction::TableUpdate,
            new_loc,
            new_record,
            RedoAction::TableUpdate,
            pre_image,
        )?;

        Ok(new_loc)
    }

    /// Tombstones the slot. Logs an inverse `TableInsert` undo record
    /// carrying the pre-image bytes.
    pub fn delete_one(&self, db: &Database, xid: Xid, loc: Location) -> SimpleResult {
        let pre_image = self
            .get_one(db, loc)?
            .ok_or_else(|| SmallError::logical("delete of a non-existent/dead location"))?
            .encode(&self.schema);

        let key = self.ensure_loaded(db, loc.pageno)?;
        {
            let mut wl = db.buffer_pool.wl();
            let page = wl.get_mut(&key).unwrap();
            page.delete(loc.sid);
        }

        self.log_mutation(
            db,
            xid,
            RedoAction::TableDelete,
            loc,
            Vec::new(),
            RedoAction::TableInsert,
            pre_image,
        )?;

        Ok(())
    }

    pub fn delete_multiple(&self, db: &Database, xid: Xid, locs: &[Location]) -> SimpleResult {
        for &loc in locs {
            self.delete_one(db, xid, loc)?;
        }
        Ok(())
    }

    /// Applies a raw redo/undo action directly to a page, bypassing the
    /// normal insert/update/delete API (and its own logging) and
    /// stamping the page with `stamp_lsn`. Used by recovery replay and
    /// undo application, both of which are reapplying *already logged*
    /// mutations rather than performing new ones.
    ///
    /// A target slot that doesn't exist yet on this page replica means
    /// this is the first time replay has reached it (the insert that
    /// created it hasn't been seen in this pass) — a fresh
    /// `page.insert` recreates it at the same sequential position the
    /// original execution assigned, since replay walks the log in the
    /// same order the original mutations happened in.
    pub fn apply_raw(
        &self,
        db: &Database,
        loc: Location,
        action: RedoAction,
        data: &[u8],
        stamp_lsn: u64,
    ) -> SimpleResult {
        let key = self.ensure_loaded(db, loc.pageno)?;
        {
            let mut wl = db.buffer_pool.wl();
            let page = wl.get_mut(&key).unwrap();
            match action {
                RedoAction::TableInsert | RedoAction::TableUpdate => {
                    if loc.sid < page.slot_count() {
                        page.restore(loc.sid, data)?;
                    } else {
                        let sid = page.insert(data)?;
                        debug_assert_eq!(sid, loc.sid, "replay assigned a different slot id than originally logged");
                    }
                }
                RedoAction::TableDelete => {
                    if loc.sid < page.slot_count() {
                        page.delete(loc.sid);
                    }
                }
                _ => {}
            }
            page.set_header(stamp_lsn);
        }
        db.buffer_pool.wl().mark_dirty(&key);
        Ok(())
    }

    /// Current page header lsn, used by recovery's idempotent-redo
    /// guard (`page.lsn < replay_lsn`).
    pub fn page_lsn(&self, db: &Database, pageno: u32) -> Result<u64, SmallError> {
        let key = self.ensure_loaded(db, pageno)?;
        let mut wl = db.buffer_pool.wl();
        Ok(wl.get_mut(&key).unwrap().header().lsn)
    }
}
