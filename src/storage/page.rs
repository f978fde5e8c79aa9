use crate::error::SmallError;

/// Fixed-width slot header bookkeeping occupancy of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Unused = 0,
    Normal = 1,
    Dead = 2,
}

impl SlotState {
    fn from_u64(v: u64) -> Self {
        match v {
            0 => SlotState::Unused,
            1 => SlotState::Normal,
            2 => SlotState::Dead,
            _ => panic!("corrupt slot state: {}", v),
        }
    }
}

/// Three 8-byte fields: `offset`, `length`, `state`. 24 bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub offset: u64,
    pub length: u64,
    pub state: SlotState,
}

pub const SLOT_SIZE: usize = 24;

impl Slot {
    fn encode(&self) -> [u8; SLOT_SIZE] {
        let mut buf = [0u8; SLOT_SIZE];
        buf[0..8].copy_from_slice(&self.offset.to_le_bytes());
        buf[8..16].copy_from_slice(&self.length.to_le_bytes());
        buf[16..24].copy_from_slice(&(self.state as u64).to_le_bytes());
        buf
    }

    fn decode(bytes: &[u8]) -> Self {
        let offset = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let length = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let state = SlotState::from_u64(u64::from_le_bytes(bytes[16..24].try_into().unwrap()));
        Slot {
            offset,
            length,
            state,
        }
    }
}

/// leaf B+ tree page with no right sibling
pub const NO_NEXT_LEAF: u32 = 0xFFFF_FFFF;

pub const PAGE_FLAG_LEAF: u8 = 0;
pub const PAGE_FLAG_INTERNAL: u8 = 1;

pub const HEADER_SIZE: usize = 8 + 1 + 4 + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub lsn: u64,
    pub flags: u8,
    /// next-leaf pageno on a leaf page; unused on internal pages
    pub reserved: u32,
    pub free_space_start: u32,
    pub free_space_end: u32,
}

impl PageHeader {
    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.lsn.to_le_bytes());
        buf[8] = self.flags;
        buf[9..13].copy_from_slice(&self.reserved.to_le_bytes());
        buf[13..17].copy_from_slice(&self.free_space_start.to_le_bytes());
        buf[17..21].copy_from_slice(&self.free_space_end.to_le_bytes());
        buf
    }

    fn decode(bytes: &[u8]) -> Self {
        PageHeader {
            lsn: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            flags: bytes[8],
            reserved: u32::from_le_bytes(bytes[9..13].try_into().unwrap()),
            free_space_start: u32::from_le_bytes(bytes[13..17].try_into().unwrap()),
            free_space_end: u32::from_le_bytes(bytes[17..21].try_into().unwrap()),
        }
    }
}

/// A fixed-size slotted page: a header, a forward-growing slot
/// directory, and a backward-growing record region. Slot `i`'s record
/// lives at `records[slot[i].offset .. slot[i].offset + slot[i].length]`
/// (offsets are absolute within the page byte buffer).
///
/// `insert`/`delete`/`update`/`select` never touch the record bytes of
/// any other slot; deletes are tombstones so TIDs never move.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    page_size: usize,
    header: PageHeader,
    slots: Vec<Slot>,
    bytes: Vec<u8>,
}

impl Page {
    pub fn new(page_size: usize) -> Self {
        let free_space_start = HEADER_SIZE as u32;
        let free_space_end = page_size as u32;
        Self {
            page_size,
            header: PageHeader {
                lsn: 0,
                flags: PAGE_FLAG_LEAF,
                reserved: NO_NEXT_LEAF,
                free_space_start,
                free_space_end,
            },
            slots: Vec::new(),
            bytes: vec![0u8; page_size],
        }
    }

    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    pub fn set_header(&mut self, lsn: u64) {
        self.header.lsn = lsn;
    }

    pub fn set_flags(&mut self, flags: u8) {
        self.header.flags = flags;
    }

    pub fn flags(&self) -> u8 {
        self.header.flags
    }

    pub fn set_next_leaf(&mut self, pageno: Option<u32>) {
        self.header.reserved = pageno.unwrap_or(NO_NEXT_LEAF);
    }

    pub fn next_leaf(&self) -> Option<u32> {
        if self.header.reserved == NO_NEXT_LEAF {
            None
        } else {
            Some(self.header.reserved)
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn free_bytes(&self) -> usize {
        (self.header.free_space_end - self.header.free_space_start) as usize
    }

    /// Appends `record` at the end of the record region and a new slot
    /// pointing to it. Fails without mutating state if there is not
    /// enough free space for both the new slot and the new record.
    pub fn insert(&mut self, record: &[u8]) -> Result<usize, SmallError> {
        let needed = SLOT_SIZE + record.len();
        if needed > self.free_bytes() {
            return Err(SmallError::capacity("page full"));
        }

        let new_record_start = self.header.free_space_end as usize - record.len();
        self.bytes[new_record_start..new_record_start + record.len()].copy_from_slice(record);

        self.slots.push(Slot {
            offset: new_record_start as u64,
            length: record.len() as u64,
            state: SlotState::Normal,
        });

        self.header.free_space_end = new_record_start as u32;
        self.header.free_space_start += SLOT_SIZE as u32;

        Ok(self.slots.len() - 1)
    }

    /// Tombstones the slot; the record bytes and TID remain but scans
    /// must skip it.
    pub fn delete(&mut self, sid: usize) {
        self.slots[sid].state = SlotState::Dead;
    }

    /// Overwrites in place when the new record fits in the existing
    /// slot's reserved length; otherwise deletes the old slot and
    /// inserts a fresh one, returning the (possibly new) sid. Restores
    /// the original slot state if the fallback insert fails.
    pub fn update(&mut self, sid: usize, record: &[u8]) -> Result<usize, SmallError> {
        let slot = self.slots[sid];
        if record.len() as u64 <= slot.length {
            let start = slot.offset as usize;
            self.bytes[start..start + record.len()].copy_from_slice(record);
            self.slots[sid].length = record.len() as u64;
            return Ok(sid);
        }

        let previous_state = slot.state;
        self.slots[sid].state = SlotState::Dead;
        match self.insert(record) {
            Ok(new_sid) => Ok(new_sid),
            Err(e) => {
                self.slots[sid].state = previous_state;
                Err(e)
            }
        }
    }

    /// Writes `data` into an existing slot's current record region and
    /// marks it `Normal`. Unlike `update`, the slot id never changes and
    /// a tombstoned slot is resurrected. Used to reapply an
    /// already-logged insert or update during redo replay and undo
    /// application, where the slot may currently be dead.
    ///
    /// Every record for a given table schema encodes to the same fixed
    /// width, so a slot being replayed over always still has
    /// exactly the reservation `data` needs; this never exercises the
    /// delete+insert fallback `update` has to.
    pub fn restore(&mut self, sid: usize, data: &[u8]) -> Result<(), SmallError> {
        let slot = self.slots[sid];
        if data.len() as u64 > slot.length {
            return Err(SmallError::capacity(
                "restore: record no longer fits in its original slot reservation",
            ));
        }
        let start = slot.offset as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        self.slots[sid].length = data.len() as u64;
        self.slots[sid].state = SlotState::Normal;
        Ok(())
    }

    /// Returns the record bytes, or empty for a non-`Normal` slot.
    pub fn select(&self, sid: usize) -> Vec<u8> {
        let slot = self.slots[sid];
        if slot.state != SlotState::Normal {
            return Vec::new();
        }
        let start = slot.offset as usize;
        let end = start + slot.length as usize;
        self.bytes[start..end].to_vec()
    }

    pub fn slot_state(&self, sid: usize) -> SlotState {
        self.slots[sid].state
    }

    pub fn is_normal(&self, sid: usize) -> bool {
        self.slots[sid].state == SlotState::Normal
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.bytes.clone();
        out[0..HEADER_SIZE].copy_from_slice(&self.header.encode());
        for (i, slot) in self.slots.iter().enumerate() {
            let start = HEADER_SIZE + i * SLOT_SIZE;
            out[start..start + SLOT_SIZE].copy_from_slice(&slot.encode());
        }
        out
    }

    pub fn deserialize(page_size: usize, bytes: &[u8]) -> Self {
        assert_eq!(bytes.len(), page_size);
        let header = PageHeader::decode(&bytes[0..HEADER_SIZE]);

        let slot_directory_end = header.free_space_start as usize;
        let slot_count = (slot_directory_end - HEADER_SIZE) / SLOT_SIZE;
        let mut slots = Vec::with_capacity(slot_count);
        for i in 0..slot_count {
            let start = HEADER_SIZE + i * SLOT_SIZE;
            slots.push(Slot::decode(&bytes[start..start + SLOT_SIZE]));
        }

        Self {
            page_size,
            header,
            slots,
            bytes: bytes.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_select_round_trip() {
        let mut page = Page::new(512);
        let sid = page.insert(b"hello").unwrap();
        assert_eq!(page.select(sid), b"hello");
    }

    #[test]
    fn delete_is_a_tombstone() {
        let mut page = Page::new(512);
        let sid = page.insert(b"hello").unwrap();
        page.delete(sid);
        assert_eq!(page.select(sid), Vec::<u8>::new());
        assert_eq!(page.slot_state(sid), SlotState::Dead);
    }

    #[test]
    fn update_in_place_when_it_fits() {
        let mut page = Page::new(512);
        let sid = page.insert(b"hello").unwrap();
        let new_sid = page.update(sid, b"hi").unwrap();
        assert_eq!(new_sid, sid);
        assert_eq!(page.select(sid), b"hi");
    }

    #[test]
    fn update_falls_back_to_delete_insert_when_it_does_not_fit() {
        let mut page = Page::new(512);
        let sid = page.insert(b"hi").unwrap();
        let new_sid = page.update(sid, b"hello world").unwrap();
        assert_ne!(new_sid, sid);
        assert_eq!(page.slot_state(sid), SlotState::Dead);
        assert_eq!(page.select(new_sid), b"hello world");
    }

    #[test]
    fn insert_fails_full_without_mutating_state() {
        let mut page = Page::new(HEADER_SIZE + SLOT_SIZE + 4);
        page.insert(&[1, 2, 3, 4]).unwrap();
        let before = page.clone();
        let err = page.insert(&[1]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Capacity);
        assert_eq!(page, before);
    }

    #[test]
    fn serialize_deserialize_round_trip() {
        let mut page = Page::new(512);
        page.insert(b"abc").unwrap();
        page.insert(b"defgh").unwrap();
        page.delete(0);
        page.set_header(42);
        page.set_next_leaf(Some(7));

        let bytes = page.serialize();
        let restored = Page::deserialize(512, &bytes);

        assert_eq!(restored.header().lsn, 42);
        assert_eq!(restored.next_leaf(), Some(7));
        assert_eq!(restored.slot_state(0), SlotState::Dead);
        assert_eq!(restored.select(1), b"defgh");
    }

    #[test]
    fn restore_resurrects_a_tombstoned_slot_in_place() {
        let mut page = Page::new(512);
        let sid = page.insert(b"hello").unwrap();
        page.delete(sid);
        page.restore(sid, b"howdy").unwrap();
        assert_eq!(page.slot_state(sid), SlotState::Normal);
        assert_eq!(page.select(sid), b"howdy");
    }

    #[test]
    fn restore_rejects_a_record_too_large_for_the_slot() {
        let mut page = Page::new(512);
        let sid = page.insert(b"hi").unwrap();
        let err = page.restore(sid, b"much too long").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Capacity);
    }

    #[test]
    fn free_space_end_never_below_start() {
        let mut page = Page::new(512);
        for i in 0..5 {
            page.insert(format!("row-{}", i).as_bytes()).unwrap();
            assert!(page.header().free_space_end >= page.header().free_space_start);
        }
    }
}
