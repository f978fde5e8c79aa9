use std::io::SeekFrom;
use std::path::Path;

use crate::error::SmallError;
use crate::types::SimpleResult;
use crate::txn::redo::{RedoAction, RedoRecord};
use crate::util::SmallFile;

/// Same wire shape as a redo record; the `action` field carries the
/// *inverse* intention (e.g. undoing an insert is recorded as
/// `TableDelete`).
pub type UndoRecord = RedoRecord;

/// One append-only stream per transaction (`undo/<xid>`). Buffered in
/// memory, flushed with `fsync` on commit/abort.
pub struct UndoLog {
    file: SmallFile,
    buffer: Vec<u8>,
}

impl UndoLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SmallError> {
        let file = SmallFile::new(path)?;
        Ok(Self {
            file,
            buffer: Vec::new(),
        })
    }

    pub fn append(&mut self, record: &UndoRecord) {
        self.buffer.extend_from_slice(&frame(record));
    }

    pub fn start(&mut self, xid: i64) {
        self.append(&UndoRecord::sentinel(xid, RedoAction::Begin));
    }

    pub fn commit(&mut self, xid: i64) -> SimpleResult {
        self.append(&UndoRecord::sentinel(xid, RedoAction::Commit));
        self.flush()
    }

    pub fn abort(&mut self, xid: i64) -> SimpleResult {
        self.append(&UndoRecord::sentinel(xid, RedoAction::Abort));
        self.flush()
    }

    pub fn flush(&mut self) -> SimpleResult {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_bytes(&self.buffer)?;
        self.file.flush()?;
        self.buffer.clear();
        Ok(())
    }

    /// Reads every framed record in `path` in forward (write) order and
    /// returns them reversed, ready for undo application.
    pub fn parse_reverse<P: AsRef<Path>>(path: P) -> Result<Vec<UndoRecord>, SmallError> {
        let mut file = SmallFile::new(path)?;
        file.seek(SeekFrom::Start(0))?;

        let mut records = Vec::new();
        loop {
            let content_size = match file.read::<u64>() {
                Ok(v) => v,
                Err(_) => break,
            };
            if content_size < 8 {
                break;
            }
            let payload_len = (content_size - 8) as usize;
            let payload = match file.read_exact_bytes(payload_len) {
                Ok(v) => v,
                Err(_) => break,
            };
            records.push(decode(&payload));
        }

        records.reverse();
        Ok(records)
    }
}

fn frame(record: &UndoRecord) -> Vec<u8> {
    // identical wire framing to the redo log.
    record.framed()
}

fn decode(bytes: &[u8]) -> UndoRecord {
    UndoRecord::decode_payload(bytes)
}
