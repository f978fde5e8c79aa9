use std::convert::TryInto;
use std::io::{Read, SeekFrom};
use std::path::Path;

use log::debug;

use crate::error::SmallError;
use crate::types::SimpleResult;
use crate::util::{read_into, SmallFile};

/// Action tag for a redo (and, reusing the same shape, undo) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedoAction {
    Begin,
    Commit,
    Abort,
    TableInsert,
    TableDelete,
    TableUpdate,
    IndexInsert,
    IndexDelete,
    IndexUpdate,
    Checkpoint,
}

impl RedoAction {
    fn to_u8(self) -> u8 {
        match self {
            RedoAction::Begin => 0,
            RedoAction::Commit => 1,
            RedoAction::Abort => 2,
            RedoAction::TableInsert => 3,
            RedoAction::TableDelete => 4,
            RedoAction::TableUpdate => 5,
            RedoAction::IndexInsert => 6,
            RedoAction::IndexDelete => 7,
            RedoAction::IndexUpdate => 8,
            RedoAction::Checkpoint => 9,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => RedoAction::Begin,
            1 => RedoAction::Commit,
            2 => RedoAction::Abort,
            3 => RedoAction::TableInsert,
            4 => RedoAction::TableDelete,
            5 => RedoAction::TableUpdate,
            6 => RedoAction::IndexInsert,
            7 => RedoAction::IndexDelete,
            8 => RedoAction::IndexUpdate,
            9 => RedoAction::Checkpoint,
            _ => panic!("corrupt redo action tag: {}", v),
        }
    }
}

/// `(xid, action, relation, location, data)`. Framed on disk as an
/// 8-byte little-endian content size followed by the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RedoRecord {
    pub xid: i64,
    pub action: RedoAction,
    pub relation: Option<String>,
    pub location: Option<(u32, u32)>,
    pub data: Vec<u8>,
}

impl RedoRecord {
    pub fn sentinel(xid: i64, action: RedoAction) -> Self {
        Self {
            xid,
            action,
            relation: None,
            location: None,
            data: Vec::new(),
        }
    }

    pub fn mutation(
        xid: i64,
        action: RedoAction,
        relation: &str,
        location: (u32, u32),
        data: Vec<u8>,
    ) -> Self {
        Self {
            xid,
            action,
            relation: Some(relation.to_string()),
            location: Some(location),
            data,
        }
    }

    fn encode_payload(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.xid.to_le_bytes());
        buf.push(self.action.to_u8());
        match &self.relation {
            Some(s) => {
                buf.push(1);
                let bytes = s.as_bytes();
                buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                buf.extend_from_slice(bytes);
            }
            None => buf.push(0),
        }
        match self.location {
            Some((pageno, sid)) => {
                buf.push(1);
                buf.extend_from_slice(&pageno.to_le_bytes());
                buf.extend_from_slice(&sid.to_le_bytes());
            }
            None => buf.push(0),
        }
        buf.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }

    pub(crate) fn decode_payload(bytes: &[u8]) -> Self {
        let mut cursor = std::io::Cursor::new(bytes);
        let mut buf8 = [0u8; 8];

        cursor.read_exact(&mut buf8).unwrap();
        let xid = i64::from_le_bytes(buf8);

        let action = RedoAction::from_u8(read_into(&mut cursor));

        let has_relation: u8 = read_into(&mut cursor);
        let relation = if has_relation == 1 {
            let mut len_buf = [0u8; 4];
            cursor.read_exact(&mut len_buf).unwrap();
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut s = vec![0u8; len];
            cursor.read_exact(&mut s).unwrap();
            Some(String::from_utf8(s).unwrap())
        } else {
            None
        };

        let has_location: u8 = read_into(&mut cursor);
        let location = if has_location == 1 {
            let mut p = [0u8; 4];
            let mut s = [0u8; 4];
            cursor.read_exact(&mut p).unwrap();
            cursor.read_exact(&mut s).unwrap();
            Some((u32::from_le_bytes(p), u32::from_le_bytes(s)))
        } else {
            None
        };

        let mut len_buf = [0u8; 4];
        cursor.read_exact(&mut len_buf).unwrap();
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut data = vec![0u8; len];
        cursor.read_exact(&mut data).unwrap();

        Self {
            xid,
            action,
            relation,
            location,
            data,
        }
    }

    pub(crate) fn framed(&self) -> Vec<u8> {
        let payload = self.encode_payload();
        let content_size = (8 + payload.len()) as u64;
        let mut out = Vec::with_capacity(8 + payload.len());
        out.extend_from_slice(&content_size.to_le_bytes());
        out.extend_from_slice(&payload);
        out
    }
}

/// Append-only write-ahead log. `write_lsn` is the byte offset
/// one-past-the-last buffered record; `flush_lsn` is one-past-the-last
/// durable record.
pub struct RedoLog {
    file: SmallFile,
    buffer: Vec<u8>,
    write_lsn: u64,
    flush_lsn: u64,
    flush_threshold: usize,
}

impl RedoLog {
    pub fn open<P: AsRef<Path>>(path: P, flush_threshold: usize) -> Result<Self, SmallError> {
        let file = SmallFile::new(path)?;
        let size = file.get_size()?;
        Ok(Self {
            file,
            buffer: Vec::new(),
            write_lsn: size,
            flush_lsn: size,
            flush_threshold,
        })
    }

    pub fn write_lsn(&self) -> u64 {
        self.write_lsn
    }

    pub fn flush_lsn(&self) -> u64 {
        self.flush_lsn
    }

    /// Appends to the in-memory buffer and returns the new `write_lsn`.
    /// Flushes immediately if the buffer exceeds the configured
    /// threshold, or unconditionally for a `Commit` record — a commit
    /// must be durable before the call returns.
    pub fn write(&mut self, record: &RedoRecord) -> Result<u64, SmallError> {
        let framed = record.framed();
        self.buffer.extend_from_slice(&framed);
        self.write_lsn += framed.len() as u64;

        if self.buffer.len() >= self.flush_threshold || record.action == RedoAction::Commit {
            self.flush()?;
        }

        Ok(self.write_lsn)
    }

    pub fn flush(&mut self) -> SimpleResult {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_bytes(&self.buffer)?;
        self.file.flush()?;
        debug!("redo log flushed {} bytes, flush_lsn -> {}", self.buffer.len(), self.write_lsn);
        self.flush_lsn = self.write_lsn;
        self.buffer.clear();
        Ok(())
    }

    /// Yields `(lsn_after_record, record)` in order from `start_lsn` to
    /// EOF. Flushes first so replay only ever sees durable bytes. Stops
    /// at the first truncated/undersized tail record instead of
    /// erroring, per the storage-errors handling design.
    pub fn replay(&mut self, start_lsn: u64) -> Result<Vec<(u64, RedoRecord)>, SmallError> {
        self.flush()?;
        self.file.seek(SeekFrom::Start(start_lsn))?;

        let mut out = Vec::new();
        loop {
            let content_size = match self.file.read::<u64>() {
                Ok(v) => v,
                Err(_) => break,
            };
            if content_size < 8 {
                break;
            }
            let payload_len = (content_size - 8) as usize;
            let payload = match self.file.read_exact_bytes(payload_len) {
                Ok(v) => v,
                Err(_) => break,
            };
            let record = RedoRecord::decode_payload(&payload);
            let lsn_after = self.file.get_current_position()?;
            out.push((lsn_after, record));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_replay_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("redo.log");
        let mut log = RedoLog::open(&path, 4096).unwrap();

        log.write(&RedoRecord::sentinel(1, RedoAction::Begin)).unwrap();
        log.write(&RedoRecord::mutation(1, RedoAction::TableInsert, "t", (0, 0), vec![1, 2, 3]))
            .unwrap();
        log.write(&RedoRecord::sentinel(1, RedoAction::Commit)).unwrap();

        let records = log.replay(0).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].1.action, RedoAction::TableInsert);
        assert_eq!(records[1].1.data, vec![1, 2, 3]);
        assert_eq!(records[1].1.relation.as_deref(), Some("t"));
    }

    #[test]
    fn commit_forces_immediate_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("redo.log");
        let mut log = RedoLog::open(&path, usize::MAX).unwrap();
        log.write(&RedoRecord::sentinel(1, RedoAction::Commit)).unwrap();
        assert_eq!(log.flush_lsn(), log.write_lsn());
    }
}
