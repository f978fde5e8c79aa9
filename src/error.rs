use std::fmt;

use backtrace::Backtrace;

/// Coarse classification of an error, matching the error kinds named in
/// the storage/transaction design: callers that need to distinguish a
/// lock conflict from a corrupt page match on this instead of on a
/// family of distinct error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// malformed SQL, unknown table/column/function, unqualified identifier
    Input,
    /// page full, buffer pool exhausted
    Capacity,
    /// lock conflict after the retry budget
    Concurrency,
    /// missing file, truncated page, corrupt framing
    Storage,
    /// B+ tree / page invariant violated
    Logical,
}

/// The single error type used across the crate. Carries a human-readable
/// message, a coarse `kind`, and (when `RUST_BACKTRACE` is set) a captured
/// backtrace for diagnostics.
pub struct SmallError {
    details: String,
    kind: ErrorKind,
    backtrace: Backtrace,
}

impl SmallError {
    pub fn new(details: &str, kind: ErrorKind) -> Self {
        Self {
            details: details.to_string(),
            kind,
            backtrace: Backtrace::new(),
        }
    }

    pub fn input(details: &str) -> Self {
        Self::new(details, ErrorKind::Input)
    }

    pub fn capacity(details: &str) -> Self {
        Self::new(details, ErrorKind::Capacity)
    }

    pub fn lock_conflict(details: &str) -> Self {
        Self::new(details, ErrorKind::Concurrency)
    }

    pub fn storage(details: &str) -> Self {
        Self::new(details, ErrorKind::Storage)
    }

    pub fn logical(details: &str) -> Self {
        Self::new(details, ErrorKind::Logical)
    }

    /// a deliberately-restricted query feature (e.g. multi-column index
    /// predicates, more than one aggregate), as opposed to malformed SQL;
    /// surfaced as `Input` since both are rejections the caller must not retry.
    pub fn not_implemented(details: &str) -> Self {
        Self::new(details, ErrorKind::Input)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn show_backtrace(&self) {
        println!("{:?}", self.backtrace);
    }
}

impl fmt::Display for SmallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.details)
    }
}

impl fmt::Debug for SmallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SmallError {{ kind: {:?}, details: {} }}", self.kind, self.details)
    }
}

impl std::error::Error for SmallError {}

impl From<std::io::Error> for SmallError {
    fn from(e: std::io::Error) -> Self {
        SmallError::storage(&format!("io error: {}", e))
    }
}

impl PartialEq for SmallError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.details == other.details
    }
}
