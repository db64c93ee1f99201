//! Exchange history
//!
//! Append-only log of completed encryption/decryption exchanges, in arrival
//! order. The store is a cheap cloneable handle: the polling task appends and
//! any number of readers take snapshots.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Direction of a completed exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    /// Plain text turned into ciphertext
    Encrypted,
    /// Ciphertext turned back into text
    Decrypted,
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encrypted => write!(f, "Encrypted"),
            Self::Decrypted => write!(f, "Decrypted"),
        }
    }
}

/// One original value paired with the device's result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    kind: ExchangeKind,
    original: String,
    result: String,
}

impl ExchangeRecord {
    /// Create a record
    pub fn new(kind: ExchangeKind, original: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            kind,
            original: original.into(),
            result: result.into(),
        }
    }

    /// Exchange direction
    pub fn kind(&self) -> ExchangeKind {
        self.kind
    }

    /// Value the device echoed as `Original:`
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Value the device reported as the result, unformatted
    pub fn result(&self) -> &str {
        &self.result
    }
}

impl fmt::Display for ExchangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Original: {} | {}: {}", self.original, self.kind, self.result)
    }
}

/// Shared, append-only history
#[derive(Debug, Clone, Default)]
pub struct History {
    records: Arc<RwLock<Vec<ExchangeRecord>>>,
}

impl History {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Existing records are never touched.
    pub fn append(&self, record: ExchangeRecord) {
        self.records.write().push(record);
    }

    /// Point-in-time copy of every record, oldest first
    pub fn snapshot(&self) -> Vec<ExchangeRecord> {
        self.records.read().clone()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Most recent record
    pub fn last(&self) -> Option<ExchangeRecord> {
        self.records.read().last().cloned()
    }
}
