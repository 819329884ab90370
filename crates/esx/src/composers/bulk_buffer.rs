//! 🧺 BulkBuffer: the growable byte bucket a flush pours its lines into.
//!
//! 🧠 Knowledge graph:
//! - Two lines per record: action, then document. Each ends in `\n`, including the last one.
//! - Growth goes through `try_reserve`. If the allocator says no, the flush fails with
//!   `ResourceExhausted` and the caller retries later. We never hand back half a payload.
//! - The caller owns the bytes once the flush returns.

use crate::error::FormatError;

/// 🧺 An NDJSON bulk body under construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkBuffer {
    bytes: Vec<u8>,
    records: usize,
}

impl BulkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🧮 Start with room for `capacity` bytes. A hint, not a promise.
    pub fn with_capacity(capacity: usize) -> Result<Self, FormatError> {
        let mut bytes = Vec::new();
        bytes.try_reserve(capacity)?;
        Ok(Self { bytes, records: 0 })
    }

    /// ➕ Append one action line and one document line, each newline-terminated.
    ///
    /// Either both lines land or neither does.
    pub fn append(&mut self, action: &[u8], document: &[u8]) -> Result<(), FormatError> {
        self.bytes.try_reserve(action.len() + document.len() + 2)?;
        self.bytes.extend_from_slice(action);
        self.bytes.push(b'\n');
        self.bytes.extend_from_slice(document);
        self.bytes.push(b'\n');
        self.records += 1;
        Ok(())
    }

    /// 📏 Payload size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 🔢 How many action/document pairs are in here.
    pub fn records(&self) -> usize {
        self.records
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
