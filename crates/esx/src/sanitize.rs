//! 🧼 Sanitize: scrubbing field names until Elasticsearch stops complaining.
//!
//! Elasticsearch 2.x refused dots in field names. Some clusters still do, out of spite.
//! When `replace_dots` is on, every `.` byte in a string/binary key becomes `_`. Nothing else
//! changes: same entry count, same order, same value types, same key lengths.
//!
//! The walk is plain recursion over `Map` → entries and `Array` → elements, with a depth
//! counter riding along. Past [`MAX_NESTING_DEPTH`] we bail with `MalformedInput` instead of
//! letting a hostile producer find out how big our stack is.

use smallvec::SmallVec;

use crate::error::FormatError;
use crate::value::{Map, Value};

/// 🪜 How deep a record may nest before we stop following it. The record root is level 1.
pub const MAX_NESTING_DEPTH: usize = 128;

/// 📏 Keys up to this size are rewritten without touching the heap.
const INLINE_KEY_BYTES: usize = 256;

/// 🔑 Working buffer for one key: inline for the common case, heap for the long tail.
///
/// Growth goes through `try_reserve`, so an allocation failure surfaces as
/// `ResourceExhausted` instead of an abort. Nothing is ever truncated.
struct KeyBuf {
    bytes: SmallVec<[u8; INLINE_KEY_BYTES]>,
}

impl KeyBuf {
    fn copy_of(src: &[u8]) -> Result<Self, FormatError> {
        let mut bytes = SmallVec::new();
        bytes.try_reserve(src.len())?;
        bytes.extend_from_slice(src);
        Ok(Self { bytes })
    }

    fn replace_dots(&mut self) {
        for b in self.bytes.iter_mut().filter(|b| **b == b'.') {
            *b = b'_';
        }
    }

    fn into_vec(self) -> Vec<u8> {
        self.bytes.into_vec()
    }
}

/// 🧼 The sanitizer. One flag, one job.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sanitizer {
    replace_dots: bool,
}

impl Sanitizer {
    pub fn new(replace_dots: bool) -> Self {
        Self { replace_dots }
    }

    /// 🧼 Sanitize a whole mapping into a fresh one.
    pub fn sanitize_map(&self, map: &Map) -> Result<Map, FormatError> {
        let mut out = Vec::new();
        self.sanitize_into(map, &mut out)?;
        Ok(out)
    }

    /// 📥 Append the sanitized entries of `map` to `out`, in traversal order.
    ///
    /// This is what the composer uses: the time and tag keys are already sitting at the front
    /// of `out`, and the record's own fields line up behind them.
    pub fn sanitize_into(&self, map: &Map, out: &mut Map) -> Result<(), FormatError> {
        out.try_reserve(map.len())?;
        self.walk_entries(map, 1, out)
    }

    fn walk_entries(&self, map: &Map, depth: usize, out: &mut Map) -> Result<(), FormatError> {
        for (k, v) in map {
            out.push((self.key(k)?, self.value(v, depth)?));
        }
        Ok(())
    }

    fn value(&self, value: &Value, depth: usize) -> Result<Value, FormatError> {
        match value {
            Value::Map(inner) => {
                let depth = Self::descend(depth)?;
                let mut out = Vec::new();
                out.try_reserve(inner.len())?;
                self.walk_entries(inner, depth, &mut out)?;
                Ok(Value::Map(out))
            }
            Value::Array(items) => {
                let depth = Self::descend(depth)?;
                let mut out = Vec::new();
                out.try_reserve(items.len())?;
                for item in items {
                    out.push(self.value(item, depth)?);
                }
                Ok(Value::Array(out))
            }
            scalar => Ok(scalar.clone()),
        }
    }

    fn descend(depth: usize) -> Result<usize, FormatError> {
        let next = depth + 1;
        if next > MAX_NESTING_DEPTH {
            return Err(FormatError::malformed(format!(
                "record nests deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }
        Ok(next)
    }

    fn key(&self, key: &Value) -> Result<Value, FormatError> {
        match key {
            Value::String(s) => {
                let mut buf = KeyBuf::copy_of(s.as_bytes())?;
                if self.replace_dots {
                    buf.replace_dots();
                }
                // '.' → '_' swaps one ASCII byte for another, so UTF-8 validity is untouched
                Ok(Value::String(String::from_utf8(buf.into_vec()).unwrap_or_else(
                    |err| String::from_utf8_lossy(err.as_bytes()).into_owned(),
                )))
            }
            Value::Binary(b) => {
                let mut buf = KeyBuf::copy_of(b)?;
                if self.replace_dots {
                    buf.replace_dots();
                }
                Ok(Value::Binary(buf.into_vec()))
            }
            other => Ok(other.clone()),
        }
    }
}
