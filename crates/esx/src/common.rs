//! 📦 Common data structures: the building blocks of esx
//!
//! ---
//!
//! 🎬 COLD OPEN: INT. LOG PIPELINE: 3:47 AM
//!
//! A `Batch` arrives. Quietly. Carrying its records like a responsible adult carrying
//! groceries in one trip. Each `Record` knows exactly two things: when it happened, and what
//! it had to say about it. Neither of them knows which index they will end up in. Relatable.
//!
//! 🦆
//!
//! ---
//!
//! 🧠 Knowledge graph:
//! - Wire shape in: a JSON array of `[time, {fields}]` pairs.
//! - `time` is an integer (seconds), a float (seconds + fraction) or `[seconds, nanoseconds]`.
//! - A batch that is not an array, or is an empty array, is fatal for the flush.
//! - A single record with the wrong shape is skipped with a warning. The rest carry on.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::FormatError;
use crate::value::{Map, Value};

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// ⏰ A point in time, split the way event pipelines like it: whole seconds plus nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Timestamp {
    /// 🏗️ Build a timestamp, refusing nanosecond counts that are really seconds in disguise.
    pub fn new(secs: i64, nanos: u32) -> Option<Self> {
        (nanos < NANOS_PER_SEC).then_some(Self { secs, nanos })
    }

    /// 📅 As a UTC calendar time. `None` for instants chrono cannot represent.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.secs, self.nanos)
    }

    /// 🔄 Pull a timestamp out of the first slot of a record pair.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(secs) => Self::new(*secs, 0),
            Value::Unsigned(secs) => Self::new(i64::try_from(*secs).ok()?, 0),
            Value::Float(f) if f.is_finite() => {
                let secs = f.floor();
                // 🧮 round, then clamp: 0.9999999999 should not turn into a full extra second
                let nanos = (((f - secs) * f64::from(NANOS_PER_SEC)).round() as u32)
                    .min(NANOS_PER_SEC - 1);
                if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
                    return None;
                }
                Self::new(secs as i64, nanos)
            }
            Value::Array(parts) => match parts.as_slice() {
                [secs, nanos] => {
                    let secs = match secs {
                        Value::Integer(s) => *s,
                        Value::Unsigned(s) => i64::try_from(*s).ok()?,
                        _ => return None,
                    };
                    let nanos = match nanos {
                        Value::Integer(n) => u32::try_from(*n).ok()?,
                        Value::Unsigned(n) => u32::try_from(*n).ok()?,
                        _ => return None,
                    };
                    Self::new(secs, nanos)
                }
                _ => None,
            },
            _ => None,
        }
    }
}

/// 🎯 One log record: a timestamp and an ordered bag of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub timestamp: Timestamp,
    pub fields: Map,
}

impl Record {
    pub fn new(timestamp: Timestamp, fields: Map) -> Self {
        Self { timestamp, fields }
    }
}

/// 📦 A `Batch`: because one record is never enough.
///
/// Think of it as a shopping cart, except everything in the cart is a log line and the store
/// is an Elasticsearch cluster. Read-only once decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// 🏗️ Decode a JSON-encoded batch.
    ///
    /// # Errors
    /// 💀 `MalformedInput` if the bytes are not JSON, the root is not an array, or the array is
    /// empty. Individual records that are not `[time, {map}]` pairs are skipped, not fatal.
    pub fn decode(data: &[u8]) -> Result<Self, FormatError> {
        let root: Value = serde_json::from_slice(data)
            .map_err(|err| FormatError::malformed(format!("batch is not valid JSON: {err}")))?;

        let entries = match root {
            Value::Array(entries) => entries,
            other => {
                return Err(FormatError::malformed(format!(
                    "batch root must be an array, got {}",
                    other.kind()
                )));
            }
        };
        if entries.is_empty() {
            return Err(FormatError::malformed("batch is an empty array"));
        }

        let total = entries.len();
        let mut records = Vec::with_capacity(total);
        for (position, entry) in entries.into_iter().enumerate() {
            match Self::decode_record(entry) {
                Some(record) => records.push(record),
                None => warn!(
                    "⚠️ skipping record #{position}: expected a [time, {{map}}] pair, got something else"
                ),
            }
        }

        debug!("📦 decoded {} of {} records", records.len(), total);
        Ok(Self { records })
    }

    fn decode_record(entry: Value) -> Option<Record> {
        let Value::Array(pair) = entry else {
            return None;
        };
        let [time, body]: [Value; 2] = pair.try_into().ok()?;
        let timestamp = Timestamp::from_value(&time)?;
        match body {
            Value::Map(fields) => Some(Record::new(timestamp, fields)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }
}
