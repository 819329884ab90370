//! 💀 Errors: the many ways a batch can let you down.
//!
//! Everything in here is scoped to ONE flush or ONE configuration attempt. Nothing in this
//! crate is allowed to take the host process down with it. The caller gets a single failure
//! signal and retries the whole batch as a unit. No partial credit. This is not a group project.

use std::collections::TryReserveError;

use smallvec::CollectionAllocErr;
use thiserror::Error;

/// 💀 Why a batch could not be turned into a bulk payload.
///
/// Every variant aborts the flush. Malformed *records* (as opposed to malformed *batches*)
/// never show up here, they get skipped with a warning in [`crate::common::Batch::decode`].
#[derive(Debug, Error)]
pub enum FormatError {
    /// 📦 The batch is not the array-of-pairs shape we were promised, or a value nests deeper
    /// than we are willing to follow.
    #[error("💀 malformed input: {0}")]
    MalformedInput(String),

    /// 🧠 An allocation we asked for politely was refused.
    #[error("💀 resource exhausted while {0}")]
    ResourceExhausted(&'static str),

    /// 🦆 The value tree refused to become JSON.
    #[error("💀 could not serialize record to JSON: {0}")]
    SerializationFailure(#[from] serde_json::Error),

    /// ⏰ A strftime pattern failed while rendering. Patterns are validated up front, so this
    /// one should only show up if chrono changes its mind about something.
    #[error("💀 could not render time pattern '{0}'")]
    TimeFormat(String),
}

impl FormatError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        FormatError::MalformedInput(msg.into())
    }
}

impl From<TryReserveError> for FormatError {
    fn from(_: TryReserveError) -> Self {
        FormatError::ResourceExhausted("growing the bulk buffer")
    }
}

impl From<CollectionAllocErr> for FormatError {
    fn from(_: CollectionAllocErr) -> Self {
        FormatError::ResourceExhausted("spilling a map key to the heap")
    }
}

/// 🔧 Why a formatter could not be built from its options.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// ⏰ chrono rejected the pattern at parse time.
    #[error("💀 invalid strftime pattern for '{option}': '{pattern}'")]
    InvalidTimePattern { option: &'static str, pattern: String },

    /// 🔍 `logstash_prefix_key` could not be parsed as a record accessor.
    #[error("💀 invalid record accessor pattern '{pattern}': {reason}")]
    InvalidAccessor { pattern: String, reason: String },

    /// 🏷️ `id_format` contains `$[]` with nothing inside.
    #[error("💀 invalid id_format '{0}': empty placeholder")]
    EmptyIdPlaceholder(String),
}
