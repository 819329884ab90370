//! 📬 Response validator: reading Elasticsearch's reply and deciding whether to believe it.
//!
//! A bulk response can be HTTP 200 and still mean "half your documents bounced". The only
//! thing that tells you is the top-level `errors` flag. This module reads it and answers one
//! question: did anything go wrong?
//!
//! 🧠 Knowledge graph:
//! - Parses as JSON → trust the first top-level `errors` key, in document order. Later
//!   duplicates are ignored. Missing, not a bool, or a non-object root all count as errors.
//! - Fails to parse → look for the literal `"errors":false,"items":[` in the raw bytes. Big
//!   responses get truncated by proxies, and that prefix is the cluster saying "all good"
//!   before it trails off. Anything else is logged and treated as an error.
//! - "When in doubt, retry." Duplicates are annoying. Lost logs are a postmortem.

use memchr::memmem;
use tracing::{debug, error};

use crate::value::{Value, find_entry};

/// ✅ The prefix a healthy bulk response starts with, byte for byte.
pub const SUCCESS_PREFIX: &[u8] = br#""errors":false,"items":["#;

/// 📬 What the payload told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// ✅ `errors` was `false`.
    NoErrors,
    /// 💀 `errors` was `true`: at least one item failed.
    ItemErrors,
    /// 🤷 Could not confirm success either way.
    Ambiguous,
}

impl ResponseStatus {
    pub fn has_errors(self) -> bool {
        !matches!(self, ResponseStatus::NoErrors)
    }
}

/// 🔍 Read a bulk response payload.
pub fn inspect(payload: &[u8]) -> ResponseStatus {
    if payload.is_empty() {
        debug!("📬 empty bulk response");
        return ResponseStatus::Ambiguous;
    }

    match serde_json::from_slice::<Value>(payload) {
        Ok(root) => match root.as_map() {
            Some(entries) => match find_entry(entries, "errors") {
                Some(Value::Boolean(false)) => ResponseStatus::NoErrors,
                Some(Value::Boolean(true)) => ResponseStatus::ItemErrors,
                Some(other) => {
                    error!("💀 bulk response 'errors' is a {}, not a boolean", other.kind());
                    ResponseStatus::Ambiguous
                }
                None => {
                    error!("💀 bulk response has no 'errors' key");
                    ResponseStatus::Ambiguous
                }
            },
            None => {
                error!("💀 bulk response root is a {}, not a JSON object", root.kind());
                ResponseStatus::Ambiguous
            }
        },
        Err(err) => {
            if memmem::find(payload, SUCCESS_PREFIX).is_some() {
                debug!("📬 bulk response did not parse ({err}) but reports no errors");
                return ResponseStatus::NoErrors;
            }
            error!(
                "💀 could not parse bulk response ({err}): {}",
                String::from_utf8_lossy(payload)
            );
            ResponseStatus::Ambiguous
        }
    }
}

/// 🎯 `true` unless the payload positively confirms zero item failures.
pub fn has_item_errors(payload: &[u8]) -> bool {
    inspect(payload).has_errors()
}

/// 🔁 What the caller should do with the batch after a bulk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushVerdict {
    Success,
    Retry,
}

/// 🚦 HTTP status and payload in, verdict out. Anything but 200/201 is a retry.
pub fn check_response(status: u16, payload: &[u8]) -> FlushVerdict {
    if status != 200 && status != 201 {
        debug!("📬 bulk request returned HTTP {status}, retrying");
        return FlushVerdict::Retry;
    }
    if has_item_errors(payload) {
        FlushVerdict::Retry
    } else {
        FlushVerdict::Success
    }
}
