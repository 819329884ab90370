//! 🏭 BulkFormatter: the one object a caller builds, shares, and formats with.
//!
//! ```text
//! OutputConfig ──▶ BulkFormatter::new ──▶ &BulkFormatter (Send + Sync, shared)
//!                                            │
//!             encoded batch + tag ──▶ format ─┴─▶ BulkBuffer ──▶ your HTTP client
//!                                                                  │
//!                          status + payload ──▶ check_response ◀───┘ ──▶ FlushVerdict
//! ```
//!
//! 🧠 Knowledge graph:
//! - Built once per output target. Every pattern, accessor and id template is validated here,
//!   so a bad config fails at startup and never mid-flush.
//! - Immutable afterwards. Concurrent flushes share it by reference, no locks involved.
//! - One wall-clock read per flush. Static index names and current-time mode both use it.
//! - Any error abandons the whole batch and drops the partial buffer. Retry the batch, not
//!   the records.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::app_config::OutputConfig;
use crate::common::Batch;
use crate::composers::{BulkBuffer, BulkComposer, DocumentLayout};
use crate::error::{ConfigError, FormatError};
use crate::id::IdGenerator;
use crate::index::IndexResolver;
use crate::response::{self, FlushVerdict};

/// 🧮 Rough bytes per record for the initial buffer size. Vibes-based, usually close.
const ESTIMATED_RECORD_BYTES: usize = 256;

/// 🏭 The formatting context for one output target.
#[derive(Debug, Clone)]
pub struct BulkFormatter {
    layout: DocumentLayout,
    index: IndexResolver,
    ids: IdGenerator,
    current_time_index: bool,
    trace_output: bool,
    trace_error: bool,
}

impl BulkFormatter {
    /// 🏗️ Compile an `OutputConfig` into a ready-to-use formatter.
    ///
    /// # Errors
    /// 💀 `ConfigError` for strftime patterns chrono rejects, a `logstash_prefix_key` that is
    /// not a valid accessor, or an `id_format` with an empty `$[]`.
    pub fn new(config: &OutputConfig) -> Result<Self, ConfigError> {
        let formatter = Self {
            layout: DocumentLayout::from_config(config)?,
            index: IndexResolver::from_config(config)?,
            ids: IdGenerator::from_config(config)?,
            current_time_index: config.current_time_index,
            trace_output: config.trace_output,
            trace_error: config.trace_error,
        };
        debug!("🏭 bulk formatter ready: {formatter:?}");
        Ok(formatter)
    }

    /// 📦 Decode a JSON batch and format it against the current wall clock.
    pub fn format(&self, data: &[u8], tag: &str) -> Result<BulkBuffer, FormatError> {
        let batch = Batch::decode(data)?;
        self.format_batch_at(&batch, tag, Utc::now())
    }

    /// 📦 Format an already decoded batch against the current wall clock.
    pub fn format_batch(&self, batch: &Batch, tag: &str) -> Result<BulkBuffer, FormatError> {
        self.format_batch_at(batch, tag, Utc::now())
    }

    /// 📦 Format a batch with an explicit `now`. Deterministic, which is what tests want.
    ///
    /// # Errors
    /// 💀 `MalformedInput` for an empty batch or runaway nesting, `ResourceExhausted` when an
    /// allocation is refused, `SerializationFailure` when a record will not become JSON.
    pub fn format_batch_at(
        &self,
        batch: &Batch,
        tag: &str,
        now: DateTime<Utc>,
    ) -> Result<BulkBuffer, FormatError> {
        if batch.is_empty() {
            return Err(FormatError::malformed("batch has no records"));
        }

        let buffer = BulkBuffer::with_capacity(batch.len() * ESTIMATED_RECORD_BYTES)?;
        let mut composer = BulkComposer::new(
            &self.layout,
            self.index.for_flush(&now)?,
            self.index.doc_type(),
            &self.ids,
            tag,
            now,
            self.current_time_index,
            buffer,
        );
        for record in batch.iter() {
            composer.push(record)?;
        }
        let buffer = composer.finish();

        debug!(
            "📦 formatted {} of {} records into {} bytes for tag '{tag}'",
            buffer.records(),
            batch.len(),
            buffer.len()
        );
        if self.trace_output {
            info!(target: "esx::trace", "{}", String::from_utf8_lossy(buffer.as_bytes()));
        }
        Ok(buffer)
    }

    /// 🚦 Decide what happens to a batch after the cluster answered.
    ///
    /// `request` is the payload that was sent; it is only read when `trace_error` is on.
    pub fn check_response(&self, status: u16, payload: &[u8], request: &[u8]) -> FlushVerdict {
        let verdict = response::check_response(status, payload);
        if verdict == FlushVerdict::Retry {
            if status != 200 && status != 201 && !payload.is_empty() {
                error!(
                    "💀 bulk request failed with HTTP {status}: {}",
                    String::from_utf8_lossy(payload)
                );
            }
            if self.trace_error {
                debug!(target: "esx::trace", "📤 request: {}", String::from_utf8_lossy(request));
                error!(target: "esx::trace", "📥 response: {}", String::from_utf8_lossy(payload));
            }
        }
        verdict
    }
}
