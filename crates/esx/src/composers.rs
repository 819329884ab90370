//! 🎬 *[the batch is decoded. the index is chosen. the buffer waits, empty and hopeful.]*
//!
//! 🎼 The Composers module: turning records into `/_bulk` lines.
//!
//! 🧠 Knowledge graph:
//! - [`DocumentLayout`]: what a document looks like. Time key first, tag key second (if on),
//!   then the record's own fields, sanitized, in their original order.
//! - [`ActionLine`]: `{"index":{"_index":..,"_type":..,"_id":..}}`.
//! - [`BulkBuffer`]: where both lines land, newline-terminated.
//! - [`BulkComposer`]: one flush worth of state tying the three together.
//!
//! ```text
//! Record ──▶ DocumentLayout::build ──▶ serde_json ──▶ doc line
//!                                                     │
//!          FlushIndex::resolve + IdGenerator ─────────┴──▶ ActionLine ──▶ BulkBuffer
//! ```
//!
//! 🦆 (the duck has read the bulk API docs. the duck would like to un-read them.)

mod action;
mod bulk_buffer;

pub use action::ActionLine;
pub use bulk_buffer::BulkBuffer;

use std::fmt::Write;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::app_config::OutputConfig;
use crate::common::Record;
use crate::error::{ConfigError, FormatError};
use crate::id::IdGenerator;
use crate::index::{FlushIndex, strftime_into, validate_time_pattern};
use crate::sanitize::Sanitizer;
use crate::value::{Map, Value};

/// 📐 How a single document is laid out, fixed at configuration time.
#[derive(Debug, Clone)]
pub struct DocumentLayout {
    time_key: String,
    time_format: String,
    time_nanos: bool,
    tag_key: Option<String>,
    sanitizer: Sanitizer,
}

impl DocumentLayout {
    pub fn from_config(config: &OutputConfig) -> Result<Self, ConfigError> {
        validate_time_pattern("time_key_format", &config.time_key_format)?;
        Ok(Self {
            time_key: config.time_key.clone(),
            time_format: config.time_key_format.clone(),
            time_nanos: config.time_key_nanos,
            tag_key: config.include_tag_key.then(|| config.tag_key.clone()),
            sanitizer: Sanitizer::new(config.replace_dots),
        })
    }

    /// ⏰ `time_key_format` output plus `.mmmZ`, or `.nnnnnnnnnZ` with `time_key_nanos`.
    pub fn render_time(&self, at: &DateTime<Utc>) -> Result<String, FormatError> {
        let mut out = String::new();
        strftime_into(&mut out, &self.time_format, at)?;
        let nanos = at.timestamp_subsec_nanos().min(999_999_999);
        let fraction = if self.time_nanos {
            write!(out, ".{nanos:09}Z")
        } else {
            write!(out, ".{:03}Z", nanos / 1_000_000)
        };
        fraction.map_err(|_| FormatError::TimeFormat(self.time_format.clone()))?;
        Ok(out)
    }

    /// 🏗️ The document for one record: time, tag, then every field the record carried.
    pub fn build(&self, record: &Record, tag: &str, at: &DateTime<Utc>) -> Result<Map, FormatError> {
        let mut doc = Vec::new();
        doc.try_reserve(record.fields.len() + 2)?;
        doc.push((
            Value::from(self.time_key.as_str()),
            Value::String(self.render_time(at)?),
        ));
        if let Some(tag_key) = &self.tag_key {
            doc.push((Value::from(tag_key.as_str()), Value::from(tag)));
        }
        self.sanitizer.sanitize_into(&record.fields, &mut doc)?;
        Ok(doc)
    }
}

/// 🎼 One flush in progress.
///
/// Holds the scratch buffers so the per-record path reuses allocations instead of making
/// fresh ones. Dropped (or finished) when the flush is over.
#[derive(Debug)]
pub struct BulkComposer<'a> {
    layout: &'a DocumentLayout,
    index: FlushIndex<'a>,
    doc_type: Option<&'a str>,
    ids: &'a IdGenerator,
    tag: &'a str,
    now: DateTime<Utc>,
    use_now: bool,
    buffer: BulkBuffer,
    doc_line: Vec<u8>,
    action_line: Vec<u8>,
}

impl<'a> BulkComposer<'a> {
    /// 🏗️ `use_now` pins every record to `now` instead of its own time.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        layout: &'a DocumentLayout,
        index: FlushIndex<'a>,
        doc_type: Option<&'a str>,
        ids: &'a IdGenerator,
        tag: &'a str,
        now: DateTime<Utc>,
        use_now: bool,
        buffer: BulkBuffer,
    ) -> Self {
        Self {
            layout,
            index,
            doc_type,
            ids,
            tag,
            now,
            use_now,
            buffer,
            doc_line: Vec::new(),
            action_line: Vec::new(),
        }
    }

    /// ➕ Compose one record into the buffer.
    ///
    /// A record whose timestamp chrono cannot represent is skipped with a warning. Every
    /// other failure aborts the flush.
    pub fn push(&mut self, record: &Record) -> Result<(), FormatError> {
        let at = if self.use_now {
            self.now
        } else {
            match record.timestamp.to_datetime() {
                Some(at) => at,
                None => {
                    warn!(
                        "⚠️ skipping record with out-of-range timestamp {}.{:09}",
                        record.timestamp.secs, record.timestamp.nanos
                    );
                    return Ok(());
                }
            }
        };

        let doc = Value::Map(self.layout.build(record, self.tag, &at)?);
        self.doc_line.clear();
        serde_json::to_writer(&mut self.doc_line, &doc)?;

        let index = self.index.resolve(self.tag, &record.fields, &at)?;
        let id = self.ids.generate(&self.doc_line, &record.fields)?;

        self.action_line.clear();
        ActionLine::new(&index, self.doc_type, id.as_deref()).write_into(&mut self.action_line)?;

        self.buffer.append(&self.action_line, &self.doc_line)
    }

    /// 🏁 Hand over the finished payload.
    pub fn finish(self) -> BulkBuffer {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Timestamp;
    use crate::index::IndexResolver;
    use anyhow::Result;
    use chrono::TimeZone;

    fn the_record(json: &str, secs: i64, nanos: u32) -> Record {
        let fields = match serde_json::from_str::<Value>(json).expect("fixture is JSON") {
            Value::Map(m) => m,
            _ => unreachable!("fixture is a map"),
        };
        Record::new(Timestamp::new(secs, nanos).expect("valid nanos"), fields)
    }

    fn compose(config: &OutputConfig, records: &[Record], tag: &str) -> Result<String> {
        let layout = DocumentLayout::from_config(config)?;
        let resolver = IndexResolver::from_config(config)?;
        let ids = IdGenerator::from_config(config)?;
        let now = Utc.with_ymd_and_hms(2030, 6, 7, 8, 9, 10).unwrap();
        let mut composer = BulkComposer::new(
            &layout,
            resolver.for_flush(&now)?,
            resolver.doc_type(),
            &ids,
            tag,
            now,
            config.current_time_index,
            BulkBuffer::new(),
        );
        for record in records {
            composer.push(record)?;
        }
        Ok(String::from_utf8(composer.finish().into_bytes())?)
    }

    #[test]
    fn the_one_where_time_renders_in_millis_and_nanos() -> Result<()> {
        let at = DateTime::from_timestamp(1_704_164_645, 123_456_789).unwrap();
        let the_millis = DocumentLayout::from_config(&OutputConfig::default())?;
        assert_eq!(the_millis.render_time(&at)?, "2024-01-02T03:04:05.123Z");

        let the_nanos = DocumentLayout::from_config(&OutputConfig {
            time_key_nanos: true,
            ..OutputConfig::default()
        })?;
        assert_eq!(the_nanos.render_time(&at)?, "2024-01-02T03:04:05.123456789Z");
        Ok(())
    }

    #[test]
    fn the_one_where_time_and_tag_cut_the_line() -> Result<()> {
        let the_config = OutputConfig {
            include_tag_key: true,
            replace_dots: true,
            ..OutputConfig::default()
        };
        let the_layout = DocumentLayout::from_config(&the_config)?;
        let the_doc = the_layout.build(
            &the_record(r#"{"a.b":"c","n":1}"#, 0, 0),
            "app.logs",
            &DateTime::from_timestamp(0, 0).unwrap(),
        )?;
        let the_json = serde_json::to_string(&Value::Map(the_doc))?;
        assert_eq!(
            the_json,
            r#"{"@timestamp":"1970-01-01T00:00:00.000Z","flb-key":"app.logs","a_b":"c","n":1}"#
        );
        Ok(())
    }

    #[test]
    fn the_one_where_each_record_becomes_exactly_two_lines() -> Result<()> {
        let the_records = [
            the_record(r#"{"msg":"one"}"#, 1_704_164_645, 0),
            the_record(r#"{"msg":"two"}"#, 1_704_164_646, 0),
        ];
        let the_payload = compose(&OutputConfig::default(), &the_records, "t")?;
        let the_lines: Vec<&str> = the_payload.lines().collect();
        assert_eq!(the_lines.len(), 4);
        assert!(the_payload.ends_with('\n'));
        assert_eq!(the_lines[0], r#"{"index":{"_index":"fluent-bit","_type":"_doc"}}"#);
        assert_eq!(the_lines[1], r#"{"@timestamp":"2024-01-02T03:04:05.000Z","msg":"one"}"#);
        assert_eq!(the_lines[3], r#"{"@timestamp":"2024-01-02T03:04:06.000Z","msg":"two"}"#);
        Ok(())
    }

    #[test]
    fn the_one_where_current_time_rewrites_both_the_index_and_the_clock() -> Result<()> {
        let the_config = OutputConfig {
            index: "logs-%Y.%m.%d".into(),
            current_time_index: true,
            ..OutputConfig::default()
        };
        let the_payload = compose(&the_config, &[the_record(r#"{"x":1}"#, 0, 0)], "t")?;
        let the_lines: Vec<&str> = the_payload.lines().collect();
        assert_eq!(the_lines[0], r#"{"index":{"_index":"logs-2030.06.07","_type":"_doc"}}"#);
        assert_eq!(the_lines[1], r#"{"@timestamp":"2030-06-07T08:09:10.000Z","x":1}"#);
        Ok(())
    }

    #[test]
    fn the_one_where_the_hash_id_covers_the_document_line() -> Result<()> {
        let the_config = OutputConfig {
            generate_id: true,
            suppress_type_name: true,
            ..OutputConfig::default()
        };
        let the_payload = compose(&the_config, &[the_record(r#"{"x":1}"#, 0, 0)], "t")?;
        let the_lines: Vec<&str> = the_payload.lines().collect();
        let the_action: serde_json::Value = serde_json::from_str(the_lines[0])?;
        assert_eq!(
            the_action["index"]["_id"],
            crate::id::hash_id(the_lines[1].as_bytes()).as_str()
        );
        assert!(the_action["index"].get("_type").is_none());
        Ok(())
    }

    #[test]
    fn the_one_where_a_timestamp_from_beyond_the_calendar_is_skipped() -> Result<()> {
        let the_records = [
            the_record(r#"{"x":1}"#, i64::MAX, 0),
            the_record(r#"{"x":2}"#, 0, 0),
        ];
        let the_payload = compose(&OutputConfig::default(), &the_records, "t")?;
        assert_eq!(the_payload.lines().count(), 2);
        assert!(the_payload.contains(r#""x":2"#));
        Ok(())
    }
}
