//! 🗂️ Index resolver: deciding which drawer each document goes in.
//!
//! Three modes, checked in this order:
//!
//! 1. **logstash** (`logstash_format`): `<prefix>-<date>`. The prefix is either the static
//!    `logstash_prefix` or whatever `logstash_prefix_key` finds in the record. The date comes
//!    from `logstash_dateformat` applied to the record's time.
//! 2. **current time** (`current_time_index`): the `index` pattern rendered against the
//!    flush's wall clock, per record.
//! 3. **static**: the `index` pattern rendered against the wall clock ONCE per flush, then
//!    reused for every record in it. No per-record variance, no per-record work.
//!
//! 🧠 Why current-time mode exists at all: producers with clocks stuck in 1970 would otherwise
//! create one index per bogus day. Pinning to the wall clock keeps the index count sane.

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::accessor::RecordAccessor;
use crate::app_config::OutputConfig;
use crate::error::{ConfigError, FormatError};
use crate::value::Map;

/// ✂️ A prefix pulled out of a record is cut to this many bytes.
pub const MAX_PREFIX_BYTES: usize = 128;

/// ⏰ Reject strftime patterns chrono cannot render, before they get a chance to fail mid-batch.
pub(crate) fn validate_time_pattern(
    option: &'static str,
    pattern: &str,
) -> Result<(), ConfigError> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidTimePattern {
            option,
            pattern: pattern.to_owned(),
        });
    }
    Ok(())
}

/// 🖨️ Render `pattern` for `at` onto the end of `out`.
pub(crate) fn strftime_into(
    out: &mut String,
    pattern: &str,
    at: &DateTime<Utc>,
) -> Result<(), FormatError> {
    write!(out, "{}", at.format(pattern)).map_err(|_| FormatError::TimeFormat(pattern.to_owned()))
}

#[derive(Debug, Clone)]
struct LogstashIndex {
    prefix: String,
    prefix_key: Option<RecordAccessor>,
    dateformat: String,
}

/// 🗂️ Compiled index settings, built once per output target.
#[derive(Debug, Clone)]
pub struct IndexResolver {
    pattern: String,
    doc_type: Option<String>,
    logstash: Option<LogstashIndex>,
    current_time_index: bool,
}

impl IndexResolver {
    /// 🏗️ Validate every pattern up front so a typo fails at startup, not at 3am.
    pub fn from_config(config: &OutputConfig) -> Result<Self, ConfigError> {
        validate_time_pattern("index", &config.index)?;

        let logstash = if config.logstash_format {
            validate_time_pattern("logstash_dateformat", &config.logstash_dateformat)?;
            let prefix_key = config
                .logstash_prefix_key
                .as_deref()
                .map(RecordAccessor::parse)
                .transpose()?;
            Some(LogstashIndex {
                prefix: config.logstash_prefix.clone(),
                prefix_key,
                dateformat: config.logstash_dateformat.clone(),
            })
        } else {
            None
        };

        Ok(Self {
            pattern: config.index.clone(),
            doc_type: (!config.suppress_type_name).then(|| config.doc_type.clone()),
            logstash,
            current_time_index: config.current_time_index,
        })
    }

    /// 🏷️ The `_type` to send, or `None` when it's suppressed (Elasticsearch 7+).
    pub fn doc_type(&self) -> Option<&str> {
        self.doc_type.as_deref()
    }

    /// 🔁 Start a flush. Static mode renders its index name here, exactly once.
    pub fn for_flush(&self, now: &DateTime<Utc>) -> Result<FlushIndex<'_>, FormatError> {
        let fixed = if self.logstash.is_none() && !self.current_time_index {
            let mut name = String::new();
            strftime_into(&mut name, &self.pattern, now)?;
            debug!("🗂️ static index for this flush: {name}");
            Some(name)
        } else {
            None
        };
        Ok(FlushIndex {
            resolver: self,
            fixed,
        })
    }
}

/// 🔁 Index resolution scoped to a single flush.
#[derive(Debug)]
pub struct FlushIndex<'a> {
    resolver: &'a IndexResolver,
    fixed: Option<String>,
}

impl FlushIndex<'_> {
    /// 🎯 The index name for one record.
    ///
    /// `at` is the record's time, or the flush's wall clock when `current_time_index` is on.
    /// The caller decides which; this function just renders.
    pub fn resolve(&self, tag: &str, fields: &Map, at: &DateTime<Utc>) -> Result<String, FormatError> {
        if let Some(name) = &self.fixed {
            return Ok(name.clone());
        }

        let resolver = self.resolver;
        let mut name = String::new();
        match &resolver.logstash {
            Some(logstash) => {
                let custom = logstash
                    .prefix_key
                    .as_ref()
                    .and_then(|accessor| accessor.translate(tag, fields));
                match custom {
                    Some(prefix) => name.push_str(truncate_prefix(&prefix)),
                    // 🔙 lookup missed: the static prefix is the safety net
                    None => name.push_str(&logstash.prefix),
                }
                name.push('-');
                strftime_into(&mut name, &logstash.dateformat, at)?;
            }
            None => strftime_into(&mut name, &resolver.pattern, at)?,
        }
        Ok(name)
    }
}

fn truncate_prefix(prefix: &str) -> &str {
    if prefix.len() <= MAX_PREFIX_BYTES {
        return prefix;
    }
    let mut cut = MAX_PREFIX_BYTES;
    while !prefix.is_char_boundary(cut) {
        cut -= 1;
    }
    warn!(
        "✂️ index prefix from record is {} bytes, keeping the first {cut}",
        prefix.len()
    );
    &prefix[..cut]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use anyhow::Result;
    use chrono::TimeZone;

    fn jan_second() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    fn fields(entries: Vec<(&str, Value)>) -> Map {
        entries.into_iter().map(|(k, v)| (Value::from(k), v)).collect()
    }

    #[test]
    fn the_one_where_logstash_builds_prefix_dash_date() -> Result<()> {
        let the_config = OutputConfig {
            logstash_format: true,
            logstash_prefix: "app".into(),
            ..OutputConfig::default()
        };
        let the_resolver = IndexResolver::from_config(&the_config)?;
        let the_flush = the_resolver.for_flush(&Utc::now())?;
        assert_eq!(the_flush.resolve("t", &Map::new(), &jan_second())?, "app-2024.01.02");
        Ok(())
    }

    #[test]
    fn the_one_where_the_record_picks_its_own_prefix() -> Result<()> {
        let the_config = OutputConfig {
            logstash_format: true,
            logstash_prefix_key: Some("$kubernetes['namespace']".into()),
            ..OutputConfig::default()
        };
        let the_resolver = IndexResolver::from_config(&the_config)?;
        let the_flush = the_resolver.for_flush(&Utc::now())?;

        let the_tenant = fields(vec![(
            "kubernetes",
            Value::Map(fields(vec![("namespace", Value::from("payments"))])),
        )]);
        assert_eq!(the_flush.resolve("t", &the_tenant, &jan_second())?, "payments-2024.01.02");

        // 🔙 no such field: back to the static prefix
        assert_eq!(
            the_flush.resolve("t", &Map::new(), &jan_second())?,
            "logstash-2024.01.02"
        );
        Ok(())
    }

    #[test]
    fn the_one_where_a_novel_length_prefix_gets_trimmed() -> Result<()> {
        let the_config = OutputConfig {
            logstash_format: true,
            logstash_prefix_key: Some("ns".into()),
            logstash_dateformat: "%Y".into(),
            ..OutputConfig::default()
        };
        let the_resolver = IndexResolver::from_config(&the_config)?;
        let the_flush = the_resolver.for_flush(&Utc::now())?;
        let the_record = fields(vec![("ns", Value::from("é".repeat(100)))]);
        let the_name = the_flush.resolve("t", &the_record, &jan_second())?;
        let (the_prefix, the_year) = the_name.rsplit_once('-').expect("has a dash");
        assert_eq!(the_prefix.len(), MAX_PREFIX_BYTES);
        assert_eq!(the_year, "2024");
        Ok(())
    }

    #[test]
    fn the_one_where_static_mode_ignores_the_record_time() -> Result<()> {
        let the_config = OutputConfig {
            index: "logs-%Y".into(),
            ..OutputConfig::default()
        };
        let the_resolver = IndexResolver::from_config(&the_config)?;
        let the_flush = the_resolver.for_flush(&jan_second())?;
        let the_epoch = DateTime::from_timestamp(0, 0).unwrap();
        assert_eq!(the_flush.resolve("t", &Map::new(), &the_epoch)?, "logs-2024");
        Ok(())
    }

    #[test]
    fn the_one_where_current_time_mode_renders_what_it_is_given() -> Result<()> {
        let the_config = OutputConfig {
            index: "logs-%Y.%m.%d".into(),
            current_time_index: true,
            ..OutputConfig::default()
        };
        let the_resolver = IndexResolver::from_config(&the_config)?;
        let the_flush = the_resolver.for_flush(&Utc::now())?;
        assert_eq!(the_flush.resolve("t", &Map::new(), &jan_second())?, "logs-2024.01.02");
        Ok(())
    }

    #[test]
    fn the_one_where_type_can_be_suppressed() -> Result<()> {
        let the_default = IndexResolver::from_config(&OutputConfig::default())?;
        assert_eq!(the_default.doc_type(), Some("_doc"));

        let the_modern = IndexResolver::from_config(&OutputConfig {
            suppress_type_name: true,
            ..OutputConfig::default()
        })?;
        assert_eq!(the_modern.doc_type(), None);
        Ok(())
    }

    #[test]
    fn the_one_where_a_broken_date_pattern_fails_at_startup() {
        let the_config = OutputConfig {
            logstash_format: true,
            logstash_dateformat: "%Y.%J".into(),
            ..OutputConfig::default()
        };
        assert!(matches!(
            IndexResolver::from_config(&the_config),
            Err(ConfigError::InvalidTimePattern { option: "logstash_dateformat", .. })
        ));
    }
}
