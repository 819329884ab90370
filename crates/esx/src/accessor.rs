//! 🔍 Record accessor: "go find me `kubernetes.labels.app`, I'll wait".
//!
//! A tiny path language for pointing at a field inside a record:
//!
//! ```text
//! $service                      top-level key
//! $kubernetes.labels.app        dotted walk through nested maps
//! $kubernetes['labels']['app']  bracket walk, quotes may be ' or "
//! $['key.with.dots']            bracket form when the key itself has dots
//! $items[0].name                integer brackets index into arrays
//! ```
//!
//! The leading `$` is optional, and the bare `$TAG` resolves to the batch's tag instead of a
//! field. Used by the index resolver for `logstash_prefix_key`.
//! Parsed once at configuration time; evaluated once per record.

use crate::error::ConfigError;
use crate::value::{Map, Value, find_entry};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// 🔍 A compiled field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordAccessor {
    segments: Vec<Segment>,
    is_tag: bool,
}

impl RecordAccessor {
    /// 🏗️ Compile a path expression.
    ///
    /// # Errors
    /// 💀 `InvalidAccessor` for empty paths, empty keys, unterminated brackets or quotes.
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let fail = |reason: &str| ConfigError::InvalidAccessor {
            pattern: pattern.to_owned(),
            reason: reason.to_owned(),
        };

        let body = pattern.trim();
        if body == "$TAG" {
            return Ok(Self {
                segments: Vec::new(),
                is_tag: true,
            });
        }
        let body = body.strip_prefix('$').unwrap_or(body);
        let chars: Vec<char> = body.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;
        let mut expect_key = true;

        while i < chars.len() {
            match chars[i] {
                '[' => {
                    let close = chars[i..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|p| p + i)
                        .ok_or_else(|| fail("unterminated '['"))?;
                    let inner: String = chars[i + 1..close].iter().collect();
                    segments.push(Self::bracket_segment(inner.trim()).ok_or_else(|| {
                        fail("bracket must hold a quoted key or an array index")
                    })?);
                    i = close + 1;
                    expect_key = false;
                }
                '.' if !expect_key => {
                    i += 1;
                    expect_key = true;
                }
                '.' | ']' => return Err(fail("empty key")),
                _ if !expect_key => return Err(fail("expected '.' or '[' after ']'")),
                _ => {
                    let end = chars[i..]
                        .iter()
                        .position(|c| matches!(c, '.' | '[' | ']'))
                        .map_or(chars.len(), |p| p + i);
                    segments.push(Segment::Key(chars[i..end].iter().collect()));
                    i = end;
                    expect_key = false;
                }
            }
        }

        if segments.is_empty() {
            return Err(fail("path is empty"));
        }
        if expect_key {
            return Err(fail("path ends with '.'"));
        }
        // 🌳 records are maps, so the very first hop has to be a key
        if !matches!(segments.first(), Some(Segment::Key(_))) {
            return Err(fail("path must start with a key"));
        }

        Ok(Self {
            segments,
            is_tag: false,
        })
    }

    fn bracket_segment(inner: &str) -> Option<Segment> {
        for quote in ['\'', '"'] {
            if let Some(key) = inner
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
            {
                return (!key.is_empty()).then(|| Segment::Key(key.to_owned()));
            }
        }
        inner.parse().ok().map(Segment::Index)
    }

    /// 🔎 Walk the path. `None` the moment anything is missing or the wrong shape.
    pub fn lookup<'a>(&self, fields: &'a Map) -> Option<&'a Value> {
        let mut segments = self.segments.iter();
        let Some(Segment::Key(first)) = segments.next() else {
            return None;
        };
        let mut current = find_entry(fields, first)?;
        for segment in segments {
            current = match (segment, current) {
                (Segment::Key(key), Value::Map(map)) => find_entry(map, key)?,
                (Segment::Index(idx), Value::Array(items)) => items.get(*idx)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// 🖨️ Look up and render as a string. Containers and nil count as "not found".
    pub fn translate(&self, tag: &str, fields: &Map) -> Option<String> {
        if self.is_tag {
            return Some(tag.to_owned());
        }
        self.lookup(fields).and_then(Value::render_scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn the_record() -> Map {
        let value: Value = serde_json::from_str(
            r#"{
                "service": "checkout",
                "key.with.dots": "dotty",
                "kubernetes": {"labels": {"app": "cart"}, "replicas": 3},
                "items": [{"name": "first"}, {"name": "second"}],
                "flag": true,
                "nothing": null
            }"#,
        )
        .expect("fixture is valid JSON");
        match value {
            Value::Map(m) => m,
            _ => unreachable!("fixture is a map"),
        }
    }

    #[test]
    fn the_one_where_every_path_flavor_finds_its_target() -> Result<()> {
        let the_fields = the_record();
        let the_cases = [
            ("$service", Some("checkout")),
            ("service", Some("checkout")),
            ("$kubernetes.labels.app", Some("cart")),
            ("$kubernetes['labels']['app']", Some("cart")),
            ("$kubernetes[\"labels\"].app", Some("cart")),
            ("$['key.with.dots']", Some("dotty")),
            ("$items[1].name", Some("second")),
            ("$kubernetes.replicas", Some("3")),
            ("$flag", Some("true")),
            ("$nothing", None),
            ("$kubernetes.labels", None),
            ("$missing", None),
            ("$items[9].name", None),
            ("$service.deeper", None),
        ];
        for (the_pattern, the_expected) in the_cases {
            let the_accessor = RecordAccessor::parse(the_pattern)?;
            assert_eq!(
                the_accessor.translate("app.logs", &the_fields).as_deref(),
                the_expected,
                "pattern {the_pattern}"
            );
        }
        Ok(())
    }

    #[test]
    fn the_one_where_tag_is_not_a_field_but_answers_anyway() -> Result<()> {
        let the_accessor = RecordAccessor::parse("$TAG")?;
        assert_eq!(
            the_accessor.translate("app.logs", &the_record()).as_deref(),
            Some("app.logs")
        );
        assert!(the_accessor.lookup(&the_record()).is_none());
        Ok(())
    }

    #[test]
    fn the_one_where_broken_paths_are_rejected_at_config_time() {
        let the_broken = [
            "", "$", "$a..b", "$a.", "$a['b'", "$a[]", "$a['']", "$[0]", "$.a", "$a['b']c",
            "$a[0]b",
        ];
        for the_pattern in the_broken {
            assert!(
                RecordAccessor::parse(the_pattern).is_err(),
                "pattern {the_pattern:?} should not parse"
            );
        }
    }
}
