//! 🌳 Value: the recursive shape every record field takes.
//!
//! Scalars, mappings, sequences. That's the whole family tree. Mappings are a `Vec` of pairs
//! instead of a `BTreeMap` because log producers care about key order (and sometimes send the
//! same key twice, bless them), and the bulk payload must echo whatever they sent.
//!
//! 🧠 Knowledge graph:
//! - Decoded from JSON by the hand-written `Deserialize` below (order + duplicates preserved).
//! - Rendered to JSON by the hand-written `Serialize` below (binary → lossy UTF-8 string,
//!   scalar keys → strings, container keys → `SerializationFailure`).
//! - Walked by [`crate::sanitize`], looked into by [`crate::accessor`] and [`crate::id`].

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};

/// 📦 An ordered mapping. Duplicates allowed, order sacred.
pub type Map = Vec<(Value, Value)>;

/// 🌳 One node of a record's value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    Map(Map),
    Array(Vec<Value>),
}

impl Value {
    /// 🔤 Borrow the bytes of a string or binary value. Everything else is `None`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s.as_bytes()),
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// 🏷️ A short name for diagnostics. "expected map, got float" reads better than a Debug dump.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::Unsigned(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::Map(_) => "map",
            Value::Array(_) => "array",
        }
    }

    /// 🖨️ Render a scalar the way it would appear inside an index name. Containers and nil
    /// have no sensible single-string form, so they come back as `None`.
    pub fn render_scalar(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Binary(b) => Some(String::from_utf8_lossy(b).into_owned()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Unsigned(u) => Some(u.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Nil | Value::Map(_) | Value::Array(_) => None,
        }
    }
}

/// 🔎 First entry whose key is exactly `key`. Duplicates after it are never looked at.
pub fn find_entry<'a>(map: &'a Map, key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_bytes() == Some(key.as_bytes()))
        .map(|(_, v)| v)
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

// ===== Serialize =====

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Unsigned(u) => serializer.serialize_u64(*u),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            // 📦 JSON has no bytes. A lossy string is what every log shipper does here.
            Value::Binary(b) => serializer.serialize_str(&String::from_utf8_lossy(b)),
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(&MapKey(k), v)?;
                }
                map.end()
            }
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// 🔑 JSON object keys must be strings. Scalars get stringified, containers get a hard no.
struct MapKey<'a>(&'a Value);

impl Serialize for MapKey<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::String(s) => serializer.serialize_str(s),
            Value::Binary(b) => serializer.serialize_str(&String::from_utf8_lossy(b)),
            Value::Nil => serializer.serialize_str("null"),
            Value::Map(_) | Value::Array(_) => Err(ser::Error::custom(format!(
                "map key must be a scalar, got {}",
                self.0.kind()
            ))),
            Value::Boolean(b) => serializer.serialize_str(if *b { "true" } else { "false" }),
            Value::Integer(i) => serializer.serialize_str(&i.to_string()),
            Value::Unsigned(u) => serializer.serialize_str(&u.to_string()),
            Value::Float(f) => serializer.serialize_str(&f.to_string()),
        }
    }
}

// ===== Deserialize =====

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Boolean(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        // 🔢 keep small unsigned numbers in the signed lane so equality stays boring
        Ok(i64::try_from(v).map_or(Value::Unsigned(v), Value::Integer))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Binary(v.to_vec()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<Value, Value>()? {
            entries.push((k, v));
        }
        Ok(Value::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn the_one_where_key_order_and_duplicates_survive_decoding() -> Result<()> {
        let the_value: Value = serde_json::from_str(r#"{"z":1,"a":2,"z":3}"#)?;
        let the_map = the_value.as_map().expect("should decode as a map");
        let the_keys: Vec<&str> = the_map.iter().filter_map(|(k, _)| k.as_str()).collect();
        assert_eq!(the_keys, vec!["z", "a", "z"]);
        assert_eq!(serde_json::to_string(&the_value)?, r#"{"z":1,"a":2,"z":3}"#);
        Ok(())
    }

    #[test]
    fn the_one_where_the_first_duplicate_key_wins() -> Result<()> {
        let the_value: Value = serde_json::from_str(r#"{"z":1,"a":2,"z":3}"#)?;
        let the_map = the_value.as_map().expect("should decode as a map");
        assert_eq!(find_entry(the_map, "z"), Some(&Value::Integer(1)));
        assert_eq!(find_entry(the_map, "Z"), None);
        Ok(())
    }

    #[test]
    fn the_one_where_binary_becomes_a_string_on_the_way_out() -> Result<()> {
        let the_value = Value::Map(vec![(
            Value::Binary(b"raw".to_vec()),
            Value::Binary(b"bytes".to_vec()),
        )]);
        assert_eq!(serde_json::to_string(&the_value)?, r#"{"raw":"bytes"}"#);
        Ok(())
    }

    #[test]
    fn the_one_where_a_map_tries_to_be_a_key_and_serde_says_no() {
        let the_value = Value::Map(vec![(Value::Array(vec![]), Value::Nil)]);
        assert!(serde_json::to_string(&the_value).is_err());
    }

    #[test]
    fn the_one_where_scalar_keys_get_stringified() -> Result<()> {
        let the_value = Value::Map(vec![
            (Value::Integer(7), Value::Boolean(true)),
            (Value::Boolean(false), Value::Nil),
        ]);
        assert_eq!(serde_json::to_string(&the_value)?, r#"{"7":true,"false":null}"#);
        Ok(())
    }
}
