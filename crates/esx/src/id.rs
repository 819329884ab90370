//! 🪪 Document ids: whether Elasticsearch gets to name the baby or we do.
//!
//! - **none**: no `_id`. Elasticsearch picks one. A retried batch becomes a duplicated batch.
//! - **hash**: XXH3-128 (seed 42) over the serialized document line, shaped like a UUID.
//!   Same bytes in, same id out, so retries overwrite instead of duplicating.
//! - **template**: `$[field]` placeholders filled from top-level string fields, matched
//!   case-insensitively. Only the first level is consulted. Missing fields become `""`,
//!   which is a documented limitation and not something to quietly "fix".

use tracing::debug;
use twox_hash::XxHash3_128;

use crate::app_config::OutputConfig;
use crate::error::{ConfigError, FormatError};
use crate::value::Map;

/// 🌱 Fixed seed so every process agrees on every id.
pub const HASH_SEED: u64 = 42;

const PLACEHOLDER_OPEN: &str = "$[";
const PLACEHOLDER_CLOSE: char = ']';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Field(String),
}

/// 🧩 An `id_format` template, tokenized once at configuration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTemplate {
    tokens: Vec<Token>,
}

impl IdTemplate {
    /// 🏗️ Split a template into literal runs and `$[field]` placeholders.
    ///
    /// An opening `$[` without a closing `]` is kept as literal text.
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let mut tokens = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find(PLACEHOLDER_OPEN) {
            let after_open = &rest[open + PLACEHOLDER_OPEN.len()..];
            let Some(close) = after_open.find(PLACEHOLDER_CLOSE) else {
                break;
            };
            if open > 0 {
                tokens.push(Token::Literal(rest[..open].to_owned()));
            }
            let field = &after_open[..close];
            if field.is_empty() {
                return Err(ConfigError::EmptyIdPlaceholder(template.to_owned()));
            }
            tokens.push(Token::Field(field.to_owned()));
            rest = &after_open[close + 1..];
        }
        if !rest.is_empty() {
            tokens.push(Token::Literal(rest.to_owned()));
        }

        Ok(Self { tokens })
    }

    /// 🔄 Fill the placeholders from one record's top-level fields.
    pub fn render(&self, fields: &Map) -> Result<String, FormatError> {
        let mut id = String::new();
        for token in &self.tokens {
            let piece = match token {
                Token::Literal(text) => text.as_str(),
                Token::Field(name) => first_level_string(fields, name).unwrap_or_else(|| {
                    debug!("🪪 id_format field '{name}' not found at the top level, using \"\"");
                    ""
                }),
            };
            id.try_reserve(piece.len())
                .map_err(|_| FormatError::ResourceExhausted("building a document id"))?;
            id.push_str(piece);
        }
        Ok(id)
    }
}

/// 🔎 First top-level string field whose name matches, ignoring ASCII case. Nested maps are
/// never opened.
fn first_level_string<'a>(fields: &'a Map, name: &str) -> Option<&'a str> {
    fields
        .iter()
        .filter(|(k, _)| k.as_str().is_some_and(|key| key.eq_ignore_ascii_case(name)))
        .find_map(|(_, v)| v.as_str())
}

/// #️⃣ Hash a serialized document into a UUID-shaped id.
pub fn hash_id(document: &[u8]) -> String {
    let h = XxHash3_128::oneshot_with_seed(HASH_SEED, document);
    format!(
        "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
        (h >> 96) as u32,
        (h >> 80) as u16,
        (h >> 64) as u16,
        (h >> 48) as u16,
        (h as u64) & 0xffff_ffff_ffff
    )
}

/// 🪪 Which id strategy this output uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdGenerator {
    #[default]
    None,
    Hash,
    Template(IdTemplate),
}

impl IdGenerator {
    /// 🏗️ `generate_id` wins over `id_format`; neither means no id at all.
    pub fn from_config(config: &OutputConfig) -> Result<Self, ConfigError> {
        if config.generate_id {
            return Ok(IdGenerator::Hash);
        }
        match config.id_format.as_deref() {
            Some(template) => {
                debug!("🪪 using id_format template '{template}'");
                Ok(IdGenerator::Template(IdTemplate::parse(template)?))
            }
            None => Ok(IdGenerator::None),
        }
    }

    /// 🎯 The `_id` for one document, if this strategy produces one.
    ///
    /// `document` is the finished document line, `fields` the record's original top level.
    pub fn generate(&self, document: &[u8], fields: &Map) -> Result<Option<String>, FormatError> {
        match self {
            IdGenerator::None => Ok(None),
            IdGenerator::Hash => Ok(Some(hash_id(document))),
            IdGenerator::Template(template) => template.render(fields).map(Some),
        }
    }
}
