//! 🚀 esx: the formatting core of an Elasticsearch bulk output.
//!
//! 🎬 *[narrator voice]* "Records went in. NDJSON came out. Nobody could explain the `_type`."
//!
//! 📦 What this crate does, start to finish:
//!
//! ```text
//! encoded batch ──▶ Batch::decode ──▶ Sanitizer ─┐
//!                                    IndexResolver ─┼─▶ BulkComposer ──▶ BulkBuffer ──▶ (your sender)
//!                                      IdGenerator ─┘                                        │
//!                            FlushVerdict ◀── check_response ◀── status + payload ◀──────────┘
//! ```
//!
//! 🧠 Knowledge graph:
//! - [`BulkFormatter`] is the entry point. Build it once from an [`OutputConfig`], share it.
//! - Nothing in here does I/O. The HTTP part lives in `esx-cli`.
//! - Errors are per batch ([`FormatError`]) or per configuration ([`ConfigError`]).
//!
//! 🦆 The duck is here for moral support.

pub mod accessor;
pub mod app_config;
pub mod common;
pub mod composers;
pub mod error;
pub mod formatter;
pub mod id;
pub mod index;
pub mod response;
pub mod sanitize;
pub mod value;

pub use app_config::{AppConfig, EndpointConfig, OutputConfig};
pub use common::{Batch, Record, Timestamp};
pub use composers::BulkBuffer;
pub use error::{ConfigError, FormatError};
pub use formatter::BulkFormatter;
pub use response::{FlushVerdict, has_item_errors};
pub use value::{Map, Value};
