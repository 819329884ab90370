//! 📋 The action line: the cover letter stapled to every document.
//!
//! ```text
//! {"index":{"_index":"logs-2024.01.02","_type":"_doc","_id":"…"}}
//! ```
//!
//! Key order is fixed: `_index`, then `_type`, then `_id`. Absent keys are omitted, never
//! written as `null`. Four shapes in total, depending on whether a type and an id are present.

use serde::Serialize;

#[derive(Debug, Serialize)]
struct IndexMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    doc_type: Option<&'a str>,
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
}

/// 📋 `{"index":{...}}` for one document.
#[derive(Debug, Serialize)]
pub struct ActionLine<'a> {
    index: IndexMeta<'a>,
}

impl<'a> ActionLine<'a> {
    pub fn new(index: &'a str, doc_type: Option<&'a str>, id: Option<&'a str>) -> Self {
        Self {
            index: IndexMeta {
                index,
                doc_type,
                id,
            },
        }
    }

    /// 🖨️ Serialize onto the end of `out`, compact, no trailing newline.
    pub fn write_into(&self, out: &mut Vec<u8>) -> Result<(), serde_json::Error> {
        serde_json::to_writer(out, self)
    }
}
