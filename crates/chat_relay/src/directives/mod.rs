//! Directive blocks embedded in streamed assistant text
//!
//! The model requests work from the server by writing blocks like
//! `<tool_call><tool_name>x</tool_name><parameters><k>v</k></parameters></tool_call>`
//! into its response. This module finds those blocks, keeps them out of the
//! text shown to the user and remembers which ones were already dispatched.

mod extractor;
mod markup;
mod registry;
mod scanner;

pub use extractor::{clean_text, extract_directives};
pub use registry::DispatchRecord;
pub use scanner::{final_release, safe_prefix};

use indexmap::IndexMap;
use serde::Serialize;

pub const OPEN_TAG: &str = "<tool_call>";
pub const CLOSE_TAG: &str = "</tool_call>";

/// A parsed request to run a named handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directive {
    pub name: String,
    /// Parameters in document order
    pub parameters: IndexMap<String, String>,
}

impl Directive {
    pub fn new(name: impl Into<String>, parameters: IndexMap<String, String>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

/// Byte range of one complete directive block inside a text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockSpan {
    /// Offset of the open tag
    pub start: usize,
    /// Offset just past the close tag
    pub end: usize,
    pub body_start: usize,
    pub body_end: usize,
}

/// Iterates complete blocks from left to right. The first open tag pairs with
/// the first close tag after it.
pub(crate) struct BlockSpans<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> BlockSpans<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }
}

impl Iterator for BlockSpans<'_> {
    type Item = BlockSpan;

    fn next(&mut self) -> Option<BlockSpan> {
        let start = self.pos + self.text.get(self.pos..)?.find(OPEN_TAG)?;
        let body_start = start + OPEN_TAG.len();
        let body_end = body_start + self.text[body_start..].find(CLOSE_TAG)?;
        let end = body_end + CLOSE_TAG.len();
        self.pos = end;
        Some(BlockSpan {
            start,
            end,
            body_start,
            body_end,
        })
    }
}
