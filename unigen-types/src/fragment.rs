//! Streaming fragments: one incremental update to an assistant message.

use crate::message::{Citation, Opaque, ToolCall};

/// An incremental piece of thinking content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThinkingFragment {
    /// Thinking text to append.
    pub text: String,
    /// Continuity tokens to merge into the current thinking block.
    pub opaque: Opaque,
}

/// An incremental piece of a generated document.
///
/// Which fields are set determines the accumulation behavior: a `url`
/// opens a by-reference block, `bytes` extend (or open) an inline block,
/// and a bare `filename` opens an inline block awaiting bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocFragment {
    /// The document's file name.
    pub filename: Option<String>,
    /// Location of a by-reference document.
    pub url: Option<String>,
    /// Bytes to append to the document's inline buffer.
    pub bytes: Vec<u8>,
}

/// One event from a streaming generation response.
///
/// Each fragment carries exactly one channel of content; the variants make
/// mixed fragments unrepresentable.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyFragment {
    /// Incremental answer text.
    Text(String),
    /// Incremental thinking content and/or continuity tokens.
    Thinking(ThinkingFragment),
    /// Incremental document content.
    Doc(DocFragment),
    /// A complete tool call.
    ToolCall(ToolCall),
    /// A complete citation.
    Citation(Citation),
}

impl ReplyFragment {
    /// Whether the fragment carries no content (a keep-alive).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            ReplyFragment::Text(t) => t.is_empty(),
            ReplyFragment::Thinking(t) => t.text.is_empty() && t.opaque.is_empty(),
            ReplyFragment::Doc(d) => {
                d.filename.is_none() && d.url.is_none() && d.bytes.is_empty()
            }
            ReplyFragment::ToolCall(_) | ReplyFragment::Citation(_) => false,
        }
    }

    /// Shorthand for a text fragment.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        ReplyFragment::Text(s.into())
    }

    /// Shorthand for a thinking fragment with no opaque payload.
    #[must_use]
    pub fn thinking(s: impl Into<String>) -> Self {
        ReplyFragment::Thinking(ThinkingFragment {
            text: s.into(),
            opaque: Opaque::new(),
        })
    }
}
