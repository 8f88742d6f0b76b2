//! Fragment accumulation: building an assistant message from a stream.
//!
//! The rules are order-sensitive and modality-driven: a fragment merges
//! into the trailing reply block when the modalities match, and opens a
//! new block otherwise. Out-of-order modality mixing across fragments
//! (text, then a document, then more text) is legal and produces separate
//! blocks.

use crate::error::GenError;
use crate::fragment::{DocFragment, ReplyFragment, ThinkingFragment};
use crate::message::{Doc, Message, Opaque, Reply};

/// A fragment could not legally extend the message.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum AccumulateError {
    /// A tool-call fragment carried neither an id nor a name.
    #[error("tool call fragment carries neither id nor name")]
    UnidentifiedToolCall,

    /// Document bytes arrived with no open inline document block and no
    /// filename to open one with.
    #[error("document bytes arrived with no open document block and no filename")]
    DocBytesWithoutFilename,
}

impl From<AccumulateError> for GenError {
    fn from(e: AccumulateError) -> Self {
        GenError::Stream(e.to_string())
    }
}

/// Merge `src` into `dst`, later keys overwriting earlier ones.
fn merge_opaque(dst: &mut Opaque, src: Opaque) {
    for (k, v) in src {
        dst.insert(k, v);
    }
}

impl Message {
    /// Fold one streaming fragment into this (assistant) message.
    ///
    /// Block order follows fragment order; adjacent fragments of the same
    /// modality merge into one block. Empty fragments are keep-alives and
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns an [`AccumulateError`] when the fragment cannot legally
    /// extend the message.
    pub fn accumulate(&mut self, fragment: ReplyFragment) -> Result<(), AccumulateError> {
        if fragment.is_empty() {
            return Ok(());
        }
        match fragment {
            ReplyFragment::Thinking(t) => self.accumulate_thinking(t),
            ReplyFragment::Text(t) => {
                match self.replies.last_mut() {
                    Some(last) if last.is_text() => last.text.push_str(&t),
                    _ => self.replies.push(Reply {
                        text: t,
                        ..Reply::default()
                    }),
                }
                Ok(())
            }
            ReplyFragment::Doc(d) => self.accumulate_doc(d),
            ReplyFragment::ToolCall(tc) => {
                if tc.id.is_empty() && tc.name.is_empty() {
                    return Err(AccumulateError::UnidentifiedToolCall);
                }
                self.tool_calls.push(tc);
                Ok(())
            }
            ReplyFragment::Citation(c) => {
                self.replies.push(Reply {
                    citations: vec![c],
                    ..Reply::default()
                });
                Ok(())
            }
        }
    }

    fn accumulate_thinking(&mut self, t: ThinkingFragment) -> Result<(), AccumulateError> {
        if let Some(last) = self.replies.last_mut()
            && last.is_thinking()
        {
            last.thinking.push_str(&t.text);
            merge_opaque(&mut last.opaque, t.opaque);
            return Ok(());
        }
        // Covers both a thinking fragment and an opaque-only fragment with
        // no trailing thinking block: open a new block. The opaque-only
        // case yields a degenerate block carrying just the payload.
        self.replies.push(Reply {
            thinking: t.text,
            opaque: t.opaque,
            ..Reply::default()
        });
        Ok(())
    }

    fn accumulate_doc(&mut self, d: DocFragment) -> Result<(), AccumulateError> {
        if let Some(url) = d.url {
            // By-reference documents are terminal: later bytes open a new
            // block rather than extending this one.
            self.replies.push(Reply {
                doc: Some(Doc {
                    filename: d.filename,
                    url: Some(url),
                    bytes: None,
                }),
                ..Reply::default()
            });
            return Ok(());
        }
        if !d.bytes.is_empty() {
            if let Some(last) = self.replies.last_mut()
                && let Some(doc) = last.doc.as_mut()
                && doc.url.is_none()
                && (d.filename.is_none() || d.filename == doc.filename)
            {
                doc.bytes.get_or_insert_with(Vec::new).extend_from_slice(&d.bytes);
                return Ok(());
            }
            let Some(filename) = d.filename else {
                return Err(AccumulateError::DocBytesWithoutFilename);
            };
            self.replies.push(Reply {
                doc: Some(Doc {
                    filename: Some(filename),
                    bytes: Some(d.bytes),
                    url: None,
                }),
                ..Reply::default()
            });
            return Ok(());
        }
        // Filename only: open an inline block awaiting bytes.
        self.replies.push(Reply {
            doc: Some(Doc {
                filename: d.filename,
                bytes: None,
                url: None,
            }),
            ..Reply::default()
        });
        Ok(())
    }
}
