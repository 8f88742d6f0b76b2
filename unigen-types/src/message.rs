//! Conversation messages and their content blocks.
//!
//! A [`Message`] holds exactly one of three content groups: user requests,
//! assistant output (replies and/or tool calls), or tool-call results. The
//! role is derived from which group is populated rather than stored.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Opaque provider continuity payload, copied through without interpretation.
pub type Opaque = serde_json::Map<String, serde_json::Value>;

/// The role of a message author, derived from the populated content group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A human (or calling application) turn.
    User,
    /// A model turn.
    Assistant,
    /// A tool-result turn produced by locally executed code.
    Computer,
}

/// A single conversation message.
///
/// Exactly one of the three content groups may be populated:
/// `requests` (user), `replies` and/or `tool_calls` (assistant), or
/// `tool_call_results` (computer). [`Message::validate`] enforces this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// User request blocks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requests: Vec<Request>,
    /// Assistant reply blocks, in generation order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Reply>,
    /// Tool invocations requested by the assistant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Results of locally executed tool calls.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_call_results: Vec<ToolCallResult>,
    /// Optional label identifying the user in multi-user conversations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Message {
    /// Create a user message with a single text request block.
    ///
    /// # Example
    ///
    /// ```
    /// use unigen_types::{Message, Role};
    /// let msg = Message::user("What is 5+3?");
    /// assert_eq!(msg.role(), Role::User);
    /// assert!(msg.validate().is_ok());
    /// ```
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            requests: vec![Request {
                text: text.into(),
                ..Request::default()
            }],
            ..Self::default()
        }
    }

    /// Create an assistant message with a single text reply block.
    ///
    /// # Example
    ///
    /// ```
    /// use unigen_types::{Message, Role};
    /// let msg = Message::assistant("8");
    /// assert_eq!(msg.role(), Role::Assistant);
    /// ```
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            replies: vec![Reply {
                text: text.into(),
                ..Reply::default()
            }],
            ..Self::default()
        }
    }

    /// The role derived from which content group is populated.
    #[must_use]
    pub fn role(&self) -> Role {
        if !self.tool_call_results.is_empty() {
            Role::Computer
        } else if !self.replies.is_empty() || !self.tool_calls.is_empty() {
            Role::Assistant
        } else {
            Role::User
        }
    }

    /// Concatenated text of all text-bearing blocks in this message.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        for r in &self.requests {
            out.push_str(&r.text);
        }
        for r in &self.replies {
            out.push_str(&r.text);
        }
        out
    }

    /// Concatenated thinking content of all reply blocks.
    #[must_use]
    pub fn thinking(&self) -> String {
        self.replies.iter().map(|r| r.thinking.as_str()).collect()
    }

    /// Whether the message carries no content at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
            && self.replies.is_empty()
            && self.tool_calls.is_empty()
            && self.tool_call_results.is_empty()
    }

    /// Check the exactly-one-group rule and validate every inner block.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] (possibly `Multiple`) describing every
    /// violated invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errs = Vec::new();

        let has_request = !self.requests.is_empty();
        let has_reply = !self.replies.is_empty() || !self.tool_calls.is_empty();
        let has_result = !self.tool_call_results.is_empty();
        match (has_request, has_reply, has_result) {
            (false, false, false) => errs.push(ValidationError::Empty("message")),
            (true, true, _) | (true, _, true) => errs.push(ValidationError::Exclusive {
                container: "message",
                first: "requests",
                second: "replies/tool_calls/tool_call_results",
            }),
            (_, true, true) => errs.push(ValidationError::Exclusive {
                container: "message",
                first: "replies/tool_calls",
                second: "tool_call_results",
            }),
            _ => {}
        }

        if !self.tool_calls.is_empty() && self.replies.iter().any(|r| r.doc.is_some()) {
            errs.push(ValidationError::Exclusive {
                container: "message",
                first: "replies.doc",
                second: "tool_calls",
            });
        }

        if self.user.is_some() && self.role() != Role::User {
            errs.push(ValidationError::Invalid {
                container: "message",
                reason: "user label is only valid on user messages".into(),
            });
        }

        for r in &self.requests {
            if let Err(e) = r.validate() {
                errs.push(e);
            }
        }
        for r in &self.replies {
            if let Err(e) = r.validate() {
                errs.push(e);
            }
        }
        for c in &self.tool_calls {
            if let Err(e) = c.validate() {
                errs.push(e);
            }
        }
        for r in &self.tool_call_results {
            if let Err(e) = r.validate() {
                errs.push(e);
            }
        }

        ValidationError::join(errs)
    }
}

/// One block of user input: text or a document, never both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Plain text input.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// An attached document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Doc>,
}

impl Request {
    /// Validate the text-XOR-doc rule.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when both or neither field is set.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.text.is_empty(), &self.doc) {
            (false, Some(_)) => Err(ValidationError::Exclusive {
                container: "request",
                first: "text",
                second: "doc",
            }),
            (true, None) => Err(ValidationError::Empty("request")),
            (true, Some(d)) => d.validate(),
            (false, None) => Ok(()),
        }
    }
}

/// One semantic unit of assistant output.
///
/// Legal shapes: text (optionally with citations), a document, thinking
/// (optionally with an opaque continuity payload), a bare opaque payload,
/// or a lone citation. [`Reply::validate`] rejects the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// User-visible answer text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Chain-of-thought content separated from the answer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thinking: String,
    /// Provider continuity tokens, round-tripped verbatim.
    #[serde(default, skip_serializing_if = "Opaque::is_empty")]
    pub opaque: Opaque,
    /// A generated document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Doc>,
    /// Citations attached to the text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
}

impl Reply {
    /// Whether this block is a text block.
    #[must_use]
    pub fn is_text(&self) -> bool {
        !self.text.is_empty()
    }

    /// Whether this block carries thinking content.
    ///
    /// A block holding only an opaque payload counts: providers interleave
    /// continuity tokens with thinking and the two merge during
    /// accumulation.
    #[must_use]
    pub fn is_thinking(&self) -> bool {
        self.text.is_empty()
            && self.doc.is_none()
            && self.citations.is_empty()
            && (!self.thinking.is_empty() || !self.opaque.is_empty())
    }

    /// Validate the field-exclusivity rules.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when mutually exclusive fields are
    /// combined or the block is fully empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errs = Vec::new();

        if !self.text.is_empty() {
            if !self.thinking.is_empty() {
                errs.push(ValidationError::Exclusive {
                    container: "reply",
                    first: "text",
                    second: "thinking",
                });
            }
            if !self.opaque.is_empty() {
                errs.push(ValidationError::Exclusive {
                    container: "reply",
                    first: "text",
                    second: "opaque",
                });
            }
            if self.doc.is_some() {
                errs.push(ValidationError::Exclusive {
                    container: "reply",
                    first: "text",
                    second: "doc",
                });
            }
        }
        if self.doc.is_some() && !self.thinking.is_empty() {
            errs.push(ValidationError::Exclusive {
                container: "reply",
                first: "doc",
                second: "thinking",
            });
        }
        if !self.citations.is_empty() && (self.doc.is_some() || !self.thinking.is_empty()) {
            errs.push(ValidationError::Exclusive {
                container: "reply",
                first: "citations",
                second: "doc/thinking",
            });
        }
        if self.text.is_empty()
            && self.thinking.is_empty()
            && self.opaque.is_empty()
            && self.doc.is_none()
            && self.citations.is_empty()
        {
            errs.push(ValidationError::Empty("reply"));
        }
        if let Some(d) = &self.doc {
            if let Err(e) = d.validate() {
                errs.push(e);
            }
        }
        for c in &self.citations {
            if let Err(e) = c.validate() {
                errs.push(e);
            }
        }

        ValidationError::join(errs)
    }
}

/// A document carried inline or by reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Doc {
    /// File name; the media type is derived from its extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Inline document bytes. Mutually exclusive with `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<Vec<u8>>,
    /// Document location by reference. Mutually exclusive with `bytes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Doc {
    /// The media type derived from the filename or URL extension.
    #[must_use]
    pub fn mime_type(&self) -> Option<String> {
        let name = self.filename.as_deref().or(self.url.as_deref())?;
        mime_guess::from_path(name).first().map(|m| m.to_string())
    }

    /// Validate source exclusivity and filename presence.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when both `bytes` and `url` are set,
    /// or when an inline document has no filename to identify it.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.bytes.is_some() && self.url.is_some() {
            return Err(ValidationError::Exclusive {
                container: "doc",
                first: "bytes",
                second: "url",
            });
        }
        if self.url.is_none() && self.filename.is_none() {
            return Err(ValidationError::Missing {
                container: "doc",
                field: "filename",
            });
        }
        Ok(())
    }
}

/// A model-originated request to execute local code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Name of the tool to invoke.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// JSON-encoded arguments.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arguments: String,
    /// Provider continuity tokens, round-tripped verbatim.
    #[serde(default, skip_serializing_if = "Opaque::is_empty")]
    pub opaque: Opaque,
}

impl ToolCall {
    /// Validate identification and argument encoding.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when neither `id` nor `name` is set
    /// or when non-empty `arguments` are not valid JSON.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() && self.name.is_empty() {
            return Err(ValidationError::Missing {
                container: "tool_call",
                field: "id or name",
            });
        }
        if !self.arguments.is_empty() {
            if let Err(e) = serde_json::from_str::<serde_json::Value>(&self.arguments) {
                return Err(ValidationError::Invalid {
                    container: "tool_call",
                    reason: format!("arguments are not valid JSON: {e}"),
                });
            }
        }
        Ok(())
    }
}

/// The outcome of one locally executed tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The call identifier this result answers.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// The tool name this result answers.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// The tool's string output, fed back to the model.
    pub result: String,
}

impl ToolCallResult {
    /// Validate identification and result presence.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when neither `id` nor `name` is set
    /// or the result is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() && self.name.is_empty() {
            return Err(ValidationError::Missing {
                container: "tool_call_result",
                field: "id or name",
            });
        }
        if self.result.is_empty() {
            return Err(ValidationError::Empty("tool_call_result.result"));
        }
        Ok(())
    }
}

/// A span of answer text attributed to one or more sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// The cited span of text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Byte offset where the span starts.
    #[serde(default)]
    pub start_index: usize,
    /// Byte offset one past the end of the span.
    #[serde(default)]
    pub end_index: usize,
    /// The sources backing the span.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<CitationSource>,
    /// Provider-specific structural location of the span.
    #[serde(default, skip_serializing_if = "Opaque::is_empty")]
    pub location: Opaque,
    /// Provider-specific citation type.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl Citation {
    /// Validate index ordering.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when both indices are non-zero and
    /// `end_index <= start_index`, or an inner source is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start_index != 0 && self.end_index != 0 && self.end_index <= self.start_index {
            return Err(ValidationError::Invalid {
                container: "citation",
                reason: format!(
                    "end_index {} must be greater than start_index {}",
                    self.end_index, self.start_index
                ),
            });
        }
        let errs: Vec<_> = self
            .sources
            .iter()
            .filter_map(|s| s.validate().err())
            .collect();
        ValidationError::join(errs)
    }
}

/// One source backing a citation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationSource {
    /// Provider-assigned source identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Provider-specific source type.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Human-readable title.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Source location.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    /// Provider-specific metadata, round-tripped verbatim.
    #[serde(default, skip_serializing_if = "Opaque::is_empty")]
    pub metadata: Opaque,
}

impl CitationSource {
    /// Validate identification.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when neither `id` nor `url` is set.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() && self.url.is_empty() {
            return Err(ValidationError::Missing {
                container: "citation_source",
                field: "id or url",
            });
        }
        Ok(())
    }
}

/// Validate a conversation: every message validates and roles alternate.
///
/// # Errors
///
/// Returns a [`ValidationError`] (possibly `Multiple`) naming the index of
/// every offending message.
pub fn validate_messages(messages: &[Message]) -> Result<(), ValidationError> {
    let mut errs = Vec::new();
    for (i, m) in messages.iter().enumerate() {
        if let Err(e) = m.validate() {
            errs.push(ValidationError::Invalid {
                container: "messages",
                reason: format!("message {i}: {e}"),
            });
        }
        if i > 0 && m.role() == messages[i - 1].role() {
            errs.push(ValidationError::RoleAlternation {
                index: i,
                role: m.role(),
            });
        }
    }
    ValidationError::join(errs)
}
