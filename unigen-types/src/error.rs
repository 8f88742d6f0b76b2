//! Error types for the unigen core.

use std::time::Duration;

use crate::message::Role;
use crate::usage::GenResult;

/// An input violated a stated invariant; the operation was not attempted.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Two fields that may not coexist are both set.
    #[error("{container}: {first} and {second} are mutually exclusive")]
    Exclusive {
        /// The entity being validated.
        container: &'static str,
        /// The first offending field.
        first: &'static str,
        /// The second offending field.
        second: &'static str,
    },

    /// A required field is absent.
    #[error("{container}: missing {field}")]
    Missing {
        /// The entity being validated.
        container: &'static str,
        /// The absent field.
        field: &'static str,
    },

    /// The entity carries no content at all.
    #[error("{0} is empty")]
    Empty(&'static str),

    /// A numeric field is outside its permitted range.
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        /// The offending field.
        field: &'static str,
        /// The supplied value.
        value: f64,
        /// Lower bound, inclusive.
        min: f64,
        /// Upper bound, inclusive.
        max: f64,
    },

    /// Two consecutive messages share a role.
    #[error("messages[{index}]: consecutive messages share role {role:?}")]
    RoleAlternation {
        /// Index of the second offending message.
        index: usize,
        /// The repeated role.
        role: Role,
    },

    /// Two tools share a name.
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),

    /// Catch-all for other invariant violations.
    #[error("{container}: {reason}")]
    Invalid {
        /// The entity being validated.
        container: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Several invariants were violated at once.
    #[error("{}", format_multiple(.0))]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Collapse a list of failures into zero, one, or a `Multiple` error.
    ///
    /// # Errors
    ///
    /// Returns the single error, or `Multiple` when more than one was
    /// collected.
    pub fn join(mut errs: Vec<ValidationError>) -> Result<(), ValidationError> {
        match errs.len() {
            0 => Ok(()),
            1 => Err(errs.remove(0)),
            _ => Err(ValidationError::Multiple(errs)),
        }
    }
}

fn format_multiple(errs: &[ValidationError]) -> String {
    errs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from tool registration and execution.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// No registered tool answers to the requested name.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The call's arguments did not decode into the tool's input type.
    #[error("tool {tool}: invalid arguments: {source}")]
    InvalidArguments {
        /// The tool that rejected the arguments.
        tool: String,
        /// The decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// The tool callback failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Execution was cancelled via the caller's token.
    #[error("cancelled")]
    Cancelled,

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A provider ignored recognized options but completed the request.
///
/// Callers may inspect `unsupported`, take the completed [`GenResult`],
/// and proceed.
#[derive(Debug)]
pub struct ContinuableError {
    /// Names of the options fields that were ignored.
    pub unsupported: Vec<String>,
    /// The completed result of the degraded operation.
    pub result: Box<GenResult>,
}

/// Errors from generation operations.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    /// An input violated an invariant; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Options were ignored but the operation completed; see
    /// [`ContinuableError`].
    #[error("unsupported options: {}", .0.unsupported.join(", "))]
    Unsupported(ContinuableError),

    /// HTTP or network request failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The provider rate-limited the request.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested retry delay, if the API provided one.
        retry_after: Option<Duration>,
    },

    /// Authentication/authorization failed.
    #[error("auth failed: {0}")]
    AuthFailed(String),

    /// The provider's response could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A streaming-protocol violation: malformed fragments, unexpected
    /// roles, or an invariant broken during accumulation.
    #[error("stream error: {0}")]
    Stream(String),

    /// A tool callback failed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Required configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl GenError {
    /// Whether the request completed despite the error.
    #[must_use]
    pub fn is_continuable(&self) -> bool {
        matches!(self, GenError::Unsupported(_))
    }

    /// Whether retrying the request might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenError::RateLimited { .. } | GenError::RequestFailed(_))
    }
}

/// Split the continuable case out of a generation outcome.
///
/// Returns the result paired with the names of any ignored options, so
/// callers that want to proceed on degraded-but-successful operations can
/// treat both cases uniformly.
///
/// # Errors
///
/// Propagates every non-continuable error unchanged.
pub fn split_continuable(
    res: Result<GenResult, GenError>,
) -> Result<(GenResult, Vec<String>), GenError> {
    match res {
        Ok(r) => Ok((r, Vec::new())),
        Err(GenError::Unsupported(c)) => Ok((*c.result, c.unsupported)),
        Err(e) => Err(e),
    }
}
