//! Tool-loop errors, carrying partial output.

use unigen_types::{GenError, ToolError};

use crate::run::ToolLoopOutput;

/// What went wrong in a tool-call loop round.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ToolLoopErrorKind {
    /// The generator failed; propagated verbatim.
    #[error(transparent)]
    Gen(GenError),

    /// A tool callback failed, aborting the loop at that round.
    #[error(transparent)]
    Tool(ToolError),

    /// The options were not a text bag with at least one tool.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A tool-call round resolved no calls at all.
    #[error("tool round produced no results")]
    EmptyToolRound,

    /// The caller's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
}

/// A tool-loop failure plus whatever the loop had produced by then.
///
/// `partial.messages` holds every completed turn and `partial.usage` the
/// usage aggregated so far, so callers can account for work done before
/// the failure.
#[derive(Debug)]
pub struct ToolLoopError {
    /// The failure.
    pub kind: ToolLoopErrorKind,
    /// Output accumulated before the failure.
    pub partial: ToolLoopOutput,
}

impl ToolLoopError {
    pub(crate) fn new(kind: ToolLoopErrorKind, partial: ToolLoopOutput) -> Self {
        Self { kind, partial }
    }
}

impl std::fmt::Display for ToolLoopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for ToolLoopError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
