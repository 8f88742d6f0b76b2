#![deny(missing_docs)]
//! Multi-round tool-call orchestration.
//!
//! [`run_sync`] and [`run_stream`] drive a generator until it produces an
//! assistant turn with no outstanding tool calls: each round sends the
//! conversation, executes any requested tools locally, appends the results
//! as a computer-role message, and goes again. Usage is aggregated across
//! rounds, and a `tool_call_request = required` option is deliberately
//! downgraded to `any` after the first round so the model may finish
//! naturally — a caller-visible mutation.

pub mod error;
pub mod run;

pub use error::{ToolLoopError, ToolLoopErrorKind};
pub use run::{ToolLoopOutput, run_stream, run_sync};
