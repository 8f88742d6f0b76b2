#![deny(missing_docs)]
//! Provider adapters that normalize features backends handle differently.
//!
//! - [`ThinkingAdapter`] reclassifies inline `<tag>…</tag>` reasoning text
//!   as first-class thinking content, for backends that interleave
//!   chain-of-thought with the answer.
//! - [`UsageAdapter`] tallies token usage across arbitrary concurrent
//!   calls.
//! - [`DocToGen`] presents a single-shot document generator as a streaming
//!   generator.
//!
//! Adapters compose by generics and expose the wrapped provider through
//! `inner()`/`into_inner()` so capability probes can see through them.

pub mod docgen;
pub mod thinking;
pub mod usage;

pub use docgen::DocToGen;
pub use thinking::ThinkingAdapter;
pub use usage::{AccumulatedUsage, UsageAdapter};
