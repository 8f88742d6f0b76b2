#![deny(missing_docs)]
//! # unigen — umbrella crate
//!
//! Provides a single import surface for the unigen workspace: the core
//! types, the adapters, the tool-call loop, and the capability scoreboard,
//! plus a `prelude` for the happy path.

pub use unigen_adapters;
pub use unigen_loop;
pub use unigen_scoreboard;
pub use unigen_types;

/// Common imports for the happy path.
pub mod prelude {
    pub use unigen_adapters::{DocToGen, ThinkingAdapter, UsageAdapter};
    pub use unigen_loop::{ToolLoopError, run_stream, run_sync};
    pub use unigen_scoreboard::{ProviderScoreboard, Scoreboard, TriState};
    pub use unigen_types::{
        GenError, GenOptions, GenResult, Message, OptionsText, Provider, ProviderGen,
        ProviderGenDoc, ReplyFragment, Role, ToolCallRequest, ToolContext, ToolDef, Usage,
    };
}
