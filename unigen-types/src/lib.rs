#![deny(missing_docs)]
//! Provider-neutral core for driving heterogeneous LLM backends.
//!
//! This crate holds the shared vocabulary every provider translates into:
//! messages and their content blocks, generation options, streaming
//! fragments and the rules for accumulating them, tool definitions with
//! typed callbacks, and the capability traits concrete providers
//! implement.
//!
//! Key pieces:
//! - [`Message`] / [`Request`] / [`Reply`] — the conversation model
//! - [`ReplyFragment`] and [`Message::accumulate`] — streaming assembly
//! - [`GenOptions`] / [`OptionsText`] — generation parameter bags
//! - [`ToolDef`] — a callable tool with a typed, schema-reflected callback
//! - [`ProviderGen`] and friends — the provider capability traits

pub mod accumulate;
pub mod error;
pub mod fragment;
pub mod message;
pub mod options;
pub mod provider;
pub mod tool;
pub mod usage;

pub use accumulate::AccumulateError;
pub use error::{ContinuableError, GenError, ToolError, ValidationError, split_continuable};
pub use fragment::{DocFragment, ReplyFragment, ThinkingFragment};
pub use message::{
    Citation, CitationSource, Doc, Message, Opaque, Reply, Request, Role, ToolCall,
    ToolCallResult, validate_messages,
};
pub use options::{
    GenOptions, Modality, OptionsAudio, OptionsImage, OptionsText, OptionsVideo, StructTemplate,
    ToolCallRequest,
};
pub use provider::{
    CacheEntry, CacheManager, Job, Model, ModelLister, Ping, Provider, ProviderGen,
    ProviderGenAsync, ProviderGenDoc,
};
pub use tool::{ToolContext, ToolDef};
pub use usage::{
    FinishReason, GenResult, Logprob, RateLimit, RateLimitKind, RateLimitPeriod, TopLogprob,
    Usage,
};
