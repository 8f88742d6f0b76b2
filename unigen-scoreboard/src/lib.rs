#![deny(missing_docs)]
//! Declarative provider capability matrix.
//!
//! A [`Scoreboard`] describes, per provider×model family, which scenarios
//! the backend supports: input/output modalities, thinking mode, and a
//! per-operation [`Functionality`] block of tri-state flags. Smoke-test
//! harnesses run the declared scenarios and assert that observed behavior
//! matches the declaration.
//!
//! LLM behavior is not always deterministic, so flags are tri-state
//! ([`TriState`]) rather than boolean: a feature can be reliably present,
//! reliably absent, or flaky.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use unigen_types::Modality;

/// Observed support level for one capability.
///
/// A tagged enum, not an `Option<bool>`: `Flaky` is a positive
/// observation, not missing data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriState {
    /// The capability is absent.
    #[default]
    False,
    /// The capability works reliably.
    True,
    /// The capability sometimes works; do not gate tests on it.
    Flaky,
}

impl TriState {
    /// Whether a harness should exercise the capability at all.
    #[must_use]
    pub fn is_testable(self) -> bool {
        self == TriState::True
    }
}

/// How a backend exposes chain-of-thought.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThinkingMode {
    /// No thinking support.
    #[default]
    None,
    /// Thinking is inlined in answer text between explicit delimiters.
    Inline {
        /// The opening delimiter, e.g. `"<think>"`.
        start: String,
        /// The closing delimiter, e.g. `"</think>"`.
        end: String,
    },
    /// Thinking arrives on a first-class channel.
    Automatic,
}

/// What a backend accepts or produces for one modality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModalCapability {
    /// Inline (bytes-in-request) content is supported.
    #[serde(default)]
    pub inline: bool,
    /// By-URL content is supported.
    #[serde(default)]
    pub url: bool,
    /// Maximum content size in bytes; zero means undeclared.
    #[serde(default)]
    pub max_size: u64,
    /// Supported media formats, e.g. `"image/png"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<String>,
}

/// Tri-state capability flags for one operation (sync, stream, or doc).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Functionality {
    /// Tool calling works.
    #[serde(default)]
    pub tools: TriState,
    /// Forced-JSON output works.
    #[serde(default)]
    pub json: TriState,
    /// Schema-constrained JSON output works.
    #[serde(default)]
    pub json_schema: TriState,
    /// Citations are returned.
    #[serde(default)]
    pub citations: TriState,
    /// The seed option yields deterministic sampling.
    #[serde(default)]
    pub seed: TriState,
    /// Top-logprobs are returned when requested.
    #[serde(default)]
    pub top_logprobs: TriState,
    /// Rate limits are reported in responses.
    #[serde(default)]
    pub rate_limit: TriState,
    /// Reported token usage is correct.
    #[serde(default)]
    pub usage: TriState,
    /// Reported finish reasons are correct.
    #[serde(default)]
    pub finish_reason: TriState,
    /// The max-tokens cap is honored.
    #[serde(default)]
    pub max_tokens: TriState,
    /// Stop sequences are honored.
    #[serde(default)]
    pub stop_sequence: TriState,
    /// With a biased prompt the model picks the suggested tool.
    #[serde(default)]
    pub tools_biased: TriState,
    /// With an ambiguous prompt the model still resolves a tool call.
    #[serde(default)]
    pub tools_indecisive: TriState,
}

/// One supported (modalities, models, thinking, operations) tuple.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Representative model IDs; non-exhaustive.
    pub models: Vec<String>,
    /// Accepted input modalities.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input: BTreeMap<Modality, ModalCapability>,
    /// Produced output modalities.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output: BTreeMap<Modality, ModalCapability>,
    /// How thinking is exposed, if at all.
    #[serde(default)]
    pub thinking: ThinkingMode,
    /// Capabilities of the sync generation operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen_sync: Option<Functionality>,
    /// Capabilities of the streaming generation operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen_stream: Option<Functionality>,
    /// Capabilities of the document generation operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen_doc: Option<Functionality>,
}

/// The full capability declaration for one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scoreboard {
    /// The scenarios the provider supports.
    pub scenarios: Vec<Scenario>,
}

/// A scoreboard declaration is internally inconsistent.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ScoreboardError {
    /// A scenario declares no models.
    #[error("scenario {0} declares no models")]
    NoModels(usize),

    /// A scenario declares no operations.
    #[error("scenario {0} declares no operations")]
    NoOperations(usize),

    /// Inline thinking was declared without delimiters.
    #[error("scenario {0}: inline thinking requires start and end delimiters")]
    MissingDelimiters(usize),
}

impl Scoreboard {
    /// Sanity-check the declaration before a harness consumes it.
    ///
    /// # Errors
    ///
    /// Returns a [`ScoreboardError`] naming the first inconsistent
    /// scenario.
    pub fn validate(&self) -> Result<(), ScoreboardError> {
        for (i, s) in self.scenarios.iter().enumerate() {
            if s.models.is_empty() {
                return Err(ScoreboardError::NoModels(i));
            }
            if s.gen_sync.is_none() && s.gen_stream.is_none() && s.gen_doc.is_none() {
                return Err(ScoreboardError::NoOperations(i));
            }
            if let ThinkingMode::Inline { start, end } = &s.thinking
                && (start.is_empty() || end.is_empty())
            {
                return Err(ScoreboardError::MissingDelimiters(i));
            }
        }
        Ok(())
    }

    /// The scenario covering `model`, if declared.
    #[must_use]
    pub fn scenario_for(&self, model: &str) -> Option<&Scenario> {
        self.scenarios
            .iter()
            .find(|s| s.models.iter().any(|m| m == model))
    }
}

/// Providers that publish a capability declaration.
pub trait ProviderScoreboard {
    /// The provider's static capability declaration.
    fn scoreboard(&self) -> Scoreboard;
}
