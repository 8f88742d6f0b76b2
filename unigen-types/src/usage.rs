//! Token usage, finish reasons, rate limits, and generation results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::message::Message;

/// Why generation stopped.
///
/// Providers report a small common set plus arbitrary provider-specific
/// strings, so the enum round-trips unknown values through [`FinishReason::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    /// Natural end of turn.
    Stop,
    /// The token cap was hit.
    Length,
    /// The model requested tool execution.
    ToolCalls,
    /// A stop sequence matched.
    StopSequence,
    /// The output was filtered.
    ContentFilter,
    /// An async job has not completed yet.
    Pending,
    /// A provider-specific reason, passed through verbatim.
    Other(String),
}

impl From<String> for FinishReason {
    fn from(s: String) -> Self {
        match s.as_str() {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "tool_calls" => Self::ToolCalls,
            "stop_sequence" => Self::StopSequence,
            "content_filter" => Self::ContentFilter,
            "pending" => Self::Pending,
            _ => Self::Other(s),
        }
    }
}

impl From<FinishReason> for String {
    fn from(r: FinishReason) -> Self {
        match r {
            FinishReason::Stop => "stop".into(),
            FinishReason::Length => "length".into(),
            FinishReason::ToolCalls => "tool_calls".into(),
            FinishReason::StopSequence => "stop_sequence".into(),
            FinishReason::ContentFilter => "content_filter".into(),
            FinishReason::Pending => "pending".into(),
            FinishReason::Other(s) => s,
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from(self.clone()))
    }
}

/// What a rate limit counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitKind {
    /// Requests per period.
    Requests,
    /// Tokens per period.
    Tokens,
}

/// The window a rate limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPeriod {
    /// Per-minute window.
    Minute,
    /// Per-day window.
    Day,
    /// Per-month window.
    Month,
    /// A provider-specific window.
    Other,
}

/// One rate limit reported by a provider alongside a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    /// What is being counted.
    pub kind: RateLimitKind,
    /// The window the limit applies to.
    pub period: RateLimitPeriod,
    /// The total allowance for the window.
    pub limit: u64,
    /// How much of the allowance remains.
    pub remaining: u64,
    /// When the window resets.
    pub reset: DateTime<Utc>,
}

impl RateLimit {
    /// Validate the allowance.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when `limit` is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.limit == 0 {
            return Err(ValidationError::Invalid {
                container: "rate_limit",
                reason: "limit must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Token accounting for one or more generation calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub input_tokens: u64,
    /// Prompt tokens served from the provider's cache.
    #[serde(default)]
    pub input_cached_tokens: u64,
    /// Tokens spent on reasoning/thinking.
    #[serde(default)]
    pub reasoning_tokens: u64,
    /// Tokens in the completion.
    #[serde(default)]
    pub output_tokens: u64,
    /// Total tokens as reported by the provider.
    #[serde(default)]
    pub total_tokens: u64,
    /// Why generation stopped, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Rate-limit snapshot reported with the response.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub limits: Vec<RateLimit>,
}

impl Usage {
    /// Fold another usage into this one.
    ///
    /// Token counts are summed; the finish reason and rate-limit snapshot
    /// are replaced by the newer value when present, so after aggregating a
    /// multi-round exchange they reflect the final round.
    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.input_cached_tokens += other.input_cached_tokens;
        self.reasoning_tokens += other.reasoning_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
        if other.finish_reason.is_some() {
            self.finish_reason = other.finish_reason.clone();
        }
        if !other.limits.is_empty() {
            self.limits = other.limits.clone();
        }
    }

    /// Validate the rate-limit entries.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when any rate limit is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let errs: Vec<_> = self
            .limits
            .iter()
            .filter_map(|l| l.validate().err())
            .collect();
        ValidationError::join(errs)
    }
}

/// One token's log-probability within a top-k alternative list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopLogprob {
    /// The candidate token.
    pub token: String,
    /// Its log-probability.
    pub logprob: f64,
}

/// Log-probability information for one sampled token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logprob {
    /// The sampled token.
    pub token: String,
    /// Its log-probability.
    pub logprob: f64,
    /// The most likely alternatives at this position.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_logprobs: Vec<TopLogprob>,
}

/// The outcome of one generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenResult {
    /// The assistant message, fully assembled.
    pub message: Message,
    /// Token accounting for the call.
    pub usage: Usage,
    /// Per-token log probabilities, when requested and supported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logprobs: Vec<Logprob>,
}

impl GenResult {
    /// Validate the embedded message and usage.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when either embedded part is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let errs: Vec<_> = [self.message.validate(), self.usage.validate()]
            .into_iter()
            .filter_map(Result::err)
            .collect();
        ValidationError::join(errs)
    }
}
