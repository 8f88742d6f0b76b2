//! Tallies token usage across concurrent generation calls.

use std::sync::Mutex;

use tokio::sync::mpsc;

use unigen_types::{
    GenError, GenOptions, GenResult, Message, Provider, ProviderGen, ProviderGenDoc,
    ReplyFragment, Usage,
};

/// Token totals summed across every call made through a [`UsageAdapter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulatedUsage {
    /// Total prompt tokens.
    pub input_tokens: u64,
    /// Total prompt tokens served from cache.
    pub input_cached_tokens: u64,
    /// Total reasoning tokens.
    pub reasoning_tokens: u64,
    /// Total completion tokens.
    pub output_tokens: u64,
}

impl AccumulatedUsage {
    fn record(&mut self, usage: &Usage) {
        self.input_tokens += usage.input_tokens;
        self.input_cached_tokens += usage.input_cached_tokens;
        self.reasoning_tokens += usage.reasoning_tokens;
        self.output_tokens += usage.output_tokens;
    }
}

/// Wraps a generator and sums per-call token usage under a mutex.
///
/// Each call's [`GenResult`] is returned unmodified; [`accumulated`]
/// reports the running totals. Safe for arbitrary concurrent use: the
/// mutex is held only for the addition.
///
/// Other capabilities of the wrapped provider are reachable through
/// [`inner`], the unwrap convention for adapter chains.
///
/// [`accumulated`]: UsageAdapter::accumulated
/// [`inner`]: UsageAdapter::inner
#[derive(Debug)]
pub struct UsageAdapter<P> {
    inner: P,
    totals: Mutex<AccumulatedUsage>,
}

impl<P> UsageAdapter<P> {
    /// Wrap `inner` with zeroed totals.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            totals: Mutex::new(AccumulatedUsage::default()),
        }
    }

    /// The totals accumulated so far.
    pub fn accumulated(&self) -> AccumulatedUsage {
        *self.totals.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// The wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Unwrap into the wrapped provider.
    pub fn into_inner(self) -> P {
        self.inner
    }

    fn record(&self, res: &Result<GenResult, GenError>) {
        let usage = match res {
            Ok(r) => &r.usage,
            // A continuable error means the operation completed; its
            // usage is real.
            Err(GenError::Unsupported(c)) => &c.result.usage,
            Err(_) => return,
        };
        let mut totals = self
            .totals
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        totals.record(usage);
        tracing::trace!(
            input = usage.input_tokens,
            output = usage.output_tokens,
            "recorded usage"
        );
    }
}

impl<P: Provider> Provider for UsageAdapter<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

impl<P: ProviderGen> ProviderGen for UsageAdapter<P> {
    async fn gen_sync(
        &self,
        messages: &[Message],
        options: Option<&GenOptions>,
    ) -> Result<GenResult, GenError> {
        let res = self.inner.gen_sync(messages, options).await;
        self.record(&res);
        res
    }

    async fn gen_stream(
        &self,
        messages: &[Message],
        fragments: mpsc::Sender<ReplyFragment>,
        options: Option<&GenOptions>,
    ) -> Result<GenResult, GenError> {
        let res = self.inner.gen_stream(messages, fragments, options).await;
        self.record(&res);
        res
    }
}

impl<P: ProviderGenDoc> ProviderGenDoc for UsageAdapter<P> {
    async fn gen_doc(
        &self,
        message: &Message,
        options: Option<&GenOptions>,
    ) -> Result<GenResult, GenError> {
        let res = self.inner.gen_doc(message, options).await;
        self.record(&res);
        res
    }
}
