//! Provider capability traits.
//!
//! Concrete providers implement [`Provider`] plus whichever capability
//! traits their API supports. The traits use RPITIT (return-position
//! `impl Trait` in traits) and are intentionally NOT object-safe:
//! composition is by generics, and adapters wrap providers as
//! `struct Adapter<P: ProviderGen>`. Wrappers expose the wrapped value
//! through `inner()`/`into_inner()` so capability probes can traverse
//! adapter chains.
//!
//! Credentials are a constructor concern, not a trait concern: providers
//! conventionally read `<PROVIDER>_API_KEY` from the environment when the
//! caller supplies none.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::error::GenError;
use crate::fragment::ReplyFragment;
use crate::message::Message;
use crate::options::GenOptions;
use crate::usage::GenResult;

/// The base trait every provider implements.
///
/// Providers are stateless with respect to requests and safe for
/// concurrent use; per-request state lives in the call's future.
pub trait Provider: Send + Sync {
    /// The provider's identifier, e.g. `"anthropic"`.
    fn name(&self) -> &str;

    /// The model this instance targets.
    fn model_id(&self) -> &str;
}

/// Text/multi-modal generation, sync and streaming.
pub trait ProviderGen: Provider {
    /// Run one generation request to completion.
    fn gen_sync(
        &self,
        messages: &[Message],
        options: Option<&GenOptions>,
    ) -> impl Future<Output = Result<GenResult, GenError>> + Send;

    /// Run one generation request, pushing fragments to the caller-owned
    /// channel as they arrive.
    ///
    /// The provider sends on `fragments` until the request ends and then
    /// drops its sender; the caller owns the receiver and its lifecycle.
    /// The returned [`GenResult`] embeds the fully accumulated message.
    /// Fragments arrive in the exact order the backend emitted them.
    fn gen_stream(
        &self,
        messages: &[Message],
        fragments: mpsc::Sender<ReplyFragment>,
        options: Option<&GenOptions>,
    ) -> impl Future<Output = Result<GenResult, GenError>> + Send;
}

/// Single-shot document generation: one prompt in, one document out.
pub trait ProviderGenDoc: Provider {
    /// Generate a document from a single message.
    fn gen_doc(
        &self,
        message: &Message,
        options: Option<&GenOptions>,
    ) -> impl Future<Output = Result<GenResult, GenError>> + Send;
}

/// Handle to an asynchronous generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job(
    /// The provider-assigned job identifier.
    pub String,
);

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Asynchronous (job-based) generation.
pub trait ProviderGenAsync: Provider {
    /// Start a generation job.
    fn gen_async(
        &self,
        messages: &[Message],
        options: Option<&GenOptions>,
    ) -> impl Future<Output = Result<Job, GenError>> + Send;

    /// Fetch a job's result.
    ///
    /// While the job is incomplete the result's finish reason is
    /// [`FinishReason::Pending`](crate::usage::FinishReason::Pending).
    fn poke_result(&self, job: &Job) -> impl Future<Output = Result<GenResult, GenError>> + Send;
}

/// A model known to a provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    /// The model identifier to pass back to the provider.
    pub id: String,
    /// Human-readable name, when the provider reports one.
    pub display_name: Option<String>,
    /// When the model was published, when the provider reports it.
    pub created: Option<DateTime<Utc>>,
}

/// Listing the models a provider serves.
pub trait ModelLister: Provider {
    /// Fetch the provider's model catalog.
    fn list_models(&self) -> impl Future<Output = Result<Vec<Model>, GenError>> + Send;
}

/// A server-side cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Opaque entry identifier.
    pub id: String,
    /// Human-readable entry name.
    pub display_name: String,
    /// When the entry expires.
    pub expires: DateTime<Utc>,
}

/// Server-side prompt caching.
pub trait CacheManager: Provider {
    /// Cache a request's messages, returning the entry id.
    fn cache_add_request(
        &self,
        messages: &[Message],
        options: Option<&GenOptions>,
        display_name: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<String, GenError>> + Send;

    /// List live cache entries.
    fn cache_list(&self) -> impl Future<Output = Result<Vec<CacheEntry>, GenError>> + Send;

    /// Delete a cache entry by id.
    fn cache_delete(&self, id: &str) -> impl Future<Output = Result<(), GenError>> + Send;
}

/// Liveness checking without incurring generation cost.
pub trait Ping: Provider {
    /// Check that the provider is reachable and credentials work.
    fn ping(&self) -> impl Future<Output = Result<(), GenError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::{FinishReason, Usage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A provider exercising every capability trait at once.
    struct FullProvider {
        pokes: AtomicUsize,
    }

    impl Provider for FullProvider {
        fn name(&self) -> &str {
            "full"
        }
        fn model_id(&self) -> &str {
            "full-1"
        }
    }

    impl ProviderGenAsync for FullProvider {
        async fn gen_async(
            &self,
            _messages: &[Message],
            _options: Option<&GenOptions>,
        ) -> Result<Job, GenError> {
            Ok(Job("job_1".into()))
        }

        async fn poke_result(&self, job: &Job) -> Result<GenResult, GenError> {
            assert_eq!(job.0, "job_1");
            // First poke: still running. Second: done.
            let done = self.pokes.fetch_add(1, Ordering::SeqCst) > 0;
            let reason = if done {
                FinishReason::Stop
            } else {
                FinishReason::Pending
            };
            Ok(GenResult {
                message: if done {
                    Message::assistant("done")
                } else {
                    Message::default()
                },
                usage: Usage {
                    finish_reason: Some(reason),
                    ..Usage::default()
                },
                ..GenResult::default()
            })
        }
    }

    impl ModelLister for FullProvider {
        async fn list_models(&self) -> Result<Vec<Model>, GenError> {
            Ok(vec![Model {
                id: "full-1".into(),
                display_name: Some("Full One".into()),
                created: None,
            }])
        }
    }

    impl CacheManager for FullProvider {
        async fn cache_add_request(
            &self,
            _messages: &[Message],
            _options: Option<&GenOptions>,
            display_name: &str,
            ttl: Duration,
        ) -> Result<String, GenError> {
            assert!(!display_name.is_empty());
            assert!(ttl > Duration::ZERO);
            Ok("cache_1".into())
        }

        async fn cache_list(&self) -> Result<Vec<CacheEntry>, GenError> {
            Ok(vec![CacheEntry {
                id: "cache_1".into(),
                display_name: "warmup".into(),
                expires: Utc::now(),
            }])
        }

        async fn cache_delete(&self, id: &str) -> Result<(), GenError> {
            assert_eq!(id, "cache_1");
            Ok(())
        }
    }

    impl Ping for FullProvider {
        async fn ping(&self) -> Result<(), GenError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn async_jobs_report_pending_until_complete() {
        let provider = FullProvider {
            pokes: AtomicUsize::new(0),
        };
        let job = provider.gen_async(&[Message::user("hi")], None).await.unwrap();

        let first = provider.poke_result(&job).await.unwrap();
        assert_eq!(first.usage.finish_reason, Some(FinishReason::Pending));

        let second = provider.poke_result(&job).await.unwrap();
        assert_eq!(second.usage.finish_reason, Some(FinishReason::Stop));
        assert_eq!(second.message.text(), "done");
    }

    #[tokio::test]
    async fn model_listing_and_cache_round_trip() {
        let provider = FullProvider {
            pokes: AtomicUsize::new(0),
        };
        assert!(provider.ping().await.is_ok());

        let models = provider.list_models().await.unwrap();
        assert_eq!(models[0].id, "full-1");

        let id = provider
            .cache_add_request(&[Message::user("hi")], None, "warmup", Duration::from_secs(300))
            .await
            .unwrap();
        let entries = provider.cache_list().await.unwrap();
        assert_eq!(entries[0].id, id);
        provider.cache_delete(&id).await.unwrap();
    }
}
