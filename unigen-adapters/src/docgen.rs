//! Presents a single-shot document generator as a streaming generator.

use tokio::sync::mpsc;

use unigen_types::{
    ContinuableError, DocFragment, GenError, GenOptions, GenResult, Message, Provider,
    ProviderGen, ProviderGenDoc, ReplyFragment, split_continuable,
};

/// Adapts a [`ProviderGenDoc`] (image, audio, or video backend) to the
/// generic [`ProviderGen`] interface.
///
/// `gen_sync` forwards the single allowed message to the document call;
/// `gen_stream` simulates a stream by emitting the finished document as a
/// short fragment sequence. The caller keeps ownership of its channel.
#[derive(Debug, Clone)]
pub struct DocToGen<D> {
    inner: D,
}

impl<D> DocToGen<D> {
    /// Wrap a document generator.
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    /// The wrapped provider.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Unwrap into the wrapped provider.
    pub fn into_inner(self) -> D {
        self.inner
    }
}

fn single_message(messages: &[Message]) -> Result<&Message, GenError> {
    match messages {
        [one] => Ok(one),
        _ => Err(GenError::Configuration(format!(
            "document generation accepts exactly one message, got {}",
            messages.len()
        ))),
    }
}

impl<D: Provider> Provider for DocToGen<D> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

impl<D: ProviderGenDoc> ProviderGen for DocToGen<D> {
    async fn gen_sync(
        &self,
        messages: &[Message],
        options: Option<&GenOptions>,
    ) -> Result<GenResult, GenError> {
        let message = single_message(messages)?;
        self.inner.gen_doc(message, options).await
    }

    async fn gen_stream(
        &self,
        messages: &[Message],
        fragments: mpsc::Sender<ReplyFragment>,
        options: Option<&GenOptions>,
    ) -> Result<GenResult, GenError> {
        let message = single_message(messages)?;
        let res = self.inner.gen_doc(message, options).await;
        let (result, unsupported) = split_continuable(res)?;

        for reply in &result.message.replies {
            let frag = if !reply.text.is_empty() {
                Some(ReplyFragment::Text(reply.text.clone()))
            } else if let Some(doc) = &reply.doc {
                Some(ReplyFragment::Doc(DocFragment {
                    filename: doc.filename.clone(),
                    url: doc.url.clone(),
                    bytes: doc.bytes.clone().unwrap_or_default(),
                }))
            } else {
                None
            };
            if let Some(frag) = frag
                && fragments.send(frag).await.is_err()
            {
                return Err(GenError::Stream("fragment receiver dropped".into()));
            }
        }

        if unsupported.is_empty() {
            Ok(result)
        } else {
            Err(GenError::Unsupported(ContinuableError {
                unsupported,
                result: Box::new(result),
            }))
        }
    }
}
