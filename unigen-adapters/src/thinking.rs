//! Reclassifies inline `<tag>…</tag>` reasoning text as thinking content.
//!
//! Some backends have no thinking channel and instead open their answer
//! with a tagged reasoning region in plain text. [`ThinkingAdapter`] wraps
//! such a provider and moves that region into the thinking field, both for
//! completed messages and incrementally on streams, where the tag tokens
//! may be split across fragment boundaries at any byte position.

use tokio::sync::mpsc;

use unigen_types::{
    ContinuableError, GenError, GenOptions, GenResult, Message, Provider, ProviderGen, Reply,
    ReplyFragment, split_continuable,
};

/// Wraps a generator and translates `<tag>…</tag>` text into thinking.
///
/// The tag name is configurable; `skip_json` disables processing when the
/// caller requested JSON output, since backends disable thinking there.
#[derive(Debug, Clone)]
pub struct ThinkingAdapter<P> {
    inner: P,
    open: String,
    close: String,
    skip_json: bool,
}

impl<P> ThinkingAdapter<P> {
    /// Wrap `inner`, extracting regions delimited by `<tag>`/`</tag>`.
    ///
    /// # Errors
    ///
    /// Returns a [`GenError::Configuration`] when the tag name is empty or
    /// contains angle brackets.
    pub fn new(inner: P, tag: &str) -> Result<Self, GenError> {
        if tag.is_empty() || tag.contains(['<', '>']) {
            return Err(GenError::Configuration(format!(
                "invalid thinking tag name {tag:?}"
            )));
        }
        Ok(Self {
            inner,
            open: format!("<{tag}>"),
            close: format!("</{tag}>"),
            skip_json: false,
        })
    }

    /// Forward verbatim when the caller requests JSON output.
    #[must_use]
    pub fn with_skip_json(mut self, skip: bool) -> Self {
        self.skip_json = skip;
        self
    }

    /// The wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Unwrap into the wrapped provider.
    pub fn into_inner(self) -> P {
        self.inner
    }

    fn skip(&self, options: Option<&GenOptions>) -> bool {
        self.skip_json
            && options
                .and_then(GenOptions::as_text)
                .is_some_and(|o| o.json_requested())
    }
}

impl<P: Provider> Provider for ThinkingAdapter<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

impl<P: ProviderGen> ProviderGen for ThinkingAdapter<P> {
    async fn gen_sync(
        &self,
        messages: &[Message],
        options: Option<&GenOptions>,
    ) -> Result<GenResult, GenError> {
        if self.skip(options) {
            return self.inner.gen_sync(messages, options).await;
        }
        let res = self.inner.gen_sync(messages, options).await;
        let (mut result, unsupported) = split_continuable(res)?;
        extract_thinking(&mut result.message, &self.open, &self.close)?;
        rewrap(result, unsupported)
    }

    async fn gen_stream(
        &self,
        messages: &[Message],
        fragments: mpsc::Sender<ReplyFragment>,
        options: Option<&GenOptions>,
    ) -> Result<GenResult, GenError> {
        if self.skip(options) {
            return self.inner.gen_stream(messages, fragments, options).await;
        }

        let (inner_tx, mut inner_rx) = mpsc::channel(32);
        let inner_fut = self.inner.gen_stream(messages, inner_tx, options);

        let consume = async {
            let mut parser = TagStreamParser::new(&self.open, &self.close);
            let mut message = Message::default();
            let mut failure: Option<GenError> = None;

            while let Some(frag) = inner_rx.recv().await {
                // After a failure, keep receiving so the producer is never
                // blocked on a full channel.
                if failure.is_some() {
                    continue;
                }
                let transformed = match frag {
                    ReplyFragment::Thinking(t) if !t.text.is_empty() => {
                        failure = Some(GenError::Configuration(
                            "provider already returns native thinking; tag adapter is redundant"
                                .into(),
                        ));
                        continue;
                    }
                    ReplyFragment::Text(t) => match parser.push(&t) {
                        Ok(pieces) => pieces_to_fragments(pieces),
                        Err(e) => {
                            failure = Some(e);
                            continue;
                        }
                    },
                    other => vec![other],
                };
                if let Err(e) = forward(&mut message, &fragments, transformed).await {
                    failure = Some(e);
                }
            }

            if failure.is_none() {
                match parser.finish() {
                    Ok(pieces) => {
                        if let Err(e) =
                            forward(&mut message, &fragments, pieces_to_fragments(pieces)).await
                        {
                            failure = Some(e);
                        }
                    }
                    Err(e) => failure = Some(e),
                }
            }

            match failure {
                Some(e) => Err(e),
                None => Ok(message),
            }
        };

        let (res, consumed) = tokio::join!(inner_fut, consume);
        let (mut result, unsupported) = split_continuable(res)?;
        // The reclassified accumulation replaces the wrapped result's
        // message so the final result reflects the new block structure.
        result.message = consumed?;
        rewrap(result, unsupported)
    }
}

fn rewrap(result: GenResult, unsupported: Vec<String>) -> Result<GenResult, GenError> {
    if unsupported.is_empty() {
        Ok(result)
    } else {
        Err(GenError::Unsupported(ContinuableError {
            unsupported,
            result: Box::new(result),
        }))
    }
}

async fn forward(
    message: &mut Message,
    tx: &mpsc::Sender<ReplyFragment>,
    frags: Vec<ReplyFragment>,
) -> Result<(), GenError> {
    for f in frags {
        message.accumulate(f.clone())?;
        if tx.send(f).await.is_err() {
            return Err(GenError::Stream("fragment receiver dropped".into()));
        }
    }
    Ok(())
}

fn pieces_to_fragments(pieces: Vec<Piece>) -> Vec<ReplyFragment> {
    pieces
        .into_iter()
        .map(|p| match p {
            Piece::Thinking(t) => ReplyFragment::thinking(t),
            Piece::Text(t) => ReplyFragment::Text(t),
        })
        .collect()
}

/// Reclassify the tagged region of a completed assistant message.
fn extract_thinking(message: &mut Message, open: &str, close: &str) -> Result<(), GenError> {
    if message.replies.is_empty() {
        return Err(GenError::InvalidResponse(
            "message has no reply blocks to reclassify".into(),
        ));
    }
    if message.replies.iter().any(|r| !r.thinking.is_empty()) {
        return Err(GenError::Configuration(
            "provider already returns native thinking; tag adapter is redundant".into(),
        ));
    }
    let Some(index) = message.replies.iter().position(Reply::is_text) else {
        return Ok(());
    };

    // The batch path reuses the stream machine on the whole text: same
    // states, same whitespace elision, same truncation handling.
    let mut parser = TagStreamParser::new(open, close);
    let mut pieces = parser.push(&message.replies[index].text)?;
    pieces.extend(parser.finish()?);

    let mut thinking = String::new();
    let mut text = String::new();
    for p in pieces {
        match p {
            Piece::Thinking(t) => thinking.push_str(&t),
            Piece::Text(t) => text.push_str(&t),
        }
    }

    let mut replacement = Vec::new();
    if !thinking.is_empty() {
        tracing::debug!(chars = thinking.len(), "reclassified inline thinking");
        replacement.push(Reply {
            thinking,
            ..Reply::default()
        });
    }
    if !text.is_empty() {
        replacement.push(Reply {
            text,
            ..Reply::default()
        });
    }
    message.replies.splice(index..=index, replacement);
    Ok(())
}

/// One reclassified span of stream output.
#[derive(Debug, PartialEq)]
enum Piece {
    Thinking(String),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TagState {
    /// Nothing but whitespace seen yet.
    Start,
    /// The opening tag was consumed; waiting for thinking text.
    StartTagSeen,
    /// Inside the thinking region.
    ThinkingTextSeen,
    /// The closing tag was consumed; waiting for answer text.
    EndTagSeen,
    /// Inside the answer; everything forwards verbatim.
    TextSeen,
}

/// Incremental tag extractor.
///
/// `carry` holds back bytes that cannot be classified yet: a partial
/// opening tag in `Start`, or trailing whitespace and a partial closing
/// tag in `ThinkingTextSeen`. This is what makes the machine insensitive
/// to where the backend splits fragments.
struct TagStreamParser {
    open: String,
    close: String,
    state: TagState,
    carry: String,
}

impl TagStreamParser {
    fn new(open: &str, close: &str) -> Self {
        Self {
            open: open.to_string(),
            close: close.to_string(),
            state: TagState::Start,
            carry: String::new(),
        }
    }

    /// Process one text fragment, returning the classified pieces.
    fn push(&mut self, text: &str) -> Result<Vec<Piece>, GenError> {
        let mut out = Vec::new();
        let mut input = std::mem::take(&mut self.carry);
        input.push_str(text);

        loop {
            match self.state {
                TagState::Start => {
                    let trimmed = input.trim_start();
                    if trimmed.is_empty() {
                        return Ok(out);
                    }
                    if let Some(rest) = trimmed.strip_prefix(&self.open) {
                        self.state = TagState::StartTagSeen;
                        input = rest.to_string();
                        continue;
                    }
                    if self.open.starts_with(trimmed) {
                        // Could still become the opening tag; hold it back.
                        self.carry = trimmed.to_string();
                        return Ok(out);
                    }
                    if trimmed.contains(&self.open) {
                        return Err(GenError::InvalidResponse(format!(
                            "text before {} tag",
                            self.open
                        )));
                    }
                    // No opening tag: some backends omit it and emit the
                    // thinking region bare.
                    self.state = TagState::ThinkingTextSeen;
                    input = trimmed.to_string();
                }
                TagState::StartTagSeen => {
                    let trimmed = input.trim_start();
                    if trimmed.is_empty() {
                        return Ok(out);
                    }
                    self.state = TagState::ThinkingTextSeen;
                    input = trimmed.to_string();
                }
                TagState::ThinkingTextSeen => {
                    if let Some(pos) = input.find(&self.close) {
                        let thinking = input[..pos].trim_end();
                        if !thinking.is_empty() {
                            out.push(Piece::Thinking(thinking.to_string()));
                        }
                        self.state = TagState::EndTagSeen;
                        input = input[pos + self.close.len()..].to_string();
                        continue;
                    }
                    let cut = self.holdback_cut(&input);
                    if cut > 0 {
                        out.push(Piece::Thinking(input[..cut].to_string()));
                    }
                    self.carry = input[cut..].to_string();
                    return Ok(out);
                }
                TagState::EndTagSeen => {
                    let trimmed = input.trim_start();
                    if trimmed.is_empty() {
                        return Ok(out);
                    }
                    self.state = TagState::TextSeen;
                    input = trimmed.to_string();
                }
                TagState::TextSeen => {
                    if !input.is_empty() {
                        out.push(Piece::Text(input));
                    }
                    return Ok(out);
                }
            }
        }
    }

    /// Flush held-back bytes at end of stream.
    fn finish(&mut self) -> Result<Vec<Piece>, GenError> {
        let carry = std::mem::take(&mut self.carry);
        let flushed = carry.trim_end();
        if flushed.is_empty() {
            return Ok(Vec::new());
        }
        match self.state {
            // A partial tag that never completed, or trailing thinking
            // text: the stream was truncated inside the thinking region.
            TagState::Start | TagState::ThinkingTextSeen => {
                self.state = TagState::ThinkingTextSeen;
                Ok(vec![Piece::Thinking(flushed.to_string())])
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Bytes at the end of `input` to hold back: the longest suffix that
    /// could begin the closing tag, extended over the whitespace run
    /// preceding it (whitespace adjacent to the tag is elided).
    fn holdback_cut(&self, input: &str) -> usize {
        let mut cut = input.len();
        for k in 1..self.close.len() {
            if k > input.len() {
                break;
            }
            let start = input.len() - k;
            if input.is_char_boundary(start) && self.close.starts_with(&input[start..]) {
                cut = start;
            }
        }
        while cut > 0 {
            let Some(prev) = input[..cut].chars().next_back() else {
                break;
            };
            if prev.is_whitespace() {
                cut -= prev.len_utf8();
            } else {
                break;
            }
        }
        cut
    }
}
