//! The sync and streaming tool-loop drivers.

use tokio::sync::mpsc;

use unigen_types::{
    GenError, GenOptions, Message, ProviderGen, ReplyFragment, ToolCall, ToolCallRequest,
    ToolCallResult, ToolContext, ToolError, Usage, split_continuable, validate_messages,
};

use crate::error::{ToolLoopError, ToolLoopErrorKind};

/// The transcript a completed tool loop appends to the conversation.
#[derive(Debug, Default)]
pub struct ToolLoopOutput {
    /// The turns produced by the loop: assistant messages alternating with
    /// computer-role tool-result messages, ending on an assistant turn.
    pub messages: Vec<Message>,
    /// Usage aggregated across every round; the finish reason is the final
    /// round's.
    pub usage: Usage,
    /// Names of options fields some round's provider ignored, deduplicated.
    pub unsupported: Vec<String>,
}

/// Drive `provider.gen_sync` through tool rounds until the assistant
/// finishes without tool calls.
///
/// The input messages are copied into a working buffer; the caller's list
/// is never modified. `options` must be a text bag carrying at least one
/// tool. If the caller set `tool_call_request = required`, the loop
/// downgrades it to `any` after the first round — a deliberate,
/// caller-visible mutation that lets the model finish naturally.
///
/// # Errors
///
/// Returns a [`ToolLoopError`] carrying the partial transcript and usage
/// on generator failure, tool failure, or cancellation.
pub async fn run_sync<P: ProviderGen>(
    provider: &P,
    messages: &[Message],
    ctx: &ToolContext,
    options: &mut GenOptions,
) -> Result<ToolLoopOutput, ToolLoopError> {
    check_preconditions(messages, options)?;

    let mut out = ToolLoopOutput::default();
    let mut buffer = messages.to_vec();
    let mut round = 0usize;

    loop {
        if ctx.cancellation_token.is_cancelled() {
            return Err(ToolLoopError::new(ToolLoopErrorKind::Cancelled, out));
        }
        tracing::debug!(round, messages = buffer.len(), "tool loop: sync generation");

        let res = provider.gen_sync(&buffer, Some(&*options)).await;
        let (result, ignored) = match split_continuable(res) {
            Ok(v) => v,
            Err(e) => return Err(ToolLoopError::new(ToolLoopErrorKind::Gen(e), out)),
        };
        merge_unsupported(&mut out.unsupported, ignored);
        out.usage.add(&result.usage);

        let finished = finish_round(&mut out, &mut buffer, result.message, ctx, options).await?;
        if finished {
            return Ok(out);
        }
        round += 1;
    }
}

/// Drive `provider.gen_stream` through tool rounds until the assistant
/// finishes without tool calls.
///
/// Every fragment of every round is forwarded to `fragments` in arrival
/// order while a private copy is accumulated; the accumulated message is
/// what enters the transcript. The caller owns the receiving end of
/// `fragments` and its lifecycle. See [`run_sync`] for the options
/// contract and the required→any downgrade.
///
/// # Errors
///
/// Returns a [`ToolLoopError`] carrying the partial transcript and usage.
/// When accumulation fails mid-stream the inner channel is drained first
/// so the producer is never left blocked.
pub async fn run_stream<P: ProviderGen>(
    provider: &P,
    messages: &[Message],
    fragments: mpsc::Sender<ReplyFragment>,
    ctx: &ToolContext,
    options: &mut GenOptions,
) -> Result<ToolLoopOutput, ToolLoopError> {
    check_preconditions(messages, options)?;

    let mut out = ToolLoopOutput::default();
    let mut buffer = messages.to_vec();
    let mut round = 0usize;

    loop {
        if ctx.cancellation_token.is_cancelled() {
            return Err(ToolLoopError::new(ToolLoopErrorKind::Cancelled, out));
        }
        tracing::debug!(round, messages = buffer.len(), "tool loop: stream generation");

        let (inner_tx, mut inner_rx) = mpsc::channel(32);
        let gen_fut = provider.gen_stream(&buffer, inner_tx, Some(&*options));
        let forward = async {
            let mut accumulated = Message::default();
            let mut failure: Option<GenError> = None;
            while let Some(frag) = inner_rx.recv().await {
                // Keep receiving after a failure so the producer can
                // finish instead of deadlocking on a full channel.
                if failure.is_some() {
                    continue;
                }
                if let Err(e) = accumulated.accumulate(frag.clone()) {
                    failure = Some(e.into());
                    continue;
                }
                if fragments.send(frag).await.is_err() {
                    failure = Some(GenError::Stream("fragment receiver dropped".into()));
                }
            }
            match failure {
                Some(e) => Err(e),
                None => Ok(accumulated),
            }
        };

        let (res, forwarded) = tokio::join!(gen_fut, forward);
        let (result, ignored) = match split_continuable(res) {
            Ok(v) => v,
            Err(e) => return Err(ToolLoopError::new(ToolLoopErrorKind::Gen(e), out)),
        };
        let accumulated = match forwarded {
            Ok(m) => m,
            Err(e) => return Err(ToolLoopError::new(ToolLoopErrorKind::Gen(e), out)),
        };
        merge_unsupported(&mut out.unsupported, ignored);
        out.usage.add(&result.usage);

        // The accumulated message, not the provider's, enters the
        // transcript: it is what the caller watched arrive.
        let finished = finish_round(&mut out, &mut buffer, accumulated, ctx, options).await?;
        if finished {
            return Ok(out);
        }
        round += 1;
    }
}

/// Append the assistant turn; if it carries tool calls, execute them and
/// append the computer turn. Returns `true` when the loop is done.
async fn finish_round(
    out: &mut ToolLoopOutput,
    buffer: &mut Vec<Message>,
    assistant: Message,
    ctx: &ToolContext,
    options: &mut GenOptions,
) -> Result<bool, ToolLoopError> {
    out.messages.push(assistant.clone());
    buffer.push(assistant);

    let calls = buffer
        .last()
        .map(|m| m.tool_calls.clone())
        .unwrap_or_default();
    if calls.is_empty() {
        return Ok(true);
    }

    let results = match execute_tool_calls(&calls, options, ctx).await {
        Ok(r) => r,
        Err(kind) => return Err(ToolLoopError::new(kind, std::mem::take(out))),
    };
    if results.is_empty() {
        return Err(ToolLoopError::new(
            ToolLoopErrorKind::EmptyToolRound,
            std::mem::take(out),
        ));
    }

    let computer = Message {
        tool_call_results: results,
        ..Message::default()
    };
    out.messages.push(computer.clone());
    buffer.push(computer);

    // After the first round a `required` request has been satisfied;
    // downgrade so the model may now finish naturally. This mutates the
    // caller's options on purpose.
    if let Some(text) = options.as_text_mut()
        && text.tool_call_request == ToolCallRequest::Required
    {
        tracing::debug!("downgrading tool_call_request from required to any");
        text.tool_call_request = ToolCallRequest::Any;
    }

    Ok(false)
}

/// Dispatch each call to its registered tool and collect the results.
async fn execute_tool_calls(
    calls: &[ToolCall],
    options: &GenOptions,
    ctx: &ToolContext,
) -> Result<Vec<ToolCallResult>, ToolLoopErrorKind> {
    let Some(text) = options.as_text() else {
        return Err(ToolLoopErrorKind::Configuration(
            "tool calls require text options".into(),
        ));
    };

    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        if ctx.cancellation_token.is_cancelled() {
            return Err(ToolLoopErrorKind::Cancelled);
        }
        let def = text
            .tools
            .iter()
            .find(|t| t.name == call.name)
            .ok_or_else(|| ToolLoopErrorKind::Tool(ToolError::NotFound(call.name.clone())))?;
        let output = def
            .call(ctx.clone(), call)
            .await
            .map_err(ToolLoopErrorKind::Tool)?;
        results.push(ToolCallResult {
            id: call.id.clone(),
            name: call.name.clone(),
            result: output,
        });
    }
    Ok(results)
}

fn check_preconditions(
    messages: &[Message],
    options: &GenOptions,
) -> Result<(), ToolLoopError> {
    let fail = |kind| Err(ToolLoopError::new(kind, ToolLoopOutput::default()));

    let Some(text) = options.as_text() else {
        return fail(ToolLoopErrorKind::Configuration(
            "tool loop requires text options".into(),
        ));
    };
    if text.tools.is_empty() {
        return fail(ToolLoopErrorKind::Configuration(
            "tool loop requires at least one tool".into(),
        ));
    }
    if let Err(e) = text.validate() {
        return fail(ToolLoopErrorKind::Gen(GenError::Validation(e)));
    }
    if let Err(e) = validate_messages(messages) {
        return fail(ToolLoopErrorKind::Gen(GenError::Validation(e)));
    }
    Ok(())
}

fn merge_unsupported(into: &mut Vec<String>, ignored: Vec<String>) {
    for name in ignored {
        if !into.contains(&name) {
            into.push(name);
        }
    }
}
