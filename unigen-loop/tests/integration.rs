//! Integration tests for the tool-call loop.

use std::sync::Mutex;

use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use unigen_loop::{ToolLoopErrorKind, run_stream, run_sync};
use unigen_types::{
    ContinuableError, FinishReason, GenError, GenOptions, GenResult, Message, OptionsText,
    Provider, ProviderGen, ReplyFragment, Role, ToolCall, ToolCallRequest, ToolContext, ToolDef,
    ToolError, Usage,
};

/// A mock provider that returns pre-configured responses in sequence.
///
/// In streaming mode each response's message is decomposed into fragments
/// before the result is returned.
struct MockProvider {
    responses: Mutex<Vec<Result<GenResult, GenError>>>,
}

impl MockProvider {
    fn new(responses: Vec<Result<GenResult, GenError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }

    fn next_response(&self) -> Result<GenResult, GenError> {
        let mut responses = self.responses.lock().expect("test lock poisoned");
        assert!(!responses.is_empty(), "MockProvider: no more responses configured");
        responses.remove(0)
    }
}

impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_id(&self) -> &str {
        "mock-1"
    }
}

impl ProviderGen for MockProvider {
    async fn gen_sync(
        &self,
        _messages: &[Message],
        _options: Option<&GenOptions>,
    ) -> Result<GenResult, GenError> {
        self.next_response()
    }

    async fn gen_stream(
        &self,
        _messages: &[Message],
        fragments: mpsc::Sender<ReplyFragment>,
        _options: Option<&GenOptions>,
    ) -> Result<GenResult, GenError> {
        let res = self.next_response()?;
        for reply in &res.message.replies {
            if !reply.text.is_empty()
                && fragments
                    .send(ReplyFragment::Text(reply.text.clone()))
                    .await
                    .is_err()
            {
                return Err(GenError::Stream("receiver dropped".into()));
            }
        }
        for call in &res.message.tool_calls {
            if fragments
                .send(ReplyFragment::ToolCall(call.clone()))
                .await
                .is_err()
            {
                return Err(GenError::Stream("receiver dropped".into()));
            }
        }
        Ok(res)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AddArgs {
    a: i64,
    b: i64,
}

fn add_tool() -> ToolDef {
    ToolDef::new::<AddArgs, _, _>("add", "Adds two integers", |_ctx, args: AddArgs| async move {
        Ok((args.a + args.b).to_string())
    })
    .unwrap()
}

fn failing_tool() -> ToolDef {
    ToolDef::new::<AddArgs, _, _>("add", "Always fails", |_ctx, _args: AddArgs| async {
        Err(ToolError::ExecutionFailed("backend offline".into()))
    })
    .unwrap()
}

fn options_with(tools: Vec<ToolDef>) -> GenOptions {
    GenOptions::Text(OptionsText {
        tools,
        ..OptionsText::default()
    })
}

fn text_response(text: &str, input: u64, output: u64) -> Result<GenResult, GenError> {
    Ok(GenResult {
        message: Message::assistant(text),
        usage: Usage {
            input_tokens: input,
            output_tokens: output,
            finish_reason: Some(FinishReason::Stop),
            ..Usage::default()
        },
        ..GenResult::default()
    })
}

fn tool_call_response(
    id: &str,
    name: &str,
    arguments: &str,
    input: u64,
    output: u64,
) -> Result<GenResult, GenError> {
    Ok(GenResult {
        message: Message {
            tool_calls: vec![ToolCall {
                id: id.into(),
                name: name.into(),
                arguments: arguments.into(),
                ..ToolCall::default()
            }],
            ..Message::default()
        },
        usage: Usage {
            input_tokens: input,
            output_tokens: output,
            finish_reason: Some(FinishReason::ToolCalls),
            ..Usage::default()
        },
        ..GenResult::default()
    })
}

#[tokio::test]
async fn single_round_produces_three_turns_and_summed_usage() {
    let provider = MockProvider::new(vec![
        tool_call_response("call_1", "add", r#"{"a":5,"b":3}"#, 10, 20),
        text_response("8", 15, 10),
    ]);
    let mut options = options_with(vec![add_tool()]);

    let out = run_sync(
        &provider,
        &[Message::user("What is 5+3?")],
        &ToolContext::default(),
        &mut options,
    )
    .await
    .expect("loop should succeed");

    assert_eq!(out.messages.len(), 3);
    assert_eq!(out.messages[0].role(), Role::Assistant);
    assert_eq!(out.messages[0].tool_calls[0].name, "add");
    assert_eq!(out.messages[1].role(), Role::Computer);
    assert_eq!(out.messages[1].tool_call_results[0].result, "8");
    assert_eq!(out.messages[1].tool_call_results[0].id, "call_1");
    assert_eq!(out.messages[2].text(), "8");

    assert_eq!(out.usage.input_tokens, 25);
    assert_eq!(out.usage.output_tokens, 30);
    assert_eq!(out.usage.finish_reason, Some(FinishReason::Stop));
}

#[tokio::test]
async fn no_tool_calls_returns_after_one_round() {
    let provider = MockProvider::new(vec![text_response("hello", 17, 1)]);
    let mut options = options_with(vec![add_tool()]);

    let out = run_sync(
        &provider,
        &[Message::user("Say hello. One word.")],
        &ToolContext::default(),
        &mut options,
    )
    .await
    .unwrap();

    assert_eq!(out.messages.len(), 1);
    assert_eq!(out.messages[0].text(), "hello");
    assert_eq!(out.usage.input_tokens, 17);
}

#[tokio::test]
async fn required_downgrades_to_any_after_first_round() {
    let provider = MockProvider::new(vec![
        tool_call_response("call_1", "add", r#"{"a":1,"b":2}"#, 1, 1),
        text_response("3", 1, 1),
    ]);
    let mut options = GenOptions::Text(OptionsText {
        tools: vec![add_tool()],
        tool_call_request: ToolCallRequest::Required,
        ..OptionsText::default()
    });

    run_sync(
        &provider,
        &[Message::user("add 1 and 2")],
        &ToolContext::default(),
        &mut options,
    )
    .await
    .unwrap();

    // The caller's options object shows the downgrade.
    assert_eq!(
        options.as_text().unwrap().tool_call_request,
        ToolCallRequest::Any
    );
}

#[tokio::test]
async fn tool_error_aborts_with_partial_output() {
    let provider = MockProvider::new(vec![tool_call_response(
        "call_1",
        "add",
        r#"{"a":1,"b":2}"#,
        9,
        4,
    )]);
    let mut options = options_with(vec![failing_tool()]);

    let err = run_sync(
        &provider,
        &[Message::user("add")],
        &ToolContext::default(),
        &mut options,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.kind,
        ToolLoopErrorKind::Tool(ToolError::ExecutionFailed(_))
    ));
    // The assistant turn and its usage were produced before the failure.
    assert_eq!(err.partial.messages.len(), 1);
    assert_eq!(err.partial.usage.input_tokens, 9);
}

#[tokio::test]
async fn unknown_tool_is_reported() {
    let provider = MockProvider::new(vec![tool_call_response(
        "call_1",
        "subtract",
        r#"{"a":1,"b":2}"#,
        1,
        1,
    )]);
    let mut options = options_with(vec![add_tool()]);

    let err = run_sync(
        &provider,
        &[Message::user("subtract")],
        &ToolContext::default(),
        &mut options,
    )
    .await
    .unwrap_err();

    match err.kind {
        ToolLoopErrorKind::Tool(ToolError::NotFound(name)) => assert_eq!(name, "subtract"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn generator_error_propagates_verbatim() {
    let provider = MockProvider::new(vec![Err(GenError::RequestFailed("boom".into()))]);
    let mut options = options_with(vec![add_tool()]);

    let err = run_sync(
        &provider,
        &[Message::user("hi")],
        &ToolContext::default(),
        &mut options,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.kind,
        ToolLoopErrorKind::Gen(GenError::RequestFailed(_))
    ));
}

#[tokio::test]
async fn rejects_options_without_tools() {
    let provider = MockProvider::new(vec![]);
    let mut options = GenOptions::Text(OptionsText::default());

    let err = run_sync(
        &provider,
        &[Message::user("hi")],
        &ToolContext::default(),
        &mut options,
    )
    .await
    .unwrap_err();
    assert!(matches!(err.kind, ToolLoopErrorKind::Configuration(_)));
}

#[tokio::test]
async fn rejects_non_text_options() {
    let provider = MockProvider::new(vec![]);
    let mut options = GenOptions::Image(unigen_types::OptionsImage::default());

    let err = run_sync(
        &provider,
        &[Message::user("hi")],
        &ToolContext::default(),
        &mut options,
    )
    .await
    .unwrap_err();
    assert!(matches!(err.kind, ToolLoopErrorKind::Configuration(_)));
}

#[tokio::test]
async fn cancellation_is_observed_between_rounds() {
    let token = CancellationToken::new();
    token.cancel();
    let ctx = ToolContext {
        cancellation_token: token,
    };
    let provider = MockProvider::new(vec![]);
    let mut options = options_with(vec![add_tool()]);

    let err = run_sync(&provider, &[Message::user("hi")], &ctx, &mut options)
        .await
        .unwrap_err();
    assert!(matches!(err.kind, ToolLoopErrorKind::Cancelled));
}

#[tokio::test]
async fn continuable_errors_are_collected_not_fatal() {
    let degraded = GenResult {
        message: Message::assistant("done"),
        usage: Usage {
            input_tokens: 5,
            output_tokens: 5,
            finish_reason: Some(FinishReason::Stop),
            ..Usage::default()
        },
        ..GenResult::default()
    };
    let provider = MockProvider::new(vec![Err(GenError::Unsupported(ContinuableError {
        unsupported: vec!["top_k".into()],
        result: Box::new(degraded),
    }))]);
    let mut options = options_with(vec![add_tool()]);

    let out = run_sync(
        &provider,
        &[Message::user("hi")],
        &ToolContext::default(),
        &mut options,
    )
    .await
    .unwrap();

    assert_eq!(out.messages[0].text(), "done");
    assert_eq!(out.unsupported, vec!["top_k".to_string()]);
}

#[tokio::test]
async fn stream_forwards_fragments_and_builds_same_transcript() {
    let provider = MockProvider::new(vec![
        tool_call_response("call_1", "add", r#"{"a":5,"b":3}"#, 10, 20),
        text_response("8", 15, 10),
    ]);
    let mut options = options_with(vec![add_tool()]);
    let (tx, mut rx) = mpsc::channel(64);

    let out = run_stream(
        &provider,
        &[Message::user("What is 5+3?")],
        tx,
        &ToolContext::default(),
        &mut options,
    )
    .await
    .expect("loop should succeed");

    assert_eq!(out.messages.len(), 3);
    assert_eq!(out.messages[2].text(), "8");
    assert_eq!(out.usage.input_tokens, 25);
    assert_eq!(out.usage.output_tokens, 30);

    // Every fragment of every round was forwarded in order.
    let mut saw_tool_call = false;
    let mut final_text = String::new();
    while let Ok(frag) = rx.try_recv() {
        match frag {
            ReplyFragment::ToolCall(c) => {
                saw_tool_call = true;
                assert_eq!(c.name, "add");
            }
            ReplyFragment::Text(t) => final_text.push_str(&t),
            other => panic!("unexpected fragment {other:?}"),
        }
    }
    assert!(saw_tool_call);
    assert_eq!(final_text, "8");
}

#[tokio::test]
async fn stream_generator_error_carries_partial_output() {
    let provider = MockProvider::new(vec![
        tool_call_response("call_1", "add", r#"{"a":5,"b":3}"#, 10, 20),
        Err(GenError::RequestFailed("boom".into())),
    ]);
    let mut options = options_with(vec![add_tool()]);
    let (tx, _rx) = mpsc::channel(64);

    let err = run_stream(
        &provider,
        &[Message::user("What is 5+3?")],
        tx,
        &ToolContext::default(),
        &mut options,
    )
    .await
    .unwrap_err();

    assert!(matches!(err.kind, ToolLoopErrorKind::Gen(_)));
    // First round completed: assistant + computer turns, usage recorded.
    assert_eq!(err.partial.messages.len(), 2);
    assert_eq!(err.partial.usage.input_tokens, 10);
}

#[tokio::test]
async fn loop_input_messages_are_not_modified() {
    let provider = MockProvider::new(vec![text_response("hello", 1, 1)]);
    let mut options = options_with(vec![add_tool()]);
    let input = vec![Message::user("hi")];

    run_sync(&provider, &input, &ToolContext::default(), &mut options)
        .await
        .unwrap();
    assert_eq!(input, vec![Message::user("hi")]);
}
