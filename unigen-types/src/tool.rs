//! Tool definitions with typed, schema-reflected callbacks.
//!
//! A [`ToolDef`] pairs a name and description with a callback whose
//! argument type is fixed at registration. The JSON schema advertised to
//! the model is reflected from that type, and call-time arguments are
//! decoded into a fresh value of it before dispatch, so a callback never
//! sees raw JSON.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::{ToolError, ValidationError};
use crate::message::ToolCall;

/// A pinned, boxed, `Send` future.
type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type Callback =
    dyn Fn(ToolContext, String) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync;

/// Runtime context handed to tool callbacks.
///
/// Carries the caller's cancellation token; long-running tools should
/// check it cooperatively.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Token for cooperative cancellation.
    pub cancellation_token: CancellationToken,
}

/// A callable tool the model may invoke.
///
/// Cloning is cheap: the callback is shared behind an `Arc`.
#[derive(Clone)]
pub struct ToolDef {
    /// The tool's unique name.
    pub name: String,
    /// What the tool does, shown to the model.
    pub description: String,
    callback: Arc<Callback>,
    reflected_schema: serde_json::Value,
    schema_override: Option<serde_json::Value>,
}

impl ToolDef {
    /// Register a tool with a typed callback.
    ///
    /// The input schema is reflected from `Args`; at call time the JSON
    /// arguments are decoded into a fresh `Args` before the callback runs.
    ///
    /// # Example
    ///
    /// ```
    /// use schemars::JsonSchema;
    /// use serde::Deserialize;
    /// use unigen_types::ToolDef;
    ///
    /// #[derive(Deserialize, JsonSchema)]
    /// struct AddArgs {
    ///     a: i64,
    ///     b: i64,
    /// }
    ///
    /// let tool = ToolDef::new::<AddArgs, _, _>("add", "Adds two integers", |_ctx, args: AddArgs| {
    ///     async move { Ok((args.a + args.b).to_string()) }
    /// })
    /// .unwrap();
    /// assert_eq!(tool.name, "add");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the name or description is
    /// empty.
    pub fn new<Args, F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        f: F,
    ) -> Result<Self, ValidationError>
    where
        Args: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(ToolContext, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        let name = name.into();
        let description = description.into();
        if name.is_empty() {
            return Err(ValidationError::Missing {
                container: "tool",
                field: "name",
            });
        }
        if description.is_empty() {
            return Err(ValidationError::Missing {
                container: "tool",
                field: "description",
            });
        }

        let reflected_schema =
            serde_json::to_value(schemars::schema_for!(Args)).map_err(|e| {
                ValidationError::Invalid {
                    container: "tool",
                    reason: format!("schema reflection failed: {e}"),
                }
            })?;

        let tool_name = name.clone();
        let callback: Arc<Callback> = Arc::new(move |ctx: ToolContext, arguments: String| -> BoxFuture<'static, Result<String, ToolError>> {
            let args: Result<Args, _> = serde_json::from_str(if arguments.is_empty() {
                "{}"
            } else {
                &arguments
            });
            match args {
                Ok(args) => Box::pin(f(ctx, args)),
                Err(source) => {
                    let tool = tool_name.clone();
                    Box::pin(async move { Err(ToolError::InvalidArguments { tool, source }) })
                }
            }
        });

        Ok(Self {
            name,
            description,
            callback,
            reflected_schema,
            schema_override: None,
        })
    }

    /// Replace the reflected input schema with a hand-written one.
    ///
    /// Useful when a provider needs a schema dialect the reflection does
    /// not produce; the callback's argument type is unchanged.
    #[must_use]
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema_override = Some(schema);
        self
    }

    /// The input schema advertised to the model.
    #[must_use]
    pub fn input_schema(&self) -> &serde_json::Value {
        self.schema_override.as_ref().unwrap_or(&self.reflected_schema)
    }

    /// Execute the tool for one call.
    ///
    /// The call's JSON arguments (empty means `{}`) are decoded into a
    /// fresh instance of the registered argument type, then the callback
    /// runs with the caller's cancellation context.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] when decoding fails or the callback fails.
    pub async fn call(&self, ctx: ToolContext, call: &ToolCall) -> Result<String, ToolError> {
        tracing::debug!(tool = %self.name, id = %call.id, "dispatching tool call");
        (self.callback)(ctx, call.arguments.clone()).await
    }
}

impl std::fmt::Debug for ToolDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDef")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct AddArgs {
        a: i64,
        b: i64,
    }

    fn add_tool() -> ToolDef {
        ToolDef::new::<AddArgs, _, _>("add", "Adds two integers", |_ctx, args: AddArgs| {
            async move { Ok((args.a + args.b).to_string()) }
        })
        .unwrap()
    }

    #[tokio::test]
    async fn call_decodes_arguments_into_fresh_value() {
        let tool = add_tool();
        let call = ToolCall {
            id: "call_1".into(),
            name: "add".into(),
            arguments: r#"{"a":5,"b":3}"#.into(),
            ..ToolCall::default()
        };
        let out = tool.call(ToolContext::default(), &call).await.unwrap();
        assert_eq!(out, "8");
    }

    #[tokio::test]
    async fn call_rejects_malformed_arguments() {
        let tool = add_tool();
        let call = ToolCall {
            name: "add".into(),
            arguments: r#"{"a":"five"}"#.into(),
            ..ToolCall::default()
        };
        let err = tool.call(ToolContext::default(), &call).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn empty_arguments_decode_as_empty_object() {
        #[derive(Debug, Deserialize, JsonSchema)]
        struct NoArgs {}

        let tool = ToolDef::new::<NoArgs, _, _>("ping", "Does nothing", |_ctx, _args: NoArgs| {
            async { Ok("pong".to_string()) }
        })
        .unwrap();
        let call = ToolCall {
            name: "ping".into(),
            ..ToolCall::default()
        };
        assert_eq!(
            tool.call(ToolContext::default(), &call).await.unwrap(),
            "pong"
        );
    }

    #[test]
    fn registration_validates_name_and_description() {
        let unnamed = ToolDef::new::<AddArgs, _, _>("", "Adds", |_ctx, _args: AddArgs| async {
            Ok(String::new())
        });
        assert!(unnamed.is_err());

        let undescribed =
            ToolDef::new::<AddArgs, _, _>("add", "", |_ctx, _args: AddArgs| async {
                Ok(String::new())
            });
        assert!(undescribed.is_err());
    }

    #[test]
    fn input_schema_reflects_argument_struct() {
        let tool = add_tool();
        let schema = tool.input_schema();
        assert_eq!(schema.get("type").and_then(|t| t.as_str()), Some("object"));
        let props = schema.get("properties").unwrap();
        assert!(props.get("a").is_some());
        assert!(props.get("b").is_some());
    }

    #[test]
    fn schema_override_wins() {
        let schema = serde_json::json!({"type": "object", "properties": {}});
        let tool = add_tool().with_schema(schema.clone());
        assert_eq!(tool.input_schema(), &schema);
    }
}
