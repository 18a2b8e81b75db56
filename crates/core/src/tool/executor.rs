use std::fmt::{self, Display};
use std::str::FromStr;

use agent_studio_model::ToolCallInvocation;
use agent_studio_protocol::{ToolEvent, marker};
use tracing::Instrument;

use crate::conversation::Conversation;
use crate::sink::{OutputSink, SinkError};
use crate::tool::{ToolArguments, ToolBroker, ToolRequest};

/// How tool progress is reported in the output stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProgressStyle {
    /// Human readable text markers.
    #[default]
    Markers,
    /// `on_tool_*` JSON event lines.
    Events,
}

impl Display for ProgressStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressStyle::Markers => f.write_str("markers"),
            ProgressStyle::Events => f.write_str("events"),
        }
    }
}

impl FromStr for ProgressStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markers" => Ok(ProgressStyle::Markers),
            "events" => Ok(ProgressStyle::Events),
            other => Err(format!("unknown progress style: {other}")),
        }
    }
}

/// How a tool call ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The tool returned a result.
    Succeeded,
    /// The tool failed with the given reason.
    Failed(String),
}

/// The result of one tool call, as reported back to the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolExecutionResult {
    /// The id of the call this result answers.
    pub tool_call_id: String,
    /// The tool name.
    pub name: String,
    /// The content of the `tool` message.
    pub content: String,
    /// How the call ended.
    pub outcome: ToolOutcome,
}

/// Runs the tool calls of one completion, one after another.
pub struct Executor<'a> {
    broker: &'a dyn ToolBroker,
    user_id: &'a str,
    progress_style: ProgressStyle,
}

impl<'a> Executor<'a> {
    /// Creates an executor that runs tools for `user_id`.
    #[inline]
    pub fn new(
        broker: &'a dyn ToolBroker,
        user_id: &'a str,
        progress_style: ProgressStyle,
    ) -> Self {
        Self {
            broker,
            user_id,
            progress_style,
        }
    }

    /// Executes every call in order and appends one `tool` message per
    /// call to the conversation.
    ///
    /// A failing tool does not stop the others: the failure is reported
    /// in place of its result. Only a closed output stream aborts the
    /// execution.
    pub async fn execute_all(
        &self,
        invocations: &[ToolCallInvocation],
        conversation: &mut Conversation,
        sink: &mut OutputSink,
    ) -> Result<Vec<ToolExecutionResult>, SinkError> {
        let mut results = Vec::with_capacity(invocations.len());
        for invocation in invocations {
            let span = debug_span!("tool", name = invocation.name(), id = %invocation.id);
            let result = self.execute(invocation, sink).instrument(span).await?;
            conversation
                .push_tool_result(result.tool_call_id.clone(), result.content.clone());
            results.push(result);
        }
        Ok(results)
    }

    async fn execute(
        &self,
        invocation: &ToolCallInvocation,
        sink: &mut OutputSink,
    ) -> Result<ToolExecutionResult, SinkError> {
        let name = invocation.name();
        let id = &invocation.id;
        let arguments = ToolArguments::parse(&invocation.function.arguments);
        if arguments.is_raw() {
            warn!("passing raw arguments to {name}");
        }
        let arguments = arguments.into_value();

        let start = match self.progress_style {
            ProgressStyle::Markers => marker::tool_started(name),
            ProgressStyle::Events => {
                ToolEvent::start(name, id, arguments.clone()).to_line()
            }
        };
        sink.write(&start).await?;

        trace!("executing with args: {arguments}");
        let request = ToolRequest {
            user_id: self.user_id.to_owned(),
            arguments,
        };
        let (content, outcome, progress) =
            match self.broker.execute(name, request).await {
                Ok(output) => {
                    debug!("tool succeeded");
                    let progress = match self.progress_style {
                        ProgressStyle::Markers => marker::tool_done(name),
                        ProgressStyle::Events => {
                            ToolEvent::end(name, id, output.to_value()).to_line()
                        }
                    };
                    (output.into_content(), ToolOutcome::Succeeded, progress)
                }
                Err(err) => {
                    let reason = err.reason().into_owned();
                    warn!("tool failed: {reason}");
                    let progress = match self.progress_style {
                        ProgressStyle::Markers => marker::tool_failed(&reason),
                        ProgressStyle::Events => {
                            ToolEvent::error(name, id, &reason).to_line()
                        }
                    };
                    (
                        marker::tool_failure_content(&reason),
                        ToolOutcome::Failed(reason),
                        progress,
                    )
                }
            };
        sink.write(&progress).await?;

        Ok(ToolExecutionResult {
            tool_call_id: id.clone(),
            name: name.to_owned(),
            content,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use agent_studio_model::{ModelMessage, ModelTool, ToolCallResult};
    use agent_studio_protocol::{ContentBlock, split_content_aggregated};
    use futures_util::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::sink::{self, OutputStream};
    use crate::tool::{Error, LocalBroker, ToolOutput};

    fn tool(name: &str) -> ModelTool {
        ModelTool {
            name: name.to_owned(),
            description: String::new(),
            parameters: json!({ "type": "object" }),
        }
    }

    fn broker() -> LocalBroker {
        LocalBroker::new()
            .with_tool(tool("get_weather"), |req| {
                let city = req.arguments["city"].as_str().unwrap_or("?").to_owned();
                ready(Ok(ToolOutput::Json(json!({ "city": city, "temp": 18 }))))
            })
            .with_tool(tool("ping"), |_| ready(Ok(ToolOutput::Text("pong".to_owned()))))
            .with_tool(tool("send_email"), |_| {
                ready(Err(Error::execution_error().with_reason("rate limited")))
            })
    }

    async fn read_all(mut stream: OutputStream) -> String {
        let mut output = String::new();
        while let Some(Ok(chunk)) = stream.next().await {
            output.push_str(std::str::from_utf8(&chunk).unwrap());
        }
        output
    }

    #[tokio::test]
    async fn test_execute_in_order() {
        let broker = broker();
        let executor = Executor::new(&broker, "user-1", ProgressStyle::Markers);
        let invocations = vec![
            ToolCallInvocation::function("call_1", "get_weather", r#"{"city":"Paris"}"#),
            ToolCallInvocation::function("call_2", "send_email", "{}"),
            ToolCallInvocation::function("call_3", "ping", ""),
        ];
        let mut conversation = Conversation::default();
        let (mut sink, stream) = sink::channel(32);
        let results = executor
            .execute_all(&invocations, &mut conversation, &mut sink)
            .await
            .unwrap();
        sink.close();

        assert_eq!(
            read_all(stream).await,
            concat!(
                "> get_weather...\n",
                "✔ get_weather done\n",
                "> send_email...\n",
                "✖ tool failed: rate limited\n",
                "> ping...\n",
                "✔ ping done\n",
            )
        );
        assert_eq!(results[1].outcome, ToolOutcome::Failed("rate limited".to_owned()));
        assert_eq!(
            conversation.messages(),
            [
                ModelMessage::Tool(ToolCallResult {
                    id: "call_1".to_owned(),
                    content: r#"{"city":"Paris","temp":18}"#.to_owned(),
                }),
                ModelMessage::Tool(ToolCallResult {
                    id: "call_2".to_owned(),
                    content: "Tool execution failed: rate limited".to_owned(),
                }),
                ModelMessage::Tool(ToolCallResult {
                    id: "call_3".to_owned(),
                    content: "pong".to_owned(),
                }),
            ]
        );

        let calls = broker.calls();
        assert_eq!(calls[0].1.user_id, "user-1");
        assert_eq!(calls[2].1.arguments, json!({}));
    }

    #[tokio::test]
    async fn test_raw_arguments() {
        let broker = broker();
        let executor = Executor::new(&broker, "user-1", ProgressStyle::Markers);
        let invocations =
            [ToolCallInvocation::function("call_1", "ping", r#"{"host":"#)];
        let (mut sink, _stream) = sink::channel(32);
        executor
            .execute_all(&invocations, &mut Conversation::default(), &mut sink)
            .await
            .unwrap();
        assert_eq!(broker.calls()[0].1.arguments, json!({ "$raw": r#"{"host":"# }));
    }

    #[tokio::test]
    async fn test_event_progress() {
        let broker = broker();
        let executor = Executor::new(&broker, "user-1", ProgressStyle::Events);
        let invocations = [
            ToolCallInvocation::function("call_1", "get_weather", r#"{"city":"Oslo"}"#),
            ToolCallInvocation::function("call_2", "missing", "{}"),
        ];
        let (mut sink, stream) = sink::channel(32);
        executor
            .execute_all(&invocations, &mut Conversation::default(), &mut sink)
            .await
            .unwrap();
        sink.close();

        let blocks = split_content_aggregated(&read_all(stream).await);
        let tools: Vec<_> = blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolAggregate(tool) => Some(tool),
                _ => None,
            })
            .collect();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].run_id, "call_1");
        assert_eq!(tools[0].input, Some(json!({ "city": "Oslo" })));
        assert_eq!(tools[0].output, Some(json!({ "city": "Oslo", "temp": 18 })));
        assert_eq!(tools[1].name, "missing");
        assert!(tools[1].error.is_some());
    }

    #[tokio::test]
    async fn test_closed_sink_aborts() {
        let broker = broker();
        let executor = Executor::new(&broker, "user-1", ProgressStyle::Markers);
        let invocations = [ToolCallInvocation::function("call_1", "ping", "")];
        let (mut sink, stream) = sink::channel(32);
        drop(stream);
        let result = executor
            .execute_all(&invocations, &mut Conversation::default(), &mut sink)
            .await;
        assert_eq!(result, Err(SinkError::Closed));
        assert!(broker.calls().is_empty());
    }

    #[test]
    fn test_progress_style_from_str() {
        assert_eq!("events".parse::<ProgressStyle>(), Ok(ProgressStyle::Events));
        assert_eq!(" Markers ".parse::<ProgressStyle>(), Ok(ProgressStyle::Markers));
        assert!("verbose".parse::<ProgressStyle>().is_err());
    }
}
