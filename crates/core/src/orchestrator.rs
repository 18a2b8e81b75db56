//! The two-phase completion loop of a chat turn.

use std::sync::Arc;

use agent_studio_model::{
    ModelFinishReason, ModelMessage, ModelProviderError, ModelRequest,
    ModelResponseEvent, ModelTool, ToolCallInvocation, ToolChoice,
};
use agent_studio_protocol::marker;

use crate::accumulator::ToolCallAccumulator;
use crate::conversation::Conversation;
use crate::model_client::ModelClient;
use crate::sink::{OutputSink, SinkError};
use crate::tool::{Executor, ProgressStyle, ToolBroker, ToolExecutionResult};

/// Errors that end a chat turn.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The model request failed, before or while streaming.
    #[error("{0}")]
    Model(Box<dyn ModelProviderError>),
    /// The output stream no longer accepts writes.
    #[error(transparent)]
    Stream(#[from] SinkError),
}

/// The stages of a chat turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TurnStage {
    /// Streaming the completion that may request tools.
    StreamingPhase1,
    /// Running the requested tools.
    ExecutingTools,
    /// Streaming the completion that answers with the tool results.
    StreamingPhase2,
    /// The turn has completed.
    Done,
    /// The turn has failed.
    Failed,
}

/// Options shared by all turns.
#[derive(Clone, Debug, Default)]
pub struct OrchestratorOptions {
    /// Prepended to every conversation as a system message.
    pub system_prompt: Option<String>,
    /// How tool progress is reported.
    pub progress_style: ProgressStyle,
}

/// The input of a chat turn.
#[derive(Clone, Debug, Default)]
pub struct ChatTurn {
    /// The broker user the tools act for.
    pub user_id: String,
    /// The conversation history sent by the client.
    pub messages: Vec<ModelMessage>,
    /// Tools offered to the model in the first completion.
    pub tools: Vec<ModelTool>,
}

/// What happened during a successful turn.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    /// The visited stages, in order.
    pub stages: Vec<TurnStage>,
    /// The final conversation, including tool calls and results.
    pub conversation: Conversation,
    /// The results of the executed tools.
    pub tool_results: Vec<ToolExecutionResult>,
}

/// Drives chat turns against a model and a tool broker.
#[derive(Clone)]
pub struct Orchestrator {
    model_client: ModelClient,
    broker: Arc<dyn ToolBroker>,
    options: Arc<OrchestratorOptions>,
}

#[derive(Default)]
struct Completion {
    text: String,
    saw_content: bool,
    finish_reason: Option<ModelFinishReason>,
    invocations: Vec<ToolCallInvocation>,
}

impl Completion {
    #[inline]
    fn requested_tools(&self) -> bool {
        !self.invocations.is_empty()
            || self.finish_reason == Some(ModelFinishReason::ToolCalls)
    }
}

struct TurnState {
    stages: Vec<TurnStage>,
    conversation: Conversation,
    invocations: Vec<ToolCallInvocation>,
    tool_results: Vec<ToolExecutionResult>,
}

impl Orchestrator {
    /// Creates an orchestrator.
    pub fn new(
        model_client: ModelClient,
        broker: Arc<dyn ToolBroker>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            model_client,
            broker,
            options: Arc::new(options),
        }
    }

    /// Runs a chat turn, writing everything to `sink`.
    ///
    /// The sink is closed when the turn completes. On failure an
    /// `[error]` marker is written and the sink is failed, the error is
    /// returned as well.
    pub async fn run(
        &self,
        turn: ChatTurn,
        mut sink: OutputSink,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let ChatTurn {
            user_id,
            messages,
            tools,
        } = turn;
        let mut state = TurnState {
            stages: vec![],
            conversation: Conversation::new(
                self.options.system_prompt.as_deref(),
                messages,
            ),
            invocations: vec![],
            tool_results: vec![],
        };

        match self.run_stages(&user_id, tools, &mut state, &mut sink).await {
            Ok(()) => {
                sink.close();
                info!(stages = ?state.stages, "turn completed");
                Ok(TurnOutcome {
                    stages: state.stages,
                    conversation: state.conversation,
                    tool_results: state.tool_results,
                })
            }
            Err(err) => {
                state.stages.push(TurnStage::Failed);
                error!(stages = ?state.stages, "turn failed: {err}");
                sink.fail(&err.to_string()).await;
                Err(err)
            }
        }
    }

    async fn run_stages(
        &self,
        user_id: &str,
        tools: Vec<ModelTool>,
        state: &mut TurnState,
        sink: &mut OutputSink,
    ) -> Result<(), OrchestratorError> {
        let mut tools = Some(tools);
        let mut stage = TurnStage::StreamingPhase1;
        loop {
            state.stages.push(stage);
            debug!(?stage, "entering stage");
            stage = match stage {
                TurnStage::StreamingPhase1 => {
                    let tools = tools.take().unwrap_or_default();
                    let tool_choice =
                        (!tools.is_empty()).then_some(ToolChoice::Auto);
                    let request = ModelRequest {
                        messages: state.conversation.messages().to_vec(),
                        tools,
                        tool_choice,
                    };
                    let completion = self.stream_completion(request, sink, true).await?;
                    if completion.requested_tools() {
                        debug!(
                            count = completion.invocations.len(),
                            "model requested tools"
                        );
                        state.invocations = completion.invocations.clone();
                        state
                            .conversation
                            .push_tool_calls(completion.text, completion.invocations);
                        TurnStage::ExecutingTools
                    } else {
                        if !completion.saw_content {
                            // Nothing was streamed, still terminate the
                            // body with a write.
                            sink.write("").await?;
                        }
                        TurnStage::Done
                    }
                }
                TurnStage::ExecutingTools => {
                    sink.write(marker::RUNNING_TOOLS).await?;
                    let executor = Executor::new(
                        self.broker.as_ref(),
                        user_id,
                        self.options.progress_style,
                    );
                    state.tool_results = executor
                        .execute_all(&state.invocations, &mut state.conversation, sink)
                        .await?;
                    sink.write(marker::GENERATING_RESPONSE).await?;
                    TurnStage::StreamingPhase2
                }
                TurnStage::StreamingPhase2 => {
                    let request = ModelRequest {
                        messages: state.conversation.messages().to_vec(),
                        tools: vec![],
                        tool_choice: None,
                    };
                    let completion = self.stream_completion(request, sink, false).await?;
                    if !completion.invocations.is_empty() {
                        warn!("ignoring tool calls in the follow-up completion");
                    }
                    state.conversation.push(ModelMessage::assistant(completion.text));
                    TurnStage::Done
                }
                TurnStage::Done | TurnStage::Failed => return Ok(()),
            };
        }
    }

    async fn stream_completion(
        &self,
        request: ModelRequest,
        sink: &mut OutputSink,
        forward_empty_deltas: bool,
    ) -> Result<Completion, OrchestratorError> {
        let mut stream = self
            .model_client
            .send_request(request)
            .await
            .map_err(OrchestratorError::Model)?;

        let mut completion = Completion::default();
        let mut accumulator = ToolCallAccumulator::new();
        while let Some(event) =
            stream.next_event().await.map_err(OrchestratorError::Model)?
        {
            match event {
                ModelResponseEvent::MessageDelta(delta) => {
                    completion.saw_content = true;
                    if forward_empty_deltas || !delta.is_empty() {
                        sink.write(&delta).await?;
                    }
                    completion.text.push_str(&delta);
                }
                ModelResponseEvent::ToolCallDelta(fragments) => {
                    accumulator.extend(fragments);
                }
                ModelResponseEvent::Completed(reason) => {
                    completion.finish_reason = Some(reason);
                }
            }
        }
        completion.invocations = accumulator.finalize();
        Ok(completion)
    }
}

#[cfg(test)]
mod tests;
