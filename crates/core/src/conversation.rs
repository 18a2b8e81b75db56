//! Conversation-related types.

use agent_studio_model::{
    AssistantMessage, ModelMessage, ToolCallInvocation, ToolCallResult,
};

/// The messages of one chat turn, in the order they are sent to the
/// model.
///
/// A conversation only lives as long as the request that created it and
/// only ever grows.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ModelMessage>,
}

impl Conversation {
    /// Creates a conversation that starts with the given system prompt,
    /// if any, followed by the history.
    pub fn new<I>(system_prompt: Option<&str>, history: I) -> Self
    where
        I: IntoIterator<Item = ModelMessage>,
    {
        let mut messages: Vec<_> = system_prompt
            .map(|prompt| ModelMessage::System(prompt.to_owned()))
            .into_iter()
            .collect();
        messages.extend(history);
        Self { messages }
    }

    /// Appends a message.
    #[inline]
    pub fn push(&mut self, msg: ModelMessage) {
        self.messages.push(msg);
    }

    /// Appends the assistant message that requested the tool calls.
    pub fn push_tool_calls(
        &mut self,
        content: String,
        tool_calls: Vec<ToolCallInvocation>,
    ) {
        self.push(ModelMessage::Assistant(AssistantMessage {
            content,
            tool_calls,
        }));
    }

    /// Appends the result of a tool call.
    pub fn push_tool_result(&mut self, id: String, content: String) {
        self.push(ModelMessage::Tool(ToolCallResult { id, content }));
    }

    /// Returns the messages.
    #[inline]
    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if there is no message.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
