//! Rebuilds displayable blocks from an accumulated chat transcript.
//!
//! Both splitters are pure functions of the text seen so far. Clients
//! re-run them on the whole transcript whenever more bytes arrive; a
//! block that is complete in a prefix is produced identically for any
//! longer prefix.

use std::collections::HashMap;

use serde_json::Value;

use crate::event::{ToolEvent, ToolEventKind, parse_tool_event_line};

/// The name used for tool blocks whose events carry no name.
pub const DEFAULT_TOOL_NAME: &str = "tool";

/// A block of the rendered transcript.
#[derive(Clone, Debug, PartialEq)]
pub enum ContentBlock {
    /// Consecutive non-event lines, joined with `\n`.
    Text(String),
    /// A single tool event.
    Tool(ToolEvent),
    /// All events of one tool execution, merged by run id.
    ToolAggregate(ToolAggregateBlock),
}

/// The merged events of one tool execution.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolAggregateBlock {
    /// The tool name, taken from the first event.
    pub name: String,
    /// The run id shared by all merged events.
    pub run_id: String,
    /// The latest `on_tool_start` event.
    pub start: Option<ToolEvent>,
    /// The latest `on_tool_end` event.
    pub end: Option<ToolEvent>,
    /// The latest `on_tool_error` event.
    pub error: Option<ToolEvent>,
    /// The tool input.
    pub input: Option<Value>,
    /// The tool output.
    pub output: Option<Value>,
}

impl ToolAggregateBlock {
    fn new(name: &str, run_id: &str) -> Self {
        Self {
            name: name.to_owned(),
            run_id: run_id.to_owned(),
            start: None,
            end: None,
            error: None,
            input: None,
            output: None,
        }
    }

    fn apply(&mut self, event: ToolEvent) {
        let data = event.data.clone().unwrap_or_default();
        match event.kind() {
            ToolEventKind::Start => {
                self.input = data.input;
                self.start = Some(event);
            }
            ToolEventKind::End => {
                self.output = data.output;
                if self.input.is_none() {
                    self.input = data.input;
                }
                self.end = Some(event);
            }
            ToolEventKind::Error => {
                self.error = Some(event);
            }
            ToolEventKind::Other => {}
        }
    }

    /// Returns `true` if the execution has finished, either way.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.end.is_some() || self.error.is_some()
    }
}

#[derive(Default)]
struct TextBuffer<'a> {
    lines: Vec<&'a str>,
}

impl<'a> TextBuffer<'a> {
    #[inline]
    fn push(&mut self, line: &'a str) {
        self.lines.push(line);
    }

    fn flush_into(&mut self, blocks: &mut Vec<ContentBlock>) {
        if !self.lines.is_empty() {
            blocks.push(ContentBlock::Text(self.lines.join("\n")));
            self.lines.clear();
        }
    }
}

/// Splits the transcript into text blocks and one block per tool event.
pub fn split_content(content: &str) -> Vec<ContentBlock> {
    let mut blocks = vec![];
    let mut text = TextBuffer::default();
    for line in content.split('\n') {
        if line.trim().is_empty() {
            text.push(line);
            continue;
        }
        match parse_tool_event_line(line) {
            Some(event) => {
                text.flush_into(&mut blocks);
                blocks.push(ContentBlock::Tool(event));
            }
            None => text.push(line),
        }
    }
    text.flush_into(&mut blocks);
    blocks
}

/// Splits the transcript into text blocks and tool blocks, merging
/// events that share a run id into the block of the first one.
///
/// Events without a run id are kept as text.
pub fn split_content_aggregated(content: &str) -> Vec<ContentBlock> {
    let mut blocks = vec![];
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut text = TextBuffer::default();
    for line in content.split('\n') {
        if line.trim().is_empty() {
            text.push(line);
            continue;
        }
        let Some(event) = parse_tool_event_line(line) else {
            text.push(line);
            continue;
        };
        let Some(run_id) = event.run_id().map(str::to_owned) else {
            text.push(line);
            continue;
        };

        text.flush_into(&mut blocks);
        let idx = *seen.entry(run_id).or_insert_with_key(|run_id| {
            let name = event
                .name
                .as_deref()
                .filter(|name| !name.is_empty())
                .unwrap_or(DEFAULT_TOOL_NAME);
            blocks.push(ContentBlock::ToolAggregate(ToolAggregateBlock::new(
                name, run_id,
            )));
            blocks.len() - 1
        });
        if let Some(ContentBlock::ToolAggregate(block)) = blocks.get_mut(idx) {
            block.apply(event);
        }
    }
    text.flush_into(&mut blocks);
    blocks
}
