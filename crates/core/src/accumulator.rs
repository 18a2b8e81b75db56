//! Reassembles streamed tool call fragments.

use std::collections::BTreeMap;

use agent_studio_model::{ToolCallFragment, ToolCallInvocation};

const DEFAULT_CALL_TYPE: &str = "function";

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    kind: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Collects the tool call fragments of one completion.
///
/// Fragments can interleave between calls, the accumulator keys them by
/// their index. Nothing is emitted before [`finalize`] is called, which
/// must only happen once the completion stream has ended.
///
/// [`finalize`]: ToolCallAccumulator::finalize
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialCall>,
}

impl ToolCallAccumulator {
    /// Creates an empty accumulator.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a fragment into the call at its index.
    ///
    /// `id`, `type` and `name` replace the previous values when present
    /// and not empty, argument slices are appended in arrival order.
    pub fn push(&mut self, fragment: ToolCallFragment) {
        let call = self.calls.entry(fragment.index).or_default();
        if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
            call.id = Some(id);
        }
        if let Some(kind) = fragment.kind.filter(|kind| !kind.is_empty()) {
            call.kind = Some(kind);
        }
        if let Some(function) = fragment.function {
            if let Some(name) = function.name.filter(|name| !name.is_empty()) {
                call.name = Some(name);
            }
            if let Some(arguments) = function.arguments {
                call.arguments.push_str(&arguments);
            }
        }
    }

    /// Merges a batch of fragments.
    #[inline]
    pub fn extend<I>(&mut self, fragments: I)
    where
        I: IntoIterator<Item = ToolCallFragment>,
    {
        for fragment in fragments {
            self.push(fragment);
        }
    }

    /// Returns `true` if no fragment has been seen.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Returns the number of distinct calls seen.
    #[inline]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Emits the complete calls in ascending index order.
    ///
    /// Arguments are emitted as received, even if they are not valid
    /// JSON. A call without an id gets `call_<index>` so that its result
    /// can still be paired with it.
    pub fn finalize(self) -> Vec<ToolCallInvocation> {
        self.calls
            .into_iter()
            .map(|(index, call)| {
                let id = call.id.unwrap_or_else(|| {
                    warn!("tool call {index} has no id");
                    format!("call_{index}")
                });
                ToolCallInvocation::function(
                    id,
                    call.name.unwrap_or_default(),
                    call.arguments,
                )
                .with_kind(call.kind.unwrap_or_else(|| DEFAULT_CALL_TYPE.to_owned()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use agent_studio_model::FunctionFragment;

    use super::*;

    #[test]
    fn test_finalize_in_index_order() {
        let mut accumulator = ToolCallAccumulator::new();
        accumulator.push(ToolCallFragment::start(2, "call_c", "c"));
        accumulator.push(ToolCallFragment::start(0, "call_a", "a"));
        accumulator.push(ToolCallFragment::start(1, "call_b", "b"));
        assert_eq!(accumulator.len(), 3);

        let ids: Vec<_> = accumulator
            .finalize()
            .into_iter()
            .map(|call| call.id)
            .collect();
        assert_eq!(ids, ["call_a", "call_b", "call_c"]);
    }

    #[test]
    fn test_arguments_survive_any_chunking() {
        let arguments = r#"{"to":"bob@example.com","subject":"Hi ✉","n":[1,2]}"#;
        let boundaries: Vec<usize> =
            arguments.char_indices().map(|(idx, _)| idx).collect();

        for &first in &boundaries {
            for &second in boundaries.iter().filter(|&&b| b >= first) {
                let mut accumulator = ToolCallAccumulator::new();
                accumulator.push(ToolCallFragment::start(0, "call_1", "send"));
                accumulator.extend([
                    ToolCallFragment::arguments(0, &arguments[..first]),
                    ToolCallFragment::arguments(0, &arguments[first..second]),
                    ToolCallFragment::arguments(0, &arguments[second..]),
                ]);
                let calls = accumulator.finalize();
                assert_eq!(calls[0].function.arguments, arguments);
            }
        }
    }

    #[test]
    fn test_interleaved_fragments() {
        let mut accumulator = ToolCallAccumulator::new();
        accumulator.extend([
            ToolCallFragment::start(1, "call_b", "get_time"),
            ToolCallFragment::start(0, "call_a", "get_weather"),
            ToolCallFragment::arguments(0, r#"{"city":"#),
            ToolCallFragment::arguments(1, "{}"),
            ToolCallFragment::arguments(0, r#""Paris"}"#),
        ]);
        let calls = accumulator.finalize();
        assert_eq!(
            calls,
            vec![
                ToolCallInvocation::function(
                    "call_a",
                    "get_weather",
                    r#"{"city":"Paris"}"#
                ),
                ToolCallInvocation::function("call_b", "get_time", "{}"),
            ]
        );
    }

    #[test]
    fn test_invalid_arguments_are_kept() {
        let mut accumulator = ToolCallAccumulator::new();
        accumulator.push(ToolCallFragment::start(0, "call_1", "search"));
        accumulator.push(ToolCallFragment::arguments(0, r#"{"q": "unterminated"#));
        let calls = accumulator.finalize();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.arguments, r#"{"q": "unterminated"#);
    }

    #[test]
    fn test_missing_fields() {
        let mut accumulator = ToolCallAccumulator::new();
        accumulator.push(ToolCallFragment {
            index: 3,
            id: Some(String::new()),
            kind: None,
            function: Some(FunctionFragment {
                name: Some("lookup".to_owned()),
                arguments: None,
            }),
        });
        let calls = accumulator.finalize();
        assert_eq!(calls[0].id, "call_3");
        assert_eq!(calls[0].kind, "function");
        assert_eq!(calls[0].function.arguments, "");
    }

    #[test]
    fn test_later_values_overwrite() {
        let mut accumulator = ToolCallAccumulator::new();
        accumulator.push(ToolCallFragment::start(0, "call_old", "old"));
        accumulator.push(ToolCallFragment::start(0, "call_new", "new"));
        let calls = accumulator.finalize();
        assert_eq!(calls[0].id, "call_new");
        assert_eq!(calls[0].name(), "new");
    }
}
