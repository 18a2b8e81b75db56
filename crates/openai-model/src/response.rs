use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use agent_studio_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::Sse;
use crate::proto::{self, ChatCompletionChunk};

struct PartialState {
    sse: Sse,
    // Events decoded from one chunk are queued here, in the order they
    // must be delivered: content first, then tool call fragments, and
    // the finish reason last.
    pending_events: VecDeque<ModelResponseEvent>,
    done: bool,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            pending_events: Default::default(),
            done: false,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    loop {
        if let Some(event) = partial_state.pending_events.pop_front() {
            return Ok((Some(event), partial_state));
        }
        if partial_state.done {
            return Ok((None, partial_state));
        }

        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                partial_state.done = true;
                continue;
            }
            Err(err) => {
                return Err(Error::new(
                    format!("stream interrupted: {err:?}"),
                    ErrorKind::Other,
                ));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            partial_state.done = true;
            continue;
        }

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::InvalidResponse)
            })?;
        decode_chunk(chunk, &mut partial_state.pending_events);
    }
}

fn decode_chunk(
    chunk: ChatCompletionChunk,
    pending_events: &mut VecDeque<ModelResponseEvent>,
) {
    // Only the first choice is requested; usage-only chunks carry none.
    let Some(choice) = chunk.choices.into_iter().next() else {
        return;
    };

    if let Some(content) = choice.delta.content {
        pending_events.push_back(ModelResponseEvent::MessageDelta(content));
    }
    if let Some(tool_calls) = choice.delta.tool_calls {
        let fragments = proto::create_fragments(tool_calls);
        if !fragments.is_empty() {
            pending_events
                .push_back(ModelResponseEvent::ToolCallDelta(fragments));
        }
    }
    if let Some(finish_reason) = choice.finish_reason {
        pending_events.push_back(ModelResponseEvent::Completed(
            ModelFinishReason::from_wire(&finish_reason),
        ));
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;

    use super::*;
    use crate::io::Chunks;

    async fn collect_events(chunks: Chunks) -> Vec<ModelResponseEvent> {
        let sse = Sse::new(chunks);
        let mut resp = pin!(OpenAIResponse::from_sse(sse));
        let mut events = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await.unwrap()
        {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_tool_call_events() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(include_bytes!(
                "../fixtures/tool_calls_response.txt"
            ))]
            .into(),
        );
        let events = collect_events(chunks).await;

        let text: String = events
            .iter()
            .filter_map(|event| match event {
                ModelResponseEvent::MessageDelta(delta) => Some(delta.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Let me check.");

        // Fragments are forwarded untouched, in arrival order.
        let indices: Vec<u32> = events
            .iter()
            .filter_map(|event| match event {
                ModelResponseEvent::ToolCallDelta(fragments) => {
                    Some(fragments.iter().map(|f| f.index))
                }
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(indices, vec![1, 0, 1, 0]);

        assert_eq!(
            events.last(),
            Some(&ModelResponseEvent::Completed(ModelFinishReason::ToolCalls))
        );
    }

    #[tokio::test]
    async fn test_text_only_events() {
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(
                    b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
                ),
                Bytes::from_static(
                    b"data: {\"choices\":[{\"delta\":{\"content\":\"4\"}}]}\n\n",
                ),
                Bytes::from_static(
                    b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
                ),
                Bytes::from_static(b"data: {\"choices\":[],\"usage\":{}}\n\n"),
                Bytes::from_static(b"data: [DONE]\n\n"),
            ]
            .into(),
        );
        let events = collect_events(chunks).await;
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::MessageDelta(String::new()),
                ModelResponseEvent::MessageDelta("4".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_chunk() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"data: {not json}\n\n")].into(),
        );
        let sse = Sse::new(chunks);
        let mut resp = pin!(OpenAIResponse::from_sse(sse));
        let err = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .unwrap_err();
        assert_eq!(
            agent_studio_model::ModelProviderError::kind(&err),
            ErrorKind::InvalidResponse
        );
        // The response is finished after an error.
        let next = poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await;
        assert!(matches!(next, Ok(None)));
    }
}
