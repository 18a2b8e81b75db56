use std::fmt::{self, Debug};
use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use agent_studio_model::{
    ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent,
};
use tracing::Instrument;

type SendRequestResult = Result<ModelStream, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn = Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased
/// interface for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    /// Wraps a model provider.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req: ModelRequest| {
            let fut = provider.send_request(&req);
            let fut: BoxedSendRequestFuture = Box::pin(
                async move {
                    trace!("got a request: {req:?}");
                    match fut.await {
                        Ok(resp) => Ok(ModelStream::new(resp)),
                        Err(err) => {
                            error!("got an error: {err:?}");
                            Err(Box::new(err) as Box<dyn ModelProviderError>)
                        }
                    }
                }
                .instrument(trace_span!("model client req")),
            );
            fut
        });
        Self { handler_fn }
    }

    /// Sends a request and returns the event stream of the response.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the returned stream stops
    /// receiving further events.
    #[inline]
    pub async fn send_request(
        &self,
        req: ModelRequest,
    ) -> Result<ModelStream, Box<dyn ModelProviderError>> {
        (self.handler_fn)(req).await
    }
}

impl Debug for ModelClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClient").finish_non_exhaustive()
    }
}

trait ErasedResponse: Send {
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Box<dyn ModelProviderError>>>;
}

impl<R: ModelResponse> ErasedResponse for R {
    #[inline]
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Box<dyn ModelProviderError>>>
    {
        ModelResponse::poll_next_event(self, cx)
            .map_err(|err| Box::new(err) as Box<dyn ModelProviderError>)
    }
}

/// The events of a model response, in the order the provider streams
/// them.
pub struct ModelStream {
    inner: Pin<Box<dyn ErasedResponse>>,
    finished: bool,
}

impl ModelStream {
    fn new<R: ModelResponse>(resp: R) -> Self {
        Self {
            inner: Box::pin(resp),
            finished: false,
        }
    }

    /// Waits for the next event. `Ok(None)` means the response has
    /// completed; an error also finishes the stream.
    pub async fn next_event(
        &mut self,
    ) -> Result<Option<ModelResponseEvent>, Box<dyn ModelProviderError>> {
        if self.finished {
            return Ok(None);
        }
        let event_or_err =
            poll_fn(|cx| self.inner.as_mut().poll_next_event(cx)).await;
        match &event_or_err {
            Ok(Some(event)) => trace!("got an event: {event:?}"),
            Ok(None) => self.finished = true,
            Err(err) => {
                error!("got an error: {err:?}");
                self.finished = true;
            }
        }
        event_or_err
    }
}

impl Debug for ModelStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelStream")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
