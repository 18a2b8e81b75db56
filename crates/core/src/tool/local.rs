use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use agent_studio_model::ModelTool;
use async_trait::async_trait;

use crate::tool::{Error, ToolBroker, ToolRequest, ToolResult};

type BoxedToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;
type HandlerFn = Arc<dyn Fn(ToolRequest) -> BoxedToolFuture + Send + Sync>;

/// A broker that serves in-process tools.
///
/// Every registered tool is listed regardless of the requested toolkits.
/// Executed calls are recorded and can be inspected with
/// [`LocalBroker::calls`]. Clones share the tools and the record.
#[derive(Clone, Default)]
pub struct LocalBroker {
    definitions: Vec<ModelTool>,
    handlers: HashMap<String, HandlerFn>,
    listing_error: Option<Error>,
    calls: Arc<Mutex<Vec<(String, ToolRequest)>>>,
}

impl LocalBroker {
    /// Creates a broker without tools.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    ///
    /// The future returned by `handler` must be fully independent of the
    /// broker.
    pub fn with_tool<F, Fut>(mut self, definition: ModelTool, handler: F) -> Self
    where
        F: Fn(ToolRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        let handler: HandlerFn =
            Arc::new(move |req| Box::pin(handler(req)) as BoxedToolFuture);
        self.handlers.insert(definition.name.clone(), handler);
        self.definitions.retain(|tool| tool.name != definition.name);
        self.definitions.push(definition);
        self
    }

    /// Makes tool listing fail with the given error.
    #[inline]
    pub fn with_listing_error(mut self, error: Error) -> Self {
        self.listing_error = Some(error);
        self
    }

    /// Returns the executed calls so far, as `(name, request)` pairs.
    pub fn calls(&self) -> Vec<(String, ToolRequest)> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ToolBroker for LocalBroker {
    async fn list_tools(
        &self,
        _user_id: &str,
        _toolkits: &[String],
    ) -> Result<Vec<ModelTool>, Error> {
        if let Some(err) = &self.listing_error {
            return Err(err.clone());
        }
        Ok(self.definitions.clone())
    }

    async fn execute(&self, name: &str, request: ToolRequest) -> ToolResult {
        match self.calls.lock() {
            Ok(mut calls) => calls.push((name.to_owned(), request.clone())),
            Err(poisoned) => {
                poisoned.into_inner().push((name.to_owned(), request.clone()))
            }
        }
        let Some(handler) = self.handlers.get(name) else {
            warn!("tool not found: {name}");
            return Err(Error::not_found()
                .with_reason(format!("tool not found: {name}")));
        };
        handler(request).await
    }
}
