//! A tool broker backed by the Composio REST API.

#[macro_use]
extern crate tracing;

mod config;
mod error;
mod proto;

use std::collections::HashSet;
use std::sync::Arc;

use agent_studio_core::tool::{self, ToolBroker, ToolOutput, ToolRequest, ToolResult};
use agent_studio_model::ModelTool;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::{Client, Response, Url};
use serde_json::Value;

pub use config::{ComposioConfig, ComposioConfigBuilder};
pub use error::ComposioError;
use proto::{ExecuteRequest, ExecuteResponse, ToolList};

const API_KEY_HEADER: &str = "x-api-key";
const MAX_PAGES: usize = 50;

/// Lists and executes the tools of Composio toolkits.
#[derive(Clone, Debug)]
pub struct ComposioBroker {
    client: Client,
    config: Arc<ComposioConfig>,
}

impl ComposioBroker {
    /// Creates a broker with the given configuration.
    #[inline]
    pub fn new(config: ComposioConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Creates a broker that shares an existing HTTP client.
    #[inline]
    pub fn with_client(client: Client, config: ComposioConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    /// Fetches every page of the tools of one toolkit.
    async fn fetch_toolkit(&self, toolkit: &str) -> Result<Vec<ModelTool>, ComposioError> {
        let mut tools = vec![];
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();
        for _ in 0..MAX_PAGES {
            let mut url = Url::parse(&self.config.tools_url())
                .map_err(|err| ComposioError::InvalidUrl(err.to_string()))?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("toolkit_slug", toolkit);
                if let Some(cursor) = &cursor {
                    query.append_pair("cursor", cursor);
                }
            }

            let page = self.fetch_page(url).await?;
            trace!(toolkit, count = page.items.len(), "fetched tool page");
            tools.extend(page.items.into_iter().map(proto::create_tool));
            match page.next_cursor.filter(|next| !next.is_empty()) {
                Some(next) if seen_cursors.insert(next.clone()) => cursor = Some(next),
                Some(next) => {
                    warn!(toolkit, cursor = next.as_str(), "tool pages cycle, stopping");
                    return Ok(tools);
                }
                None => return Ok(tools),
            }
        }
        warn!(toolkit, "stopped listing tools after {MAX_PAGES} pages");
        Ok(tools)
    }

    async fn fetch_page(&self, url: Url) -> Result<ToolList, ComposioError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.retry_interval)
            .with_max_elapsed_time(Some(self.config.max_retry_elapsed))
            .build();
        let client = &self.client;
        let api_key = self.config.api_key.as_str();
        let url = &url;

        backoff::future::retry(policy, || async move {
            let result = async {
                let resp = client
                    .get(url.clone())
                    .header(API_KEY_HEADER, api_key)
                    .send()
                    .await?;
                let body = check_status(resp).await?.text().await?;
                Ok::<_, ComposioError>(serde_json::from_str::<ToolList>(&body)?)
            }
            .await;
            result.map_err(|err| {
                if err.is_transient() {
                    warn!("listing tools failed, retrying: {err}");
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        })
        .await
    }

    async fn execute_tool(
        &self,
        slug: &str,
        request: &ToolRequest,
    ) -> Result<Value, ComposioError> {
        let body = ExecuteRequest {
            user_id: &request.user_id,
            arguments: &request.arguments,
        };
        let resp = self
            .client
            .post(self.config.execute_url(slug))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;
        let value: Value = serde_json::from_str(&body)?;
        let summary: ExecuteResponse = serde_json::from_value(value.clone())?;
        if let Some(reason) = proto::execution_failure(&summary) {
            return Err(ComposioError::Execution(reason));
        }
        Ok(value)
    }
}

#[async_trait]
impl ToolBroker for ComposioBroker {
    async fn list_tools(
        &self,
        user_id: &str,
        toolkits: &[String],
    ) -> Result<Vec<ModelTool>, tool::Error> {
        let mut seen = HashSet::new();
        let mut tools = vec![];
        for toolkit in toolkits {
            let fetched = self.fetch_toolkit(toolkit).await.map_err(|err| {
                error!(toolkit = toolkit.as_str(), "failed to list tools: {err}");
                tool::Error::from(err)
            })?;
            tools.extend(fetched.into_iter().filter(|tool| seen.insert(tool.name.clone())));
        }
        debug!(user_id, count = tools.len(), "listed tools");
        Ok(tools)
    }

    async fn execute(&self, name: &str, request: ToolRequest) -> ToolResult {
        debug!(user_id = request.user_id.as_str(), "executing {name}");
        self.execute_tool(name, &request)
            .await
            .map(ToolOutput::Json)
            .map_err(tool::Error::from)
    }
}

async fn check_status(resp: Response) -> Result<Response, ComposioError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = proto::error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_owned()
    });
    Err(ComposioError::Status { status, message })
}
