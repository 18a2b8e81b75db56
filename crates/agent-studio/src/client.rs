//! An HTTP client for the chat endpoint.

use std::borrow::Cow;
use std::collections::VecDeque;

use agent_studio_protocol::{ChatRequest, LineDemux, StreamItem};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

/// Errors returned by [`ChatClient`] and [`ChatStream`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request could not be sent.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server rejected the request.
    #[error("server returned {status}: {message}")]
    Status {
        /// The response status.
        status: StatusCode,
        /// The `error` field of the body, or the body itself.
        message: String,
    },
    /// The response body ended abruptly.
    #[error("response interrupted: {0}")]
    Interrupted(String),
}

/// Sends chat requests to an agent studio server.
#[derive(Clone, Debug)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
}

impl ChatClient {
    /// Creates a client for the server at `base_url`.
    #[inline]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Creates a client that shares an existing HTTP client.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
        }
    }

    /// Sends a request and returns the response stream once the server
    /// has accepted it.
    pub async fn send(&self, request: &ChatRequest) -> Result<ChatStream, ClientError> {
        debug!(
            messages = request.messages.len(),
            toolkits = ?request.toolkits,
            "sending chat request"
        );
        let resp = self.client.post(&self.endpoint).json(request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| value.get("error")?.as_str().map(str::to_owned))
                .unwrap_or(body);
            warn!("chat request rejected: {status} {message}");
            return Err(ClientError::Status { status, message });
        }
        Ok(ChatStream::new(resp))
    }
}

/// The demultiplexed body of a chat response.
///
/// The raw body is kept, so the whole transcript can be re-rendered with
/// the aggregator at any time.
#[derive(Debug)]
pub struct ChatStream {
    resp: Response,
    demux: LineDemux,
    queue: VecDeque<StreamItem>,
    raw: Vec<u8>,
    finished: bool,
}

impl ChatStream {
    fn new(resp: Response) -> Self {
        Self {
            resp,
            demux: LineDemux::new(),
            queue: VecDeque::new(),
            raw: vec![],
            finished: false,
        }
    }

    /// Waits for the next item. `Ok(None)` means the response is
    /// complete.
    pub async fn next_item(&mut self) -> Result<Option<StreamItem>, ClientError> {
        loop {
            if let Some(item) = self.queue.pop_front() {
                return Ok(Some(item));
            }
            if self.finished {
                return Ok(None);
            }
            match self.resp.chunk().await {
                Ok(Some(chunk)) => {
                    trace!(len = chunk.len(), "got a chunk");
                    self.raw.extend_from_slice(&chunk);
                    self.queue.extend(self.demux.push(&chunk));
                }
                Ok(None) => {
                    self.finished = true;
                    self.queue.extend(self.demux.finish());
                }
                Err(err) => {
                    self.finished = true;
                    self.queue.clear();
                    return Err(ClientError::Interrupted(err.to_string()));
                }
            }
        }
    }

    /// Returns everything received so far.
    #[inline]
    pub fn transcript(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }

    /// Reads the rest of the response and returns the full transcript.
    pub async fn finish(mut self) -> Result<String, ClientError> {
        while self.next_item().await?.is_some() {}
        Ok(self.transcript().into_owned())
    }
}
