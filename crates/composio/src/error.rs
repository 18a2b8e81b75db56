use agent_studio_core::tool;
use reqwest::StatusCode;

/// Errors returned by [`ComposioBroker`](crate::ComposioBroker).
#[derive(Debug, thiserror::Error)]
pub enum ComposioError {
    /// The request could not be sent or its body could not be read.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// The response status.
        status: StatusCode,
        /// The message extracted from the error body.
        message: String,
    },
    /// The response body is not what was expected.
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    /// An endpoint URL could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// The tool ran and reported a failure.
    #[error("{0}")]
    Execution(String),
}

impl ComposioError {
    /// Returns `true` if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ComposioError::Request(err) => err.is_connect() || err.is_timeout(),
            ComposioError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl From<ComposioError> for tool::Error {
    fn from(err: ComposioError) -> Self {
        let base = match &err {
            ComposioError::Status { status, .. } if *status == StatusCode::NOT_FOUND => {
                tool::Error::not_found()
            }
            ComposioError::Execution(message) => {
                return tool::Error::execution_error().with_reason(message.clone());
            }
            _ if err.is_transient() => tool::Error::unavailable(),
            _ => tool::Error::execution_error(),
        };
        base.with_reason(err.to_string())
    }
}
