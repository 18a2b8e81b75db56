//! Server configuration read from the environment.

use std::env;
use std::net::SocketAddr;

use agent_studio_composio::{ComposioConfig, ComposioConfigBuilder};
use agent_studio_core::tool::ProgressStyle;
use agent_studio_openai_model::{OpenAIConfig, OpenAIConfigBuilder};

const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_STREAM_BUFFER: usize = 64;

/// Errors found while reading the server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The bind address cannot be parsed.
    #[error("invalid AGENT_STUDIO_ADDR {value:?}: {source}")]
    InvalidAddr {
        /// The configured value.
        value: String,
        /// The parse error.
        source: std::net::AddrParseError,
    },
    /// The progress style is unknown.
    #[error("invalid AGENT_STUDIO_PROGRESS: {0}")]
    InvalidProgressStyle(String),
    /// The stream buffer is not a positive integer.
    #[error("invalid AGENT_STUDIO_STREAM_BUFFER {0:?}")]
    InvalidStreamBuffer(String),
}

/// The configuration of the chat server.
///
/// Missing API keys are not an error here: the server starts anyway and
/// reports them on every chat request.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// The address to listen on.
    pub addr: SocketAddr,
    /// The model provider, if its key is set.
    pub openai: Option<OpenAIConfig>,
    /// The tool broker, if its key is set.
    pub composio: Option<ComposioConfig>,
    /// An optional system prompt for every turn.
    pub system_prompt: Option<String>,
    /// How tool progress is written to the stream.
    pub progress_style: ProgressStyle,
    /// How many chunks may be buffered per response.
    pub stream_buffer: usize,
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let addr = get("AGENT_STUDIO_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_owned());
        let addr: SocketAddr = addr
            .trim()
            .parse()
            .map_err(|source| ConfigError::InvalidAddr {
                value: addr.clone(),
                source,
            })?;

        let openai = get("OPENAI_API_KEY").map(|api_key| {
            let mut builder = OpenAIConfigBuilder::with_api_key(api_key);
            if let Some(base_url) = get("OPENAI_BASE_URL") {
                builder = builder.with_base_url(base_url);
            }
            if let Some(model) = get("OPENAI_MODEL") {
                builder = builder.with_model(model);
            }
            builder.build()
        });

        let composio = get("COMPOSIO_API_KEY").map(|api_key| {
            let mut builder = ComposioConfigBuilder::with_api_key(api_key);
            if let Some(base_url) = get("COMPOSIO_BASE_URL") {
                builder = builder.with_base_url(base_url);
            }
            builder.build()
        });

        let progress_style = match get("AGENT_STUDIO_PROGRESS") {
            Some(style) => style.parse().map_err(ConfigError::InvalidProgressStyle)?,
            None => ProgressStyle::default(),
        };

        let stream_buffer = match get("AGENT_STUDIO_STREAM_BUFFER") {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => return Err(ConfigError::InvalidStreamBuffer(value)),
            },
            None => DEFAULT_STREAM_BUFFER,
        };

        Ok(Self {
            addr,
            openai,
            composio,
            system_prompt: get("AGENT_STUDIO_SYSTEM_PROMPT"),
            progress_style,
            stream_buffer,
        })
    }
}
