use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://backend.composio.dev/api/v3";
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_RETRY_ELAPSED: Duration = Duration::from_secs(10);

/// Builder for [`ComposioConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ComposioConfigBuilder {
    api_key: String,
    base_url: Option<String>,
    retry_interval: Option<Duration>,
    max_retry_elapsed: Option<Duration>,
}

impl ComposioConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            retry_interval: None,
            max_retry_elapsed: None,
        }
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets how transient listing failures are retried: the first retry
    /// waits `interval`, and no retry starts after `max_elapsed`.
    #[inline]
    pub fn with_retry_policy(
        mut self,
        interval: Duration,
        max_elapsed: Duration,
    ) -> Self {
        self.retry_interval = Some(interval);
        self.max_retry_elapsed = Some(max_elapsed);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ComposioConfig {
        let base_url = self
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_owned();
        ComposioConfig {
            api_key: self.api_key,
            base_url,
            retry_interval: self.retry_interval.unwrap_or(DEFAULT_RETRY_INTERVAL),
            max_retry_elapsed: self
                .max_retry_elapsed
                .unwrap_or(DEFAULT_RETRY_ELAPSED),
        }
    }
}

impl Debug for ComposioConfigBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposioConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Configuration for [`ComposioBroker`](crate::ComposioBroker).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ComposioConfig {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) retry_interval: Duration,
    pub(crate) max_retry_elapsed: Duration,
}

impl ComposioConfig {
    /// Returns the base URL, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[inline]
    pub(crate) fn tools_url(&self) -> String {
        format!("{}/tools", self.base_url)
    }

    #[inline]
    pub(crate) fn execute_url(&self, slug: &str) -> String {
        format!("{}/tools/execute/{slug}", self.base_url)
    }
}

impl Debug for ComposioConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposioConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("retry_interval", &self.retry_interval)
            .field("max_retry_elapsed", &self.max_retry_elapsed)
            .finish()
    }
}
