//! Service configuration
//!
//! A [`Config`] is built once at startup and shared read-only by every
//! request.

use crate::DEFAULT_USER_AGENT;
use std::path::PathBuf;
use std::time::Duration;

/// Timeout for the upstream HTTP request (connect + full body)
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Envelope around fetch + decode + convert
pub const CONVERSION_TIMEOUT: Duration = Duration::from_secs(25);

/// Largest body the fetcher will buffer
pub const MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024;

/// Granularity of the streaming size check
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Immutable pipeline configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream request timeout
    pub request_timeout: Duration,
    /// Overall conversion timeout
    pub conversion_timeout: Duration,
    /// Maximum number of body bytes to download
    pub max_content_size: usize,
    /// User-Agent sent upstream
    pub user_agent: String,
    /// Chunk size for the streaming size check
    pub chunk_size: usize,
    /// Directory for HTML temp files (OS default when `None`)
    pub temp_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: REQUEST_TIMEOUT,
            conversion_timeout: CONVERSION_TIMEOUT,
            max_content_size: MAX_CONTENT_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chunk_size: CHUNK_SIZE,
            temp_dir: None,
        }
    }
}

impl Config {
    /// Start a builder from the defaults
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for [`Config`]
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set upstream request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set overall conversion timeout
    pub fn conversion_timeout(mut self, timeout: Duration) -> Self {
        self.config.conversion_timeout = timeout;
        self
    }

    /// Set body size limit in bytes
    pub fn max_content_size(mut self, bytes: usize) -> Self {
        self.config.max_content_size = bytes;
        self
    }

    /// Set custom User-Agent
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    /// Set chunk size; zero is clamped to one byte
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = bytes.max(1);
        self
    }

    /// Create HTML temp files in `dir`
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    /// Build the config
    pub fn build(self) -> Config {
        self.config
    }
}
