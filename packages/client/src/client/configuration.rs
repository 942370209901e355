//! Client construction

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use super::HttpClient;
use crate::config::HttpConfig;
use crate::proxy::ProxyServer;
use crate::transport::Transport;

/// Builder for [`HttpClient`]
///
/// Shortcut setters for the common knobs; anything else goes through
/// [`HttpClientBuilder::config`].
pub struct HttpClientBuilder {
    config: HttpConfig,
    transport: Arc<dyn Transport>,
    runtime: Option<Handle>,
}

impl HttpClientBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            config: HttpConfig::default(),
            transport,
            runtime: None,
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_connections_per_host(mut self, max: usize) -> Self {
        self.config.max_connections_per_host = Some(max);
        self
    }

    #[must_use]
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    #[must_use]
    pub fn proxy(mut self, proxy: ProxyServer) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// # Errors
    ///
    /// Invalid configuration, or no runtime given and none in context.
    pub fn build(self) -> crate::Result<HttpClient> {
        match self.runtime {
            Some(runtime) => HttpClient::with_runtime(self.config, self.transport, runtime),
            None => HttpClient::new(self.config, self.transport),
        }
    }
}

impl std::fmt::Debug for HttpClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClientBuilder")
            .field("config", &self.config)
            .field("runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}
