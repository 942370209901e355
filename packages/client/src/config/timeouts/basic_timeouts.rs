//! Basic timeout configuration methods
//!
//! Provides builder methods for configuring request, connect, read and write timeouts.

use std::time::Duration;

use super::super::core::HttpConfig;

impl HttpConfig {
    /// Set the request timeout
    ///
    /// Measured from the moment a request is dispatched on a connection until the
    /// response completes. The deadline is recomputed for every replayed attempt.
    ///
    /// # Examples
    /// ```no_run
    /// use std::time::Duration;
    /// use conduit_client::config::HttpConfig;
    ///
    /// let config = HttpConfig::default()
    ///     .with_request_timeout(Some(Duration::from_secs(30)));
    /// assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
    /// ```
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connection timeout
    ///
    /// Bounds a single connect attempt, tunnel handshake excluded.
    ///
    /// # Examples
    /// ```no_run
    /// use std::time::Duration;
    /// use conduit_client::config::HttpConfig;
    ///
    /// let config = HttpConfig::default()
    ///     .with_connect_timeout(Duration::from_secs(2));
    /// assert_eq!(config.connect_timeout, Duration::from_secs(2));
    /// ```
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the maximum silence between two wire events of a response
    #[must_use]
    pub fn with_read_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_idle_timeout = timeout;
        self
    }

    /// Set how long a body feeder may block on a full write queue
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}
