//! Connection pool configuration methods
//!
//! Provides builder methods for configuring connection limits and idle connection management.

use std::time::Duration;

use super::super::core::HttpConfig;

impl HttpConfig {
    /// Enable or disable connection reuse
    #[must_use]
    pub fn with_pooling(mut self, enabled: bool) -> Self {
        self.pooling_enabled = enabled;
        self
    }

    /// Allow or forbid pooling of `https` connections
    #[must_use]
    pub fn with_pool_secure_connections(mut self, enabled: bool) -> Self {
        self.pool_secure_connections = enabled;
        self
    }

    /// Set the maximum number of open connections across all destinations
    ///
    /// Once reached, acquisition fails fast with a capacity-exceeded error
    /// unless a pooled connection is available.
    ///
    /// # Examples
    /// ```no_run
    /// use conduit_client::config::HttpConfig;
    ///
    /// let config = HttpConfig::default()
    ///     .with_max_connections(Some(50));
    /// assert_eq!(config.max_connections, Some(50));
    /// ```
    #[must_use]
    pub fn with_max_connections(mut self, max: Option<usize>) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the maximum number of open connections per endpoint key
    #[must_use]
    pub fn with_max_connections_per_host(mut self, max: Option<usize>) -> Self {
        self.max_connections_per_host = max;
        self
    }

    /// Set the pool idle timeout
    ///
    /// Pooled connections untouched for longer than this are evicted and closed.
    ///
    /// # Examples
    /// ```no_run
    /// use std::time::Duration;
    /// use conduit_client::config::HttpConfig;
    ///
    /// let config = HttpConfig::default()
    ///     .with_pool_idle_timeout(Duration::from_secs(120));
    /// assert_eq!(config.pool_idle_timeout, Duration::from_secs(120));
    /// ```
    #[must_use]
    pub fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum total lifetime of a reusable connection
    #[must_use]
    pub fn with_max_connection_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_connection_lifetime = lifetime;
        self
    }

    /// Set the interval of the idle-eviction tick
    #[must_use]
    pub fn with_pool_cleaner_period(mut self, period: Duration) -> Self {
        self.pool_cleaner_period = period;
        self
    }
}
