//! Builder methods for redirect, auth, proxy and filter configuration

use std::sync::Arc;

use super::types::HttpConfig;
use crate::auth::Realm;
use crate::proxy::ProxyServer;
use crate::txn::filter::ResponseFilter;

impl HttpConfig {
    /// Enable or disable automatic redirect following
    #[must_use]
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Set the maximum number of redirects for one logical request
    ///
    /// # Examples
    /// ```no_run
    /// use conduit_client::config::HttpConfig;
    ///
    /// let config = HttpConfig::default()
    ///     .with_follow_redirects(true)
    ///     .with_max_redirects(3);
    /// assert_eq!(config.max_redirects, 3);
    /// ```
    #[must_use]
    pub fn with_max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = max;
        self
    }

    #[must_use]
    pub fn with_remove_query_on_redirect(mut self, remove: bool) -> Self {
        self.remove_query_on_redirect = remove;
        self
    }

    #[must_use]
    pub fn with_strict_302_handling(mut self, strict: bool) -> Self {
        self.strict_302_handling = strict;
        self
    }

    /// Set how many times a request is replayed after hitting a stale pooled connection
    #[must_use]
    pub fn with_max_request_retry(mut self, retries: u32) -> Self {
        self.max_request_retry = retries;
        self
    }

    /// Route every request through `proxy` unless the request overrides it
    #[must_use]
    pub fn with_proxy(mut self, proxy: ProxyServer) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Default credentials for 401/407 challenges
    #[must_use]
    pub fn with_realm(mut self, realm: Realm) -> Self {
        self.realm = Some(realm);
        self
    }

    /// Append a response filter. Filters run in insertion order.
    #[must_use]
    pub fn with_response_filter(mut self, filter: Arc<dyn ResponseFilter>) -> Self {
        self.response_filters.push(filter);
        self
    }

    #[must_use]
    pub fn with_feeder_max_pending_bytes(mut self, bytes: usize) -> Self {
        self.feeder_max_pending_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
