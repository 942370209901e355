//! Core HTTP configuration structure and field definitions
//!
//! Contains the main HttpConfig struct with every knob consumed by the
//! transaction engine: timeouts, pool limits, redirect and auth behaviour,
//! proxying and response filters.

use std::time::Duration;

use crate::auth::Realm;
use crate::proxy::ProxyServer;
use crate::txn::filter::ResponseFilters;

/// HTTP client configuration
///
/// Central configuration struct shared (behind an `Arc`) by the pool, the
/// connection manager and every transaction driver.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout, applied to each connect attempt
    pub connect_timeout: Duration,

    /// Whole-request timeout measured from dispatch. `None` disables it.
    pub request_timeout: Option<Duration>,

    /// Maximum silence between two wire events of an in-flight response
    pub read_idle_timeout: Option<Duration>,

    /// How long a body feeder may block waiting for write-queue capacity
    pub write_timeout: Duration,

    /// Whether released connections may be kept for reuse
    pub pooling_enabled: bool,

    /// Whether `https` endpoints participate in pooling
    pub pool_secure_connections: bool,

    /// Idle time after which a pooled connection is evicted
    pub pool_idle_timeout: Duration,

    /// Total lifetime after which a connection is never reused. `None` is unlimited.
    pub max_connection_lifetime: Option<Duration>,

    /// Interval of the background idle-eviction tick
    pub pool_cleaner_period: Duration,

    /// Cap on open connections across all destinations. `None` is unlimited.
    pub max_connections: Option<usize>,

    /// Cap on open connections for one endpoint key. `None` is unlimited.
    pub max_connections_per_host: Option<usize>,

    /// Follow 301/302/303/307/308 responses automatically
    pub follow_redirects: bool,

    /// Maximum number of redirect hops for one logical request
    pub max_redirects: u32,

    /// Drop the query string when following a redirect
    pub remove_query_on_redirect: bool,

    /// Keep the original method on 302 instead of switching to GET
    pub strict_302_handling: bool,

    /// Times a request is replayed after a pooled connection proved stale
    pub max_request_retry: u32,

    /// Proxy used for every request that does not override it
    pub proxy: Option<ProxyServer>,

    /// Credentials used for every request that does not carry its own realm
    pub realm: Option<Realm>,

    /// Ordered response filters, run once per response after headers
    pub response_filters: ResponseFilters,

    /// Default backpressure threshold of a feedable body
    pub feeder_max_pending_bytes: usize,

    /// User agent string added when a request has none
    pub user_agent: String,
}
