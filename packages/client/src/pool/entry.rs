//! Pooled connection entry and its per-connection state

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::key::EndpointKey;
use crate::connect::limiter::ConnectionPermit;
use crate::transport::Connection;

/// State the pool and the dispatcher attach to one physical connection
#[derive(Debug, Clone)]
pub struct ConnectionState {
    /// Set on creation and by `Connection: close`; cleared once a response
    /// proves the connection reusable.
    pub do_not_cache: bool,
    pub created_at: Instant,
    pub idle_since: Instant,
    /// Obtained from the pool rather than freshly connected.
    pub reused: bool,
    /// Carries a `CONNECT` tunnel through a proxy.
    pub tunneled: bool,
}

/// A connection plus its pool bookkeeping
///
/// Not `Clone`: whoever holds the value owns the connection. Dropping it
/// releases its share of the connection limits.
#[derive(Debug)]
pub struct PooledConnection {
    conn: Arc<dyn Connection>,
    key: EndpointKey,
    state: ConnectionState,
    _permit: Option<ConnectionPermit>,
}

impl PooledConnection {
    /// Wrap a freshly established connection. It starts out transient.
    pub(crate) fn new(conn: Arc<dyn Connection>, key: EndpointKey, permit: Option<ConnectionPermit>) -> Self {
        let now = Instant::now();
        Self {
            conn,
            key,
            state: ConnectionState {
                do_not_cache: true,
                created_at: now,
                idle_since: now,
                reused: false,
                tunneled: false,
            },
            _permit: permit,
        }
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    #[must_use]
    pub fn key(&self) -> &EndpointKey {
        &self.key
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.conn.id()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.conn.is_open()
    }

    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        !self.state.do_not_cache
    }

    pub fn set_cacheable(&mut self, cacheable: bool) {
        self.state.do_not_cache = !cacheable;
    }

    #[must_use]
    pub fn is_reused(&self) -> bool {
        self.state.reused
    }

    pub(crate) fn mark_tunneled(&mut self) {
        self.state.tunneled = true;
    }

    pub(crate) fn mark_idle(&mut self, now: Instant) {
        self.state.idle_since = now;
    }

    pub(crate) fn mark_checked_out(&mut self) {
        self.state.reused = true;
        self.state.do_not_cache = true;
    }

    /// Why this entry may no longer be handed out, if it has expired.
    ///
    /// Idle time and total lifetime are checked independently; whichever
    /// limit is hit first applies.
    #[must_use]
    pub fn expiry(&self, now: Instant, idle_timeout: Duration, max_lifetime: Option<Duration>) -> Option<&'static str> {
        if now.saturating_duration_since(self.state.idle_since) > idle_timeout {
            return Some("idle timeout");
        }
        if self.lifetime_exceeded(now, max_lifetime) {
            return Some("max lifetime");
        }
        None
    }

    #[must_use]
    pub fn lifetime_exceeded(&self, now: Instant, max_lifetime: Option<Duration>) -> bool {
        max_lifetime.is_some_and(|max| now.saturating_duration_since(self.state.created_at) > max)
    }

    /// Close the connection and release its capacity.
    pub fn close(self) {
        self.conn.close();
    }

    /// Give up ownership without closing, e.g. for a protocol upgrade.
    /// The connection no longer counts against the limits.
    #[must_use]
    pub fn detach(self) -> Arc<dyn Connection> {
        self.conn
    }
}
