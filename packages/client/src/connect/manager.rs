//! Pooled-or-fresh connection acquisition

use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;

use crate::client::stats::ClientStats;
use crate::config::HttpConfig;
use crate::error::{self, TimedOut};
use crate::http::Request;
use crate::pool::{ConnectionPool, EndpointKey, PooledConnection};
use crate::proxy::ProxyServer;
use crate::transport::{RemoteAddress, Transport};

use super::limiter::CapacityLimiter;
use super::tunnel;

/// Hands out connections for requests and takes them back
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    pool: Arc<ConnectionPool>,
    limiter: Arc<CapacityLimiter>,
    config: Arc<HttpConfig>,
    stats: Arc<ClientStats>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("pool", &self.pool)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        pool: Arc<ConnectionPool>,
        config: Arc<HttpConfig>,
        stats: Arc<ClientStats>,
    ) -> Self {
        let limiter = CapacityLimiter::new(config.max_connections, config.max_connections_per_host);
        Self {
            transport,
            pool,
            limiter,
            config,
            stats,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    #[must_use]
    pub fn limiter(&self) -> &Arc<CapacityLimiter> {
        &self.limiter
    }

    /// Obtain a connection for `request`, going through `proxy` if given.
    ///
    /// A pooled connection found dead is discarded and the pool is tried
    /// once more. With nothing pooled and a limit reached this fails at once
    /// with a capacity error; requests are never queued. Every connection
    /// returned is flagged do-not-cache until a response clears it.
    ///
    /// # Errors
    ///
    /// Capacity exceeded, connect failure, a failed tunnel, or the connect
    /// timeout elapsing before the connection (and its tunnel) is ready.
    pub async fn obtain(&self, request: &Request, proxy: Option<&ProxyServer>) -> crate::Result<PooledConnection> {
        let key = EndpointKey::new(request.url(), proxy, request.partition())?;

        if self.config.pooling_enabled {
            for _ in 0..2 {
                match self.pool.acquire(&key) {
                    Some(conn) if conn.is_open() => {
                        self.stats.record_pool_hit();
                        return Ok(conn);
                    }
                    Some(dead) => {
                        tracing::debug!(target: "conduit::connect", key = %key, id = dead.id(), "pooled connection died, retrying pool");
                        self.discard(dead);
                    }
                    None => break,
                }
            }
        }
        self.stats.record_pool_miss();

        let permit = self.limiter.try_acquire(&key).map_err(|reason| {
            tracing::debug!(target: "conduit::connect", key = %key, reason, "connection refused by limiter");
            error::capacity_exceeded(reason).with_url(request.url().clone())
        })?;

        let address = match proxy {
            Some(proxy) => proxy.address(),
            None => RemoteAddress::new(key.host(), key.port(), key.is_secure()),
        };
        // One deadline covers the connect and any CONNECT tunnel behind it.
        let deadline = Instant::now() + self.config.connect_timeout;
        let connecting = self.transport.connect(&address);
        let conn = match tokio::time::timeout_at(deadline, connecting).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                self.stats.record_connection_failure();
                tracing::debug!(target: "conduit::connect", %address, error = %e, "connect failed");
                return Err(error::connect(e).with_url(request.url().clone()));
            }
            Err(_) => {
                self.stats.record_connection_failure();
                tracing::debug!(target: "conduit::connect", %address, timeout = ?self.config.connect_timeout, "connect timed out");
                return Err(error::connect(TimedOut).with_url(request.url().clone()));
            }
        };
        self.stats.record_connection_opened();

        let mut pooled = PooledConnection::new(conn, key, Some(permit));
        if pooled.key().is_secure()
            && let Some(proxy) = proxy
        {
            let tunneled = tokio::time::timeout_at(deadline, tunnel::establish(&pooled, proxy, &self.config.user_agent))
                .await
                .unwrap_or_else(|_| {
                    tracing::debug!(target: "conduit::connect", %address, timeout = ?self.config.connect_timeout, "proxy CONNECT timed out");
                    Err(error::connect(TimedOut))
                });
            if let Err(e) = tunneled {
                self.discard(pooled);
                return Err(e.with_url(request.url().clone()));
            }
            pooled.mark_tunneled();
        }

        tracing::debug!(target: "conduit::connect", key = %pooled.key(), id = pooled.id(), "new connection");
        Ok(pooled)
    }

    /// Return a connection after a completed exchange; closes it if the
    /// pool refuses it.
    pub fn release(&self, conn: PooledConnection) {
        if !self.config.pooling_enabled {
            self.discard(conn);
            return;
        }
        if let Err(rejected) = self.pool.release(conn) {
            self.discard(rejected);
        }
    }

    /// Close a connection without offering it to the pool.
    pub fn discard(&self, conn: PooledConnection) {
        self.stats.record_connection_closed();
        conn.close();
    }
}
