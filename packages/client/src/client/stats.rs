//! Client statistics with cache-padded atomic counters
//!
//! Counters are updated from every transaction task and the pool reaper;
//! each sits on its own cache line so concurrent updates do not contend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;

/// Live counters shared by the client, the connection manager and the pool
#[derive(Debug)]
pub struct ClientStats {
    /// Logical requests submitted
    pub requests_total: CachePadded<AtomicU64>,
    /// Transactions that completed through `on_completed`
    pub requests_successful: CachePadded<AtomicU64>,
    /// Transactions that ended with an error
    pub requests_failed: CachePadded<AtomicU64>,
    pub redirects_followed: CachePadded<AtomicU64>,
    pub auth_retries: CachePadded<AtomicU64>,
    /// Replays after a pooled connection turned out to be stale
    pub request_retries: CachePadded<AtomicU64>,
    pub pool_hits: CachePadded<AtomicU64>,
    pub pool_misses: CachePadded<AtomicU64>,
    pub connections_opened: CachePadded<AtomicU64>,
    pub connections_closed: CachePadded<AtomicU64>,
    pub connections_failed: CachePadded<AtomicU64>,
    /// Request body bytes written
    pub bytes_sent: CachePadded<AtomicU64>,
    /// Response body bytes read, including drained bodies
    pub bytes_received: CachePadded<AtomicU64>,
    pub created_at: Instant,
}

impl Default for ClientStats {
    fn default() -> Self {
        Self::new()
    }
}

fn counter() -> CachePadded<AtomicU64> {
    CachePadded::new(AtomicU64::new(0))
}

fn bump(counter: &CachePadded<AtomicU64>) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl ClientStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests_total: counter(),
            requests_successful: counter(),
            requests_failed: counter(),
            redirects_followed: counter(),
            auth_retries: counter(),
            request_retries: counter(),
            pool_hits: counter(),
            pool_misses: counter(),
            connections_opened: counter(),
            connections_closed: counter(),
            connections_failed: counter(),
            bytes_sent: counter(),
            bytes_received: counter(),
            created_at: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        bump(&self.requests_total);
    }

    pub fn record_success(&self) {
        bump(&self.requests_successful);
    }

    pub fn record_failure(&self) {
        bump(&self.requests_failed);
    }

    pub fn record_redirect(&self) {
        bump(&self.redirects_followed);
    }

    pub fn record_auth_retry(&self) {
        bump(&self.auth_retries);
    }

    pub fn record_request_retry(&self) {
        bump(&self.request_retries);
    }

    pub fn record_pool_hit(&self) {
        bump(&self.pool_hits);
    }

    pub fn record_pool_miss(&self) {
        bump(&self.pool_misses);
    }

    pub fn record_connection_opened(&self) {
        bump(&self.connections_opened);
    }

    /// Record a connection leaving the client's ownership (closed or handed
    /// to an upgrade handler).
    pub fn record_connection_closed(&self) {
        bump(&self.connections_closed);
    }

    pub fn record_connection_failure(&self) {
        bump(&self.connections_failed);
    }

    pub fn record_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Time since the client was built.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Consistent-enough copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> ClientStatsSnapshot {
        let load = |c: &CachePadded<AtomicU64>| c.load(Ordering::Relaxed);
        ClientStatsSnapshot {
            requests_total: load(&self.requests_total),
            requests_successful: load(&self.requests_successful),
            requests_failed: load(&self.requests_failed),
            redirects_followed: load(&self.redirects_followed),
            auth_retries: load(&self.auth_retries),
            request_retries: load(&self.request_retries),
            pool_hits: load(&self.pool_hits),
            pool_misses: load(&self.pool_misses),
            connections_opened: load(&self.connections_opened),
            connections_closed: load(&self.connections_closed),
            connections_failed: load(&self.connections_failed),
            bytes_sent: load(&self.bytes_sent),
            bytes_received: load(&self.bytes_received),
            age: self.age(),
        }
    }
}

/// Snapshot of client statistics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStatsSnapshot {
    pub requests_total: u64,
    pub requests_successful: u64,
    pub requests_failed: u64,
    pub redirects_followed: u64,
    pub auth_retries: u64,
    pub request_retries: u64,
    pub pool_hits: u64,
    pub pool_misses: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub connections_failed: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub age: Duration,
}

impl ClientStatsSnapshot {
    /// Connections opened and not yet closed.
    #[must_use]
    pub fn connections_active(&self) -> u64 {
        self.connections_opened.saturating_sub(self.connections_closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = ClientStats::new();
        stats.record_request();
        stats.record_connection_opened();
        stats.record_connection_opened();
        stats.record_connection_closed();
        stats.record_bytes_sent(42);
        let snap = stats.snapshot();
        assert_eq!(snap.requests_total, 1);
        assert_eq!(snap.connections_active(), 1);
        assert_eq!(snap.bytes_sent, 42);
    }
}
