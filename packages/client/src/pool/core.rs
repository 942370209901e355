//! Idle connection queues

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::entry::PooledConnection;
use super::key::EndpointKey;
use crate::client::stats::ClientStats;
use crate::config::HttpConfig;

/// Pool limits and timers
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub idle_timeout: Duration,
    pub max_lifetime: Option<Duration>,
    /// Maximum idle connections kept per key.
    pub max_idle_per_key: Option<usize>,
    pub pool_secure: bool,
    pub cleaner_period: Duration,
}

impl PoolSettings {
    #[must_use]
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            idle_timeout: config.pool_idle_timeout,
            max_lifetime: config.max_connection_lifetime,
            max_idle_per_key: config.max_connections_per_host,
            pool_secure: config.pool_secure_connections,
            cleaner_period: config.pool_cleaner_period,
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}

/// Per-endpoint queues of idle connections
#[derive(Debug)]
pub struct ConnectionPool {
    queues: DashMap<EndpointKey, VecDeque<PooledConnection>>,
    idle_total: AtomicUsize,
    closed: AtomicBool,
    settings: PoolSettings,
    stats: Arc<ClientStats>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionPool {
    #[must_use]
    pub fn new(settings: PoolSettings, stats: Arc<ClientStats>) -> Self {
        Self {
            queues: DashMap::new(),
            idle_total: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            settings,
            stats,
            reaper: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Start the background eviction tick on `handle`.
    pub fn start_reaper(self: &Arc<Self>, handle: &Handle) {
        let task = super::reaper::spawn(self, handle);
        if let Ok(mut slot) = self.reaper.lock()
            && let Some(previous) = slot.replace(task)
        {
            previous.abort();
        }
    }

    fn accepts(&self, key: &EndpointKey) -> bool {
        !key.is_secure() || self.settings.pool_secure
    }

    /// Pop a reusable, still-open connection for `key`.
    ///
    /// Expired and closed entries met along the way are removed and closed.
    pub fn acquire(&self, key: &EndpointKey) -> Option<PooledConnection> {
        if self.is_closed() || !self.accepts(key) {
            return None;
        }
        let now = Instant::now();
        let mut discarded = Vec::new();
        let found = {
            let mut queue = self.queues.get_mut(key)?;
            loop {
                let Some(entry) = queue.pop_front() else {
                    break None;
                };
                self.idle_total.fetch_sub(1, Ordering::AcqRel);
                let reason = if entry.is_open() {
                    entry.expiry(now, self.settings.idle_timeout, self.settings.max_lifetime)
                } else {
                    Some("closed while idle")
                };
                match reason {
                    Some(reason) => discarded.push((entry, reason)),
                    None => break Some(entry),
                }
            }
        };

        for (entry, reason) in discarded {
            tracing::debug!(target: "conduit::pool", key = %key, id = entry.id(), reason, "discarding pooled connection");
            self.close_entry(entry);
        }

        let mut entry = found?;
        entry.mark_checked_out();
        tracing::debug!(target: "conduit::pool", key = %key, id = entry.id(), "pooled connection acquired");
        Some(entry)
    }

    /// Offer a used connection back to the pool.
    ///
    /// Rejected connections are handed back so the caller can close them.
    ///
    /// # Errors
    ///
    /// Returns the connection if it is flagged do-not-cache, closed, past its
    /// lifetime, a secure connection while secure pooling is off, if the
    /// key's queue is full, or if the pool is shut down.
    pub fn release(&self, mut conn: PooledConnection) -> Result<(), PooledConnection> {
        let now = Instant::now();
        let rejection = if self.is_closed() {
            Some("pool closed")
        } else if !conn.is_cacheable() {
            Some("do-not-cache")
        } else if !conn.is_open() {
            Some("connection closed")
        } else if !self.accepts(conn.key()) {
            Some("secure pooling disabled")
        } else if conn.lifetime_exceeded(now, self.settings.max_lifetime) {
            Some("max lifetime")
        } else {
            None
        };
        if let Some(reason) = rejection {
            tracing::debug!(target: "conduit::pool", key = %conn.key(), id = conn.id(), reason, "connection not pooled");
            return Err(conn);
        }

        {
            let mut queue = self.queues.entry(conn.key().clone()).or_default();
            if let Some(max) = self.settings.max_idle_per_key
                && queue.len() >= max
            {
                tracing::debug!(target: "conduit::pool", key = %conn.key(), id = conn.id(), max, "pool queue full");
                return Err(conn);
            }
            conn.mark_idle(now);
            tracing::debug!(target: "conduit::pool", key = %conn.key(), id = conn.id(), "connection returned to pool");
            queue.push_back(conn);
            self.idle_total.fetch_add(1, Ordering::AcqRel);
        }

        // A shutdown that raced with the insert above must not strand it.
        if self.is_closed() {
            self.drain();
        }
        Ok(())
    }

    /// Remove the connection with `id` from whatever queue holds it and close it.
    pub fn evict(&self, id: u64) -> bool {
        let mut evicted = None;
        for mut queue in self.queues.iter_mut() {
            if let Some(pos) = queue.iter().position(|c| c.id() == id) {
                evicted = queue.remove(pos);
                break;
            }
        }
        match evicted {
            Some(entry) => {
                self.idle_total.fetch_sub(1, Ordering::AcqRel);
                tracing::debug!(target: "conduit::pool", id, "connection evicted");
                self.close_entry(entry);
                true
            }
            None => false,
        }
    }

    /// Remove and close every idle entry past its idle timeout or lifetime.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut expired = Vec::new();
        for mut queue in self.queues.iter_mut() {
            let mut kept = VecDeque::with_capacity(queue.len());
            while let Some(entry) = queue.pop_front() {
                let reason = if entry.is_open() {
                    entry.expiry(now, self.settings.idle_timeout, self.settings.max_lifetime)
                } else {
                    Some("closed while idle")
                };
                match reason {
                    Some(reason) => expired.push((entry, reason)),
                    None => kept.push_back(entry),
                }
            }
            *queue = kept;
        }
        self.queues.retain(|_, queue| !queue.is_empty());

        let count = expired.len();
        for (entry, reason) in expired {
            self.idle_total.fetch_sub(1, Ordering::AcqRel);
            tracing::debug!(target: "conduit::pool", key = %entry.key(), id = entry.id(), reason, "evicting idle connection");
            self.close_entry(entry);
        }
        count
    }

    /// Close every idle connection and refuse further offers. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Ok(mut slot) = self.reaper.lock()
            && let Some(task) = slot.take()
        {
            task.abort();
        }
        let drained = self.drain();
        tracing::debug!(target: "conduit::pool", drained, "connection pool shut down");
    }

    fn drain(&self) -> usize {
        let mut all = Vec::new();
        for mut queue in self.queues.iter_mut() {
            all.extend(queue.drain(..));
        }
        self.queues.clear();
        let count = all.len();
        for entry in all {
            self.idle_total.fetch_sub(1, Ordering::AcqRel);
            self.close_entry(entry);
        }
        count
    }

    fn close_entry(&self, entry: PooledConnection) {
        self.stats.record_connection_closed();
        entry.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Total idle connections across all keys.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle_total.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn idle_count_for(&self, key: &EndpointKey) -> usize {
        self.queues.get(key).map_or(0, |q| q.len())
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
