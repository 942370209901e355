//! Global and per-endpoint open connection limits

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::pool::EndpointKey;

/// Counts open connections and refuses new ones past the configured maxima
///
/// Idle pooled connections count as open: they still hold a socket.
#[derive(Debug)]
pub struct CapacityLimiter {
    max_total: Option<usize>,
    max_per_key: Option<usize>,
    total: AtomicUsize,
    per_key: DashMap<EndpointKey, Arc<AtomicUsize>>,
}

/// One unit of capacity, returned when dropped
#[derive(Debug)]
pub struct ConnectionPermit {
    limiter: Arc<CapacityLimiter>,
    key_count: Arc<AtomicUsize>,
}

fn try_increment(counter: &AtomicUsize, max: Option<usize>) -> bool {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match max {
            Some(max) if n >= max => None,
            _ => Some(n + 1),
        })
        .is_ok()
}

impl CapacityLimiter {
    #[must_use]
    pub fn new(max_total: Option<usize>, max_per_key: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            max_total,
            max_per_key,
            total: AtomicUsize::new(0),
            per_key: DashMap::new(),
        })
    }

    /// Reserve capacity for one new connection to `key`.
    ///
    /// # Errors
    ///
    /// Returns a short reason when the global or per-key limit is reached.
    pub fn try_acquire(self: &Arc<Self>, key: &EndpointKey) -> Result<ConnectionPermit, &'static str> {
        if !try_increment(&self.total, self.max_total) {
            return Err("maximum number of connections reached");
        }
        let key_count = self.per_key.entry(key.clone()).or_default().clone();
        if !try_increment(&key_count, self.max_per_key) {
            self.total.fetch_sub(1, Ordering::AcqRel);
            return Err("maximum number of connections per host reached");
        }
        Ok(ConnectionPermit {
            limiter: Arc::clone(self),
            key_count,
        })
    }

    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn open_connections_for(&self, key: &EndpointKey) -> usize {
        self.per_key.get(key).map_or(0, |c| c.load(Ordering::Acquire))
    }
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.key_count.fetch_sub(1, Ordering::AcqRel);
        self.limiter.total.fetch_sub(1, Ordering::AcqRel);
    }
}
