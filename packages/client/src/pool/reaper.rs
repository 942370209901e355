//! Background idle eviction
//!
//! Runs on the pool's cleaner period and holds only a weak reference, so the
//! task ends by itself once the pool is dropped or shut down.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::core::ConnectionPool;

pub(crate) fn spawn(pool: &Arc<ConnectionPool>, handle: &Handle) -> JoinHandle<()> {
    let weak = Arc::downgrade(pool);
    let period = pool.settings().cleaner_period;
    handle.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(pool) = weak.upgrade() else {
                break;
            };
            if pool.is_closed() {
                break;
            }
            let evicted = pool.evict_expired();
            if evicted > 0 {
                tracing::debug!(target: "conduit::pool", evicted, "idle eviction tick");
            }
        }
    })
}
