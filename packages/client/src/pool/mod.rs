//! Connection pool
//!
//! Idle connections are kept in one FIFO queue per [`EndpointKey`]. A
//! connection is owned by exactly one place at a time: a queue, or the
//! transaction that acquired it. Expired entries are removed under the queue
//! lock before they are closed, so a connection being evicted can never be
//! handed out.

pub mod core;
pub mod entry;
pub mod key;
pub mod reaper;

pub use self::core::{ConnectionPool, PoolSettings};
pub use entry::PooledConnection;
pub use key::EndpointKey;
