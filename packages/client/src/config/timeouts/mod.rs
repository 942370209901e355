//! Timeout and connection-pool configuration methods

pub mod basic_timeouts;
pub mod connection_pool;
