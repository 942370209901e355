//! Connection acquisition
//!
//! Turns a request and its proxy into a usable connection: a pooled one when
//! available, otherwise a fresh one within the configured limits.

pub mod limiter;
pub mod manager;
pub mod tunnel;

pub use limiter::{CapacityLimiter, ConnectionPermit};
pub use manager::ConnectionManager;
