//! Outbound body feeding
//!
//! Producers and the connection writer are decoupled by a bounded queue.
//! A producer calling [`FeedableBody::feed`] may block its own thread when the
//! queue is over its byte limit; the writer side only ever awaits, so the
//! I/O runtime is never blocked.

pub mod feedable;
pub mod source;
pub(crate) mod writer;

pub use feedable::{FeedError, FeedableBody};
pub use source::BodySource;
