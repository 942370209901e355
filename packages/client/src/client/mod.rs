//! HTTP client entry points
//!
//! `HttpClient` submits requests; `HttpClientBuilder` assembles one;
//! `ClientStats` counts what happened.

pub mod configuration;
pub mod core;
pub mod stats;

pub(crate) use core::ClientInner;
pub use configuration::HttpClientBuilder;
pub use core::HttpClient;
pub use stats::{ClientStats, ClientStatsSnapshot};
