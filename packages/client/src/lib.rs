//! # conduit_client
//!
//! Asynchronous HTTP transaction engine. A request submitted to
//! [`HttpClient`] becomes a transaction driven on a Tokio runtime: a
//! connection is taken from the pool or opened through a [`Transport`],
//! the request head and body are written with backpressure, and parsed
//! wire events are turned into [`AsyncHandler`] callbacks. Redirects,
//! authentication challenges, response filters and stale pooled
//! connections may replay the request on the same transaction.
//!
//! ## Features
//!
//! - **Connection pooling** per endpoint key with idle, lifetime and
//!   per-host limits, plus a background idle reaper
//! - **Capacity limits** that fail fast instead of queueing
//! - **Redirect and auth replay** with cross-origin header scrubbing
//! - **Feedable bodies** pushed by a producer under a write-queue budget
//! - **Cancellation** through the returned [`ResponseFuture`]
//!
//! Byte-level framing lives behind the [`Transport`] and [`Connection`]
//! traits; the engine only sees [`WireEvent`]s.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use conduit_client::{HttpClient, HttpConfig, Request};
//!
//! let client = HttpClient::new(
//!     HttpConfig::default().with_follow_redirects(true),
//!     Arc::new(MyTransport::default()),
//! )?;
//! let response = client
//!     .fetch(Request::get("http://example.com/").build()?)
//!     .await?;
//! println!("{} {}", response.status(), response.text());
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod auth;
pub mod client;
pub mod config;
pub mod connect;
pub mod error;
pub mod feeder;
pub mod http;
pub mod pool;
pub mod proxy;
pub mod redirect;
pub mod status;
pub mod transport;
pub mod txn;

pub use crate::auth::{AuthScheme, Authenticator, Realm};
pub use crate::client::{ClientStats, ClientStatsSnapshot, HttpClient, HttpClientBuilder};
pub use crate::config::HttpConfig;
pub use crate::error::{BoxError, Error, Kind, Result};
pub use crate::feeder::{BodySource, FeedError, FeedableBody};
pub use crate::http::{Body, BodyPart, Request, RequestBuilder, Response, ResponseHeaders, ResponseStatus};
pub use crate::proxy::{ProxyBypass, ProxyServer};
pub use crate::transport::{Connection, RemoteAddress, RequestHead, StatusLine, Transport, WireEvent};
pub use crate::txn::{AsyncHandler, FilterContext, ResponseFilter, ResponseFuture, State};
