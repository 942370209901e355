use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Version};

pub type BoxFuture<'a, T> = futures::future::BoxFuture<'a, T>;

/// Where a connection physically goes: the origin, or the proxy in front of it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteAddress {
    pub host: String,
    pub port: u16,
    /// Establish TLS as part of connecting.
    pub secure: bool,
}

impl RemoteAddress {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
        }
    }
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Serialized-ready request head
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// Origin form, absolute form or authority form (`CONNECT`).
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
}

#[derive(Debug, Clone)]
pub struct StatusLine {
    pub version: Version,
    pub status: StatusCode,
    pub reason: String,
}

/// A parsed inbound event
#[derive(Debug)]
pub enum WireEvent {
    Status(StatusLine),
    Headers(HeaderMap),
    Body(Bytes),
    /// The message is fully parsed.
    Complete,
    /// The codec rejected the response head.
    HeaderError(String),
    Error(io::Error),
    /// The peer closed the connection.
    Closed,
}

/// A live connection
///
/// `next_event` must be cancel safe: dropping the returned future before it
/// completes must not lose an event.
pub trait Connection: Send + Sync + fmt::Debug {
    /// Process-unique identifier.
    fn id(&self) -> u64;

    fn is_open(&self) -> bool;

    fn send_head<'a>(&'a self, head: &'a RequestHead) -> BoxFuture<'a, io::Result<()>>;

    /// Queue a body chunk. `last` terminates the body.
    fn send_body(&self, chunk: Bytes, last: bool) -> BoxFuture<'_, io::Result<()>>;

    /// True while queued outbound bytes are below the pending-bytes limit.
    fn can_write(&self) -> bool;

    /// Resolves once `can_write` would return true.
    fn writable(&self) -> BoxFuture<'_, ()>;

    fn next_event(&self) -> BoxFuture<'_, WireEvent>;

    /// Discard the rest of the current inbound message.
    fn skip_remainder(&self);

    /// Upgrade an established plain connection (a proxy tunnel) to TLS.
    fn start_tls<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<()>>;

    /// Close the connection. Idempotent.
    fn close(&self);

    fn max_pending_bytes(&self) -> usize;

    fn set_max_pending_bytes(&self, bytes: usize);

    /// Application protocol picked by the transport's own negotiation
    /// strategy (ALPN or similar), if any.
    fn negotiated_protocol(&self) -> Option<&str> {
        None
    }
}

/// Opens connections
pub trait Transport: Send + Sync + 'static {
    fn connect(&self, address: &RemoteAddress) -> BoxFuture<'static, io::Result<Arc<dyn Connection>>>;
}
