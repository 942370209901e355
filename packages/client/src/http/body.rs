//! Outbound request bodies

use std::fmt;

use bytes::Bytes;

use crate::feeder::{BodySource, FeedableBody};

/// Request body
///
/// Only `Empty` and `Bytes` bodies can be sent more than once. Redirect,
/// authentication and stale-connection replays of a streamed body are
/// refused and the response is handed to the caller instead.
#[derive(Clone, Default)]
pub enum Body {
    /// No body
    #[default]
    Empty,
    /// Fully buffered payload
    Bytes(Bytes),
    /// Push-style body fed incrementally by the caller
    Feed(FeedableBody),
    /// Pull-style body polled by the writer
    Stream(BodySource),
}

impl Body {
    /// True if the body can be written again on a replayed attempt.
    #[must_use]
    pub fn is_replayable(&self) -> bool {
        matches!(self, Body::Empty | Body::Bytes(_))
    }

    /// True if there is no payload at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Bytes(bytes) => bytes.is_empty(),
            Body::Feed(_) | Body::Stream(_) => false,
        }
    }

    /// Payload length when it is known up front.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        match self {
            Body::Empty => Some(0),
            Body::Bytes(bytes) => Some(bytes.len() as u64),
            Body::Feed(_) | Body::Stream(_) => None,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Bytes(bytes) => f
                .debug_tuple("Bytes")
                .field(&format!("{} bytes", bytes.len()))
                .finish(),
            Body::Feed(_) => f.write_str("Feed"),
            Body::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Bytes(Bytes::from(text))
    }
}

impl From<FeedableBody> for Body {
    fn from(feed: FeedableBody) -> Self {
        Body::Feed(feed)
    }
}

impl From<BodySource> for Body {
    fn from(source: BodySource) -> Self {
        Body::Stream(source)
    }
}
