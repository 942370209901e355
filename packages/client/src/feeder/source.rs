//! Pull-style request body

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures::Stream;

use crate::error::BoxError;

pub(crate) type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// Request body polled from a stream
///
/// End of stream is the "no more data" signal. The stream can be consumed
/// once; clones share it.
#[derive(Clone)]
pub struct BodySource {
    stream: Arc<Mutex<Option<ChunkStream>>>,
}

impl BodySource {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        Self {
            stream: Arc::new(Mutex::new(Some(Box::pin(stream)))),
        }
    }

    /// Source yielding the given chunks in order.
    #[must_use]
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        Self::new(futures::stream::iter(chunks.into_iter().map(Ok)))
    }

    pub(crate) fn take(&self) -> Option<ChunkStream> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl fmt::Debug for BodySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodySource").finish_non_exhaustive()
    }
}
