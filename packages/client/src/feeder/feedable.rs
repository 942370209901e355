//! Push-style request body

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Notify;

/// Default bound on bytes queued but not yet handed to the connection.
pub const DEFAULT_MAX_QUEUED_BYTES: usize = 64 * 1024;

/// Default time a producer may wait for queue space.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors returned to the producing side
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("write queue did not drain within {0:?}")]
    WriteTimeout(Duration),
    #[error("the last chunk was already fed")]
    AlreadyFinished,
    #[error("the transaction is no longer accepting body data")]
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    TimedOut,
    Aborted,
}

#[derive(Debug)]
struct Queue {
    chunks: VecDeque<(Bytes, bool)>,
    queued_bytes: usize,
    bytes_fed: u64,
    last_fed: bool,
    failure: Option<Failure>,
    write_timeout: Duration,
    /// Set by the producer; the client's write timeout no longer applies.
    write_timeout_fixed: bool,
}

#[derive(Debug)]
struct Shared {
    queue: Mutex<Queue>,
    space: Condvar,
    space_async: Notify,
    data_ready: Notify,
    max_queued_bytes: usize,
}

/// Request body produced incrementally by the caller
///
/// Clones share the same queue. Feed from any thread; the final chunk must
/// carry `last = true`.
///
/// Producers wait at most the write timeout for queue space. Until the
/// transaction starts writing the body that is [`DEFAULT_WRITE_TIMEOUT`],
/// afterwards the client's configured write timeout. A timeout set with
/// [`FeedableBody::with_write_timeout`] applies from the start and is kept.
#[derive(Debug, Clone)]
pub struct FeedableBody {
    shared: Arc<Shared>,
}

impl Default for FeedableBody {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedableBody {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_queued_bytes(DEFAULT_MAX_QUEUED_BYTES)
    }

    /// Body whose producers block once `max` bytes are queued.
    #[must_use]
    pub fn with_max_queued_bytes(max: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    chunks: VecDeque::new(),
                    queued_bytes: 0,
                    bytes_fed: 0,
                    last_fed: false,
                    failure: None,
                    write_timeout: DEFAULT_WRITE_TIMEOUT,
                    write_timeout_fixed: false,
                }),
                space: Condvar::new(),
                space_async: Notify::new(),
                data_ready: Notify::new(),
                max_queued_bytes: max.max(1),
            }),
        }
    }

    /// Fix the producer-side write timeout for this body.
    #[must_use]
    pub fn with_write_timeout(self, timeout: Duration) -> Self {
        {
            let mut queue = self.lock();
            queue.write_timeout = timeout;
            queue.write_timeout_fixed = true;
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_open(queue: &Queue) -> Result<(), FeedError> {
        if queue.last_fed {
            return Err(FeedError::AlreadyFinished);
        }
        match queue.failure {
            Some(Failure::TimedOut) => Err(FeedError::WriteTimeout(queue.write_timeout)),
            Some(Failure::Aborted) => Err(FeedError::Aborted),
            None => Ok(()),
        }
    }

    fn has_space(&self, queue: &Queue) -> bool {
        queue.chunks.is_empty() || queue.queued_bytes < self.shared.max_queued_bytes
    }

    fn push(&self, mut queue: MutexGuard<'_, Queue>, chunk: Bytes, last: bool) {
        queue.queued_bytes += chunk.len();
        queue.bytes_fed += chunk.len() as u64;
        queue.last_fed = last;
        queue.chunks.push_back((chunk, last));
        drop(queue);
        self.shared.data_ready.notify_one();
    }

    fn fail_timeout(&self, mut queue: MutexGuard<'_, Queue>) -> FeedError {
        queue.failure = Some(Failure::TimedOut);
        let timeout = queue.write_timeout;
        drop(queue);
        tracing::debug!(target: "conduit::feeder", ?timeout, "feed timed out waiting for queue space");
        self.shared.data_ready.notify_one();
        FeedError::WriteTimeout(timeout)
    }

    /// Queue a chunk, blocking the calling thread while the queue is full.
    ///
    /// Meant for producer threads. Async producers use [`Self::feed_async`];
    /// calling this on a runtime worker would stall that worker.
    ///
    /// # Errors
    ///
    /// [`FeedError::WriteTimeout`] if no space frees up within the write
    /// timeout (the transaction fails too), [`FeedError::AlreadyFinished`]
    /// after the last chunk, [`FeedError::Aborted`] once the transaction ended.
    pub fn feed(&self, chunk: Bytes, last: bool) -> Result<(), FeedError> {
        let mut queue = self.lock();
        Self::check_open(&queue)?;
        let deadline = Instant::now() + queue.write_timeout;
        while !self.has_space(&queue) {
            let now = Instant::now();
            if now >= deadline {
                return Err(self.fail_timeout(queue));
            }
            let (guard, _) = self
                .shared
                .space
                .wait_timeout(queue, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            queue = guard;
            Self::check_open(&queue)?;
        }
        self.push(queue, chunk, last);
        Ok(())
    }

    /// Queue a chunk, awaiting queue space.
    ///
    /// # Errors
    ///
    /// Same as [`Self::feed`].
    pub async fn feed_async(&self, chunk: Bytes, last: bool) -> Result<(), FeedError> {
        let deadline = {
            let queue = self.lock();
            Self::check_open(&queue)?;
            tokio::time::Instant::now() + queue.write_timeout
        };
        loop {
            let notified = self.shared.space_async.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let queue = self.lock();
                Self::check_open(&queue)?;
                if self.has_space(&queue) {
                    self.push(queue, chunk, last);
                    return Ok(());
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let queue = self.lock();
                return Err(self.fail_timeout(queue));
            }
        }
    }

    /// Total bytes accepted so far.
    #[must_use]
    pub fn bytes_fed(&self) -> u64 {
        self.lock().bytes_fed
    }

    /// True once the last chunk was fed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.lock().last_fed
    }

    /// Apply the client's write timeout unless the producer fixed one.
    pub(crate) fn set_write_timeout(&self, timeout: Duration) {
        let mut queue = self.lock();
        if !queue.write_timeout_fixed {
            queue.write_timeout = timeout;
        }
    }

    /// Next queued chunk for the writer.
    pub(crate) async fn next_chunk(&self) -> crate::Result<(Bytes, bool)> {
        loop {
            let notified = self.shared.data_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut queue = self.lock();
                if let Some((chunk, last)) = queue.chunks.pop_front() {
                    queue.queued_bytes -= chunk.len();
                    drop(queue);
                    self.shared.space.notify_all();
                    self.shared.space_async.notify_waiters();
                    return Ok((chunk, last));
                }
                match queue.failure {
                    Some(Failure::TimedOut) => return Err(crate::error::write_timeout()),
                    Some(Failure::Aborted) => return Err(crate::error::body(FeedError::Aborted)),
                    None => {}
                }
            }
            notified.await;
        }
    }

    /// Stop accepting data and wake every blocked producer.
    pub(crate) fn abort(&self) {
        let mut queue = self.lock();
        if queue.failure.is_none() && !(queue.last_fed && queue.chunks.is_empty()) {
            queue.failure = Some(Failure::Aborted);
        }
        drop(queue);
        self.shared.space.notify_all();
        self.shared.space_async.notify_waiters();
    }
}
