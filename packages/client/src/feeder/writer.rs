//! Connection-side body writer
//!
//! Drains a [`Body`] into the connection. Before every chunk it checks that
//! the connection can take more data and otherwise awaits its write-ready
//! signal; it never blocks a thread.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;

use super::feedable::FeedableBody;
use super::source::BodySource;
use crate::error;
use crate::http::Body;
use crate::transport::Connection;

/// Write progress forwarded to the transaction driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    Written { amount: u64, current: u64 },
    Completed,
}

/// Restores the connection's pending-bytes limit when dropped
struct PendingLimit<'a> {
    conn: &'a dyn Connection,
    saved: usize,
}

impl<'a> PendingLimit<'a> {
    fn set(conn: &'a dyn Connection, limit: usize) -> Self {
        let saved = conn.max_pending_bytes();
        conn.set_max_pending_bytes(limit);
        Self { conn, saved }
    }
}

impl Drop for PendingLimit<'_> {
    fn drop(&mut self) {
        self.conn.set_max_pending_bytes(self.saved);
    }
}

/// Wakes blocked producers if the writer goes away before the last chunk
struct FeedGuard {
    feed: FeedableBody,
    done: bool,
}

impl Drop for FeedGuard {
    fn drop(&mut self) {
        if !self.done {
            self.feed.abort();
        }
    }
}

pub(crate) struct BodyWriter {
    conn: Arc<dyn Connection>,
    progress: UnboundedSender<Progress>,
    max_pending_bytes: usize,
    write_timeout: Duration,
    written: u64,
}

impl BodyWriter {
    pub(crate) fn new(
        conn: Arc<dyn Connection>,
        progress: UnboundedSender<Progress>,
        max_pending_bytes: usize,
        write_timeout: Duration,
    ) -> Self {
        Self {
            conn,
            progress,
            max_pending_bytes,
            write_timeout,
            written: 0,
        }
    }

    /// Write the whole body and report completion. Returns bytes written.
    pub(crate) async fn write(mut self, body: Body) -> crate::Result<u64> {
        match body {
            Body::Empty => {}
            Body::Bytes(bytes) if bytes.is_empty() => {}
            Body::Bytes(bytes) => {
                self.wait_writable().await?;
                self.send(bytes, true).await?;
            }
            Body::Feed(feed) => self.flush_feed(feed).await?,
            Body::Stream(source) => self.flush_stream(source).await?,
        }
        let _ = self.progress.send(Progress::Completed);
        Ok(self.written)
    }

    /// Wait for write capacity, at most the write timeout.
    async fn wait_writable(&self) -> crate::Result<()> {
        let ready = async {
            while !self.conn.can_write() {
                self.conn.writable().await;
            }
        };
        if tokio::time::timeout(self.write_timeout, ready).await.is_err() {
            tracing::debug!(target: "conduit::feeder", timeout = ?self.write_timeout, written = self.written, "connection stayed unwritable");
            return Err(error::write_timeout());
        }
        Ok(())
    }

    async fn send(&mut self, chunk: Bytes, last: bool) -> crate::Result<()> {
        let amount = chunk.len() as u64;
        self.conn.send_body(chunk, last).await.map_err(error::body)?;
        self.written += amount;
        if amount > 0 {
            let _ = self.progress.send(Progress::Written {
                amount,
                current: self.written,
            });
        }
        Ok(())
    }

    async fn flush_feed(&mut self, feed: FeedableBody) -> crate::Result<()> {
        feed.set_write_timeout(self.write_timeout);
        let mut guard = FeedGuard { feed, done: false };
        let conn = Arc::clone(&self.conn);
        let _limit = PendingLimit::set(conn.as_ref(), self.max_pending_bytes);
        loop {
            let (chunk, last) = guard.feed.next_chunk().await?;
            self.wait_writable().await?;
            self.send(chunk, last).await?;
            if last {
                guard.done = true;
                tracing::debug!(target: "conduit::feeder", written = self.written, "fed body complete");
                return Ok(());
            }
        }
    }

    async fn flush_stream(&mut self, source: BodySource) -> crate::Result<()> {
        let mut stream = source
            .take()
            .ok_or_else(|| error::body("streamed body was already consumed"))?;
        let mut held: Option<Bytes> = None;
        while let Some(item) = stream.next().await {
            let chunk = item.map_err(error::body)?;
            if let Some(previous) = held.replace(chunk) {
                self.wait_writable().await?;
                self.send(previous, false).await?;
            }
        }
        self.wait_writable().await?;
        self.send(held.unwrap_or_default(), true).await
    }
}
