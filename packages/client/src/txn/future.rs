//! Result future of a submitted transaction

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Notify, oneshot};

use crate::error;

/// One-way cancellation flag shared by a future and its driver
#[derive(Debug, Default)]
pub(crate) struct CancelSignal {
    canceled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    /// Returns true only for the call that flipped the flag.
    pub(crate) fn cancel(&self) -> bool {
        let first = !self.canceled.swap(true, Ordering::AcqRel);
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    pub(crate) fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Resolves once [`CancelSignal::cancel`] has been called.
    pub(crate) async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_canceled() {
                return;
            }
            notified.await;
        }
    }
}

/// Eventual result of [`HttpClient::execute`](crate::HttpClient::execute)
///
/// Await it from async code, or block on it with [`ResponseFuture::get`]
/// from a thread outside the runtime. Dropping the future does not cancel
/// the transaction.
#[derive(Debug)]
pub struct ResponseFuture<T> {
    rx: oneshot::Receiver<crate::Result<T>>,
    cancel: Arc<CancelSignal>,
    runtime: Handle,
}

impl<T> ResponseFuture<T> {
    pub(crate) fn new(rx: oneshot::Receiver<crate::Result<T>>, cancel: Arc<CancelSignal>, runtime: Handle) -> Self {
        Self { rx, cancel, runtime }
    }

    /// Cancel the transaction.
    ///
    /// The connection is closed and the handler sees a cancellation error
    /// unless the transaction already finished. Returns true for the first
    /// call only.
    pub fn cancel(&self) -> bool {
        let first = self.cancel.cancel();
        if first {
            tracing::debug!(target: "conduit::txn", "transaction canceled by caller");
        }
        first
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    /// Block the current thread until the transaction finishes.
    ///
    /// # Errors
    ///
    /// The transaction's error, or a builder error when called from inside
    /// an async runtime.
    pub fn get(self) -> crate::Result<T> {
        if Handle::try_current().is_ok() {
            return Err(error::builder("blocking get called inside an async runtime; await the future instead"));
        }
        let runtime = self.runtime.clone();
        runtime.block_on(self)
    }

    /// Like [`ResponseFuture::get`] but gives up after `timeout`.
    ///
    /// A timeout leaves the transaction running; the future can be waited on
    /// again.
    ///
    /// # Errors
    ///
    /// A timeout error when `timeout` elapses first.
    pub fn get_timeout(&mut self, timeout: Duration) -> crate::Result<T> {
        if Handle::try_current().is_ok() {
            return Err(error::builder("blocking get called inside an async runtime; await the future instead"));
        }
        let runtime = self.runtime.clone();
        runtime.block_on(async {
            match tokio::time::timeout(timeout, &mut *self).await {
                Ok(result) => result,
                Err(_) => Err(error::timeout(format!("no result within {timeout:?}"))),
            }
        })
    }
}

impl<T> Future for ResponseFuture<T> {
    type Output = crate::Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(error::request("transaction ended without a result"))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_is_idempotent_and_wakes_waiters() {
        let signal = Arc::new(CancelSignal::default());
        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.cancelled().await })
        };
        tokio::task::yield_now().await;
        assert!(signal.cancel());
        assert!(!signal.cancel());
        waiter.await.expect("waiter should finish");
        assert!(signal.is_canceled());
    }

    #[tokio::test]
    async fn awaiting_delivers_the_sent_result() {
        let (tx, rx) = oneshot::channel();
        let future = ResponseFuture::new(rx, Arc::default(), Handle::current());
        tx.send(Ok(7_u32)).expect("receiver alive");
        assert_eq!(future.await.expect("ok"), 7);
    }

    #[tokio::test]
    async fn stays_pending_until_a_result_arrives() {
        let (tx, rx) = oneshot::channel();
        let mut future = tokio_test::task::spawn(ResponseFuture::new(rx, Arc::default(), Handle::current()));
        tokio_test::assert_pending!(future.poll());
        tx.send(Ok("done")).expect("receiver alive");
        assert!(future.is_woken());
        let result = tokio_test::assert_ready!(future.poll());
        assert_eq!(result.expect("ok"), "done");
    }

    #[tokio::test]
    async fn dropped_sender_is_a_request_error() {
        let (tx, rx) = oneshot::channel::<crate::Result<()>>();
        drop(tx);
        let future = ResponseFuture::new(rx, Arc::default(), Handle::current());
        assert!(future.await.expect_err("no result was sent").is_request());
    }

    #[tokio::test]
    async fn blocking_get_inside_runtime_is_rejected() {
        let (_tx, rx) = oneshot::channel::<crate::Result<()>>();
        let future = ResponseFuture::new(rx, Arc::default(), Handle::current());
        assert!(future.get().expect_err("must refuse to block").is_builder());
    }
}
