//! Caller-facing callback contract

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::error::{self, BoxError, Error, helpers::panic_message};
use crate::http::{BodyPart, ResponseHeaders, ResponseStatus};
use crate::transport::Connection;

/// Answer of a response callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Keep receiving.
    Continue,
    /// Stop receiving. The rest of the message is discarded, the connection
    /// is closed and `on_completed` produces the result.
    Abort,
    /// Hand the connection to [`AsyncHandler::on_upgrade`].
    Upgrade,
}

/// Receives the events of one logical request
///
/// Callbacks of a transaction never run concurrently. Exactly one of
/// `on_completed` and `on_throwable` is invoked. Errors and panics from any
/// callback are caught and fail the transaction with a handler error.
pub trait AsyncHandler: Send + 'static {
    type Output: Send + 'static;

    fn on_status_received(&mut self, _status: &ResponseStatus) -> Result<State, BoxError> {
        Ok(State::Continue)
    }

    fn on_headers_received(&mut self, _headers: &ResponseHeaders) -> Result<State, BoxError> {
        Ok(State::Continue)
    }

    fn on_body_part_received(&mut self, _part: &BodyPart) -> Result<State, BoxError> {
        Ok(State::Continue)
    }

    /// Produce the result once the response is done or aborted.
    fn on_completed(&mut self) -> Result<Self::Output, BoxError>;

    /// The transaction failed. Not called after `on_completed`.
    fn on_throwable(&mut self, _error: &Error) {}

    /// The request head was written.
    fn on_headers_written(&mut self) {}

    /// `amount` more body bytes were written, `current` in total so far.
    /// `total` is the announced length, when known.
    fn on_content_write_progress(&mut self, _amount: u64, _current: u64, _total: Option<u64>) {}

    /// The request body was fully written.
    fn on_content_write_completed(&mut self) {}

    /// Take over the connection after answering [`State::Upgrade`].
    fn on_upgrade(&mut self, _connection: Arc<dyn Connection>) -> Result<(), BoxError> {
        Err("handler does not support protocol upgrades".into())
    }
}

/// Owns the caller's handler for the lifetime of a transaction and makes
/// sure nothing escapes it: errors and panics become [`Error`]s, and the
/// terminal callback fires once.
pub(crate) struct HandlerCell<T> {
    handler: Box<dyn AsyncHandler<Output = T>>,
    finished: bool,
}

impl<T: Send + 'static> HandlerCell<T> {
    pub(crate) fn new(handler: Box<dyn AsyncHandler<Output = T>>) -> Self {
        Self {
            handler,
            finished: false,
        }
    }

    fn guarded<R>(
        &mut self,
        callback: &'static str,
        f: impl FnOnce(&mut dyn AsyncHandler<Output = T>) -> Result<R, BoxError>,
    ) -> crate::Result<R> {
        match catch_unwind(AssertUnwindSafe(|| f(self.handler.as_mut()))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(error::handler(e)),
            Err(panic) => Err(error::handler(format!(
                "{callback} panicked: {}",
                panic_message(&*panic)
            ))),
        }
    }

    pub(crate) fn status(&mut self, status: &ResponseStatus) -> crate::Result<State> {
        self.guarded("on_status_received", |h| h.on_status_received(status))
    }

    pub(crate) fn headers(&mut self, headers: &ResponseHeaders) -> crate::Result<State> {
        self.guarded("on_headers_received", |h| h.on_headers_received(headers))
    }

    pub(crate) fn body_part(&mut self, part: &BodyPart) -> crate::Result<State> {
        self.guarded("on_body_part_received", |h| h.on_body_part_received(part))
    }

    /// Run a notification hook; a panic there is logged and ignored.
    pub(crate) fn notify(&mut self, callback: &'static str, f: impl FnOnce(&mut dyn AsyncHandler<Output = T>)) {
        if self.finished {
            return;
        }
        if let Err(e) = self.guarded(callback, |h| {
            f(h);
            Ok(())
        }) {
            tracing::warn!(target: "conduit::txn", error = %e, "progress callback failed");
        }
    }

    pub(crate) fn upgrade(&mut self, connection: Arc<dyn Connection>) -> crate::Result<()> {
        self.guarded("on_upgrade", |h| h.on_upgrade(connection))
            .map_err(|e| error::upgrade(e))
    }

    /// Invoke `on_completed`, once.
    pub(crate) fn complete(&mut self) -> crate::Result<T> {
        if self.finished {
            return Err(error::handler("transaction already finished"));
        }
        self.finished = true;
        self.guarded("on_completed", |h| h.on_completed())
    }

    /// Invoke `on_throwable`, once, and never after `on_completed`.
    pub(crate) fn fail(&mut self, err: &Error) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Err(e) = self.guarded("on_throwable", |h| {
            h.on_throwable(err);
            Ok(())
        }) {
            tracing::warn!(target: "conduit::txn", error = %e, "on_throwable failed");
        }
    }

    pub(crate) fn replace(&mut self, handler: Box<dyn AsyncHandler<Output = T>>) {
        self.handler = handler;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{StatusCode, Version};

    #[derive(Default)]
    struct Recording {
        throwables: usize,
        panic_on_status: bool,
    }

    impl AsyncHandler for Recording {
        type Output = usize;

        fn on_status_received(&mut self, _status: &ResponseStatus) -> Result<State, BoxError> {
            if self.panic_on_status {
                panic!("boom");
            }
            Ok(State::Continue)
        }

        fn on_completed(&mut self) -> Result<usize, BoxError> {
            Ok(self.throwables)
        }

        fn on_throwable(&mut self, _error: &Error) {
            self.throwables += 1;
        }
    }

    fn status() -> ResponseStatus {
        let url = url::Url::parse("http://h/").expect("test URL should parse");
        ResponseStatus::new(StatusCode::OK, Version::HTTP_11, "OK".into(), url)
    }

    #[test]
    fn panic_becomes_handler_error() {
        let mut cell = HandlerCell::new(Box::new(Recording {
            panic_on_status: true,
            ..Recording::default()
        }));
        let err = cell.status(&status()).expect_err("panic must be caught");
        assert!(err.is_handler());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn terminal_callbacks_are_exclusive() {
        let mut cell = HandlerCell::new(Box::new(Recording::default()));
        assert_eq!(cell.complete().expect("first completion"), 0);
        cell.fail(&error::canceled());
        assert!(cell.complete().is_err());

        let mut cell = HandlerCell::new(Box::new(Recording::default()));
        cell.fail(&error::canceled());
        cell.fail(&error::canceled());
        assert!(cell.complete().is_err());
    }
}
