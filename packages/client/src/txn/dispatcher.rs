//! Inbound event state machine
//!
//! Turns the wire events of one attempt into handler callbacks, status
//! handler replays and a final outcome. It never touches the connection;
//! the driver acts on the returned [`Step`].

use std::any::Any;

use http::StatusCode;

use super::context::TransactionContext;
use super::filter::ResponseFilters;
use super::handler::{HandlerCell, State};
use crate::config::HttpConfig;
use crate::error::{self, Error};
use crate::http::headers::{has_explicit_framing, is_keep_alive};
use crate::http::{BodyPart, ResponseHeaders, ResponseStatus};
use crate::proxy::ProxyServer;
use crate::status::{Handled, StatusHandler};
use crate::transport::{StatusLine, WireEvent};

/// Response progress of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Initial,
    StatusReceived,
    HeadersReceived,
    BodyStreaming,
    /// A claimed response is being read to the end so the connection can be reused.
    Draining,
    Aborted,
    Completed,
}

pub(crate) enum Step {
    Continue,
    /// `100 Continue`: start writing a deferred body.
    ResumeBody,
    Finished(Finish),
}

pub(crate) enum Finish {
    /// `on_completed` produces the result. `reusable` is false when the
    /// message was cut short or the peer asked to close.
    Completed { reusable: bool },
    Replay {
        ctx: TransactionContext,
        handler: Option<Box<dyn Any + Send>>,
        reuse_connection: bool,
    },
    Failed(Error),
    Upgrade,
}

struct PendingReplay {
    ctx: TransactionContext,
    handler: Option<Box<dyn Any + Send>>,
}

pub(crate) struct EventDispatcher<'a> {
    ctx: &'a TransactionContext,
    config: &'a HttpConfig,
    filters: &'a ResponseFilters,
    proxy: Option<&'a ProxyServer>,
    reused_connection: bool,
    state: ProtocolState,
    status: Option<ResponseStatus>,
    claimed: Option<StatusHandler>,
    keep_alive: bool,
    framed: bool,
    draining: Option<PendingReplay>,
    bytes_received: u64,
}

impl<'a> EventDispatcher<'a> {
    pub(crate) fn new(
        ctx: &'a TransactionContext,
        config: &'a HttpConfig,
        proxy: Option<&'a ProxyServer>,
        reused_connection: bool,
    ) -> Self {
        Self {
            ctx,
            config,
            filters: &config.response_filters,
            proxy,
            reused_connection,
            state: ProtocolState::Initial,
            status: None,
            claimed: None,
            keep_alive: false,
            framed: false,
            draining: None,
            bytes_received: 0,
        }
    }

    pub(crate) fn state(&self) -> ProtocolState {
        self.state
    }

    pub(crate) fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Mark the attempt aborted from outside (cancel, timeout).
    pub(crate) fn abort(&mut self) {
        self.state = ProtocolState::Aborted;
    }

    pub(crate) fn on_event<T: Send + 'static>(&mut self, event: WireEvent, handler: &mut HandlerCell<T>) -> Step {
        match event {
            WireEvent::Status(line) => self.on_status(line, handler),
            WireEvent::Headers(headers) => self.on_headers(headers, handler),
            WireEvent::Body(chunk) => self.on_body(chunk, handler),
            WireEvent::Complete => self.on_complete(),
            WireEvent::Closed => self.on_closed(None),
            WireEvent::Error(e) => self.on_closed(Some(e)),
            WireEvent::HeaderError(message) => self.fail(error::protocol(message)),
        }
    }

    fn on_status<T: Send + 'static>(&mut self, line: StatusLine, handler: &mut HandlerCell<T>) -> Step {
        if self.state != ProtocolState::Initial {
            return self.fail(error::protocol("unexpected status line"));
        }
        if line.status == StatusCode::CONTINUE {
            return Step::ResumeBody;
        }
        if line.status.is_informational() && line.status != StatusCode::SWITCHING_PROTOCOLS {
            tracing::trace!(target: "conduit::txn", status = %line.status, "ignoring interim response");
            return Step::Continue;
        }

        let url = self.ctx.request().url().clone();
        let status = ResponseStatus::new(line.status, line.version, line.reason, url);
        self.state = ProtocolState::StatusReceived;
        self.claimed = self.select_handler(line.status);

        if self.claimed == Some(StatusHandler::Redirect) && self.ctx.redirect_limit_reached() {
            let err = error::too_many_redirects(self.ctx.max_redirects(), self.ctx.request().url().clone());
            self.status = Some(status);
            return self.fail(err);
        }

        let step = match self.claimed {
            Some(kind) => {
                tracing::debug!(target: "conduit::status", ?kind, status = %line.status, "status handler claimed response");
                Step::Continue
            }
            None => self.answer(handler.status(&status)),
        };
        self.status = Some(status);
        step
    }

    /// A handler bound by the previous attempt gets the first look; if it
    /// does not handle this code the normal code lookup applies.
    fn select_handler(&self, status: StatusCode) -> Option<StatusHandler> {
        let claims = |kind: StatusHandler| kind.claims(self.ctx, self.config, self.proxy);
        match self.ctx.status_handler() {
            Some(bound) if bound.handles_status(status) => Some(bound).filter(|k| claims(*k)),
            _ => StatusHandler::for_status(status).filter(|k| claims(*k)),
        }
    }

    fn on_headers<T: Send + 'static>(&mut self, headers: http::HeaderMap, handler: &mut HandlerCell<T>) -> Step {
        if self.state != ProtocolState::StatusReceived {
            return self.fail(error::protocol("headers without a status line"));
        }
        let Some(status) = self.status.take() else {
            return self.fail(error::protocol("headers without a status line"));
        };
        self.keep_alive = is_keep_alive(status.version(), &headers);
        self.framed = has_explicit_framing(&headers);
        self.state = ProtocolState::HeadersReceived;
        let headers = ResponseHeaders::new(headers);

        if !self.filters.is_empty() {
            match self.filters.run(self.ctx.request(), &status, &headers) {
                Err(e) => return self.fail(e),
                Ok(Some(replay)) => {
                    let ctx = self.ctx.for_filter_replay(replay.request);
                    return self.begin_replay(ctx, replay.handler);
                }
                Ok(None) => {}
            }
        }

        if let Some(kind) = self.claimed.take() {
            let handled = kind.handle(
                status.status(),
                headers.headers(),
                self.ctx,
                self.config,
                self.proxy,
            );
            match handled {
                Err(e) => return self.fail(e),
                Ok(Handled::Replay(next)) => return self.begin_replay(next, None),
                Ok(Handled::Deliver) => {
                    tracing::debug!(target: "conduit::status", ?kind, "status handler declined, delivering response");
                    if let Step::Finished(finish) = self.answer(handler.status(&status)) {
                        return Step::Finished(finish);
                    }
                }
            }
        }

        self.answer(handler.headers(&headers))
    }

    fn on_body<T: Send + 'static>(&mut self, chunk: bytes::Bytes, handler: &mut HandlerCell<T>) -> Step {
        self.bytes_received += chunk.len() as u64;
        if self.draining.is_some() {
            return Step::Continue;
        }
        match self.state {
            ProtocolState::HeadersReceived | ProtocolState::BodyStreaming => {
                self.state = ProtocolState::BodyStreaming;
                self.answer(handler.body_part(&BodyPart::new(chunk)))
            }
            _ => self.fail(error::protocol("body data before response headers")),
        }
    }

    fn on_complete(&mut self) -> Step {
        if let Some(replay) = self.draining.take() {
            self.state = ProtocolState::Completed;
            return Step::Finished(Finish::Replay {
                ctx: replay.ctx,
                handler: replay.handler,
                reuse_connection: self.keep_alive,
            });
        }
        match self.state {
            ProtocolState::HeadersReceived | ProtocolState::BodyStreaming => {
                self.state = ProtocolState::Completed;
                Step::Finished(Finish::Completed {
                    reusable: self.keep_alive,
                })
            }
            _ => self.fail(error::protocol("message completed before response headers")),
        }
    }

    /// Peer close or read error.
    fn on_closed(&mut self, cause: Option<std::io::Error>) -> Step {
        if let Some(replay) = self.draining.take() {
            self.state = ProtocolState::Completed;
            return Step::Finished(Finish::Replay {
                ctx: replay.ctx,
                handler: replay.handler,
                reuse_connection: false,
            });
        }
        match self.state {
            ProtocolState::Initial if self.stale_connection_retry_allowed() => {
                tracing::info!(
                    target: "conduit::txn",
                    retry = self.ctx.retry_count() + 1,
                    "pooled connection closed before a response, retrying",
                );
                self.state = ProtocolState::Aborted;
                Step::Finished(Finish::Replay {
                    ctx: self.ctx.for_retry(),
                    handler: None,
                    reuse_connection: false,
                })
            }
            ProtocolState::HeadersReceived | ProtocolState::BodyStreaming if !self.framed && cause.is_none() => {
                self.state = ProtocolState::Completed;
                Step::Finished(Finish::Completed { reusable: false })
            }
            _ => match cause {
                Some(e) => self.fail(error::request(e)),
                None => self.fail(error::remotely_closed()),
            },
        }
    }

    fn stale_connection_retry_allowed(&self) -> bool {
        self.reused_connection
            && self.ctx.request().body().is_replayable()
            && self.ctx.retry_count() < self.config.max_request_retry
    }

    /// Reads the claimed response to its end before replaying when the
    /// connection can be reused; otherwise replays at once on a new one.
    fn begin_replay(&mut self, ctx: TransactionContext, handler: Option<Box<dyn Any + Send>>) -> Step {
        if self.keep_alive && self.framed {
            self.state = ProtocolState::Draining;
            self.draining = Some(PendingReplay { ctx, handler });
            Step::Continue
        } else {
            self.state = ProtocolState::Aborted;
            Step::Finished(Finish::Replay {
                ctx,
                handler,
                reuse_connection: false,
            })
        }
    }

    fn answer(&mut self, answer: crate::Result<State>) -> Step {
        match answer {
            Ok(State::Continue) => Step::Continue,
            Ok(State::Abort) => {
                tracing::debug!(target: "conduit::txn", "handler aborted the response");
                self.state = ProtocolState::Aborted;
                Step::Finished(Finish::Completed { reusable: false })
            }
            Ok(State::Upgrade) => {
                self.state = ProtocolState::Completed;
                Step::Finished(Finish::Upgrade)
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, err: Error) -> Step {
        self.state = ProtocolState::Aborted;
        let err = if err.url().is_none() {
            err.with_url(self.ctx.request().url().clone())
        } else {
            err
        };
        Step::Finished(Finish::Failed(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::http::Request;
    use crate::txn::handler::AsyncHandler;
    use http::header::{CONTENT_LENGTH, LOCATION};
    use http::{HeaderMap, HeaderValue, Version};

    #[derive(Default)]
    struct Counting {
        statuses: usize,
        parts: usize,
        abort_on_body: bool,
    }

    impl AsyncHandler for Counting {
        type Output = (usize, usize);

        fn on_status_received(&mut self, _status: &ResponseStatus) -> Result<State, BoxError> {
            self.statuses += 1;
            Ok(State::Continue)
        }

        fn on_body_part_received(&mut self, _part: &BodyPart) -> Result<State, BoxError> {
            self.parts += 1;
            Ok(if self.abort_on_body { State::Abort } else { State::Continue })
        }

        fn on_completed(&mut self) -> Result<(usize, usize), BoxError> {
            Ok((self.statuses, self.parts))
        }
    }

    fn status(code: StatusCode) -> WireEvent {
        WireEvent::Status(StatusLine {
            version: Version::HTTP_11,
            status: code,
            reason: String::new(),
        })
    }

    fn headers(pairs: &[(http::HeaderName, &'static str)]) -> WireEvent {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_static(value));
        }
        WireEvent::Headers(map)
    }

    fn ctx(config: &HttpConfig) -> TransactionContext {
        let request = Request::get("http://h/start").build().expect("test URL should parse");
        TransactionContext::new(request, config).expect("context")
    }

    #[test]
    fn plain_response_completes_reusable() {
        let config = HttpConfig::default();
        let ctx = ctx(&config);
        let mut handler = HandlerCell::new(Box::new(Counting::default()));
        let mut d = EventDispatcher::new(&ctx, &config, None, false);

        assert!(matches!(d.on_event(status(StatusCode::OK), &mut handler), Step::Continue));
        assert!(matches!(d.on_event(headers(&[(CONTENT_LENGTH, "3")]), &mut handler), Step::Continue));
        assert!(matches!(d.on_event(WireEvent::Body("abc".into()), &mut handler), Step::Continue));
        assert!(matches!(
            d.on_event(WireEvent::Complete, &mut handler),
            Step::Finished(Finish::Completed { reusable: true })
        ));
        assert_eq!(d.bytes_received(), 3);
        assert_eq!(handler.complete().expect("completes"), (1, 1));
    }

    #[test]
    fn continue_resumes_and_interim_responses_are_ignored() {
        let config = HttpConfig::default();
        let ctx = ctx(&config);
        let mut handler = HandlerCell::new(Box::new(Counting::default()));
        let mut d = EventDispatcher::new(&ctx, &config, None, false);
        assert!(matches!(d.on_event(status(StatusCode::CONTINUE), &mut handler), Step::ResumeBody));
        assert!(matches!(d.on_event(status(StatusCode::PROCESSING), &mut handler), Step::Continue));
        assert_eq!(d.state(), ProtocolState::Initial);
    }

    #[test]
    fn claimed_redirect_drains_then_replays_without_callbacks() {
        let config = HttpConfig::default().with_follow_redirects(true);
        let ctx = ctx(&config);
        let mut handler = HandlerCell::new(Box::new(Counting::default()));
        let mut d = EventDispatcher::new(&ctx, &config, None, false);

        d.on_event(status(StatusCode::FOUND), &mut handler);
        let step = d.on_event(headers(&[(LOCATION, "/next"), (CONTENT_LENGTH, "2")]), &mut handler);
        assert!(matches!(step, Step::Continue));
        assert_eq!(d.state(), ProtocolState::Draining);
        d.on_event(WireEvent::Body("xx".into()), &mut handler);
        match d.on_event(WireEvent::Complete, &mut handler) {
            Step::Finished(Finish::Replay { ctx: next, reuse_connection, .. }) => {
                assert!(reuse_connection);
                assert_eq!(next.request().url().path(), "/next");
                assert_eq!(next.redirect_count(), 1);
            }
            _ => panic!("expected a replay"),
        }
        assert_eq!(handler.complete().expect("completes"), (0, 0));
    }

    #[test]
    fn redirect_past_the_limit_fails() {
        let config = HttpConfig::default().with_follow_redirects(true).with_max_redirects(0);
        let ctx = ctx(&config);
        let mut handler = HandlerCell::new(Box::new(Counting::default()));
        let mut d = EventDispatcher::new(&ctx, &config, None, false);
        match d.on_event(status(StatusCode::MOVED_PERMANENTLY), &mut handler) {
            Step::Finished(Finish::Failed(e)) => assert!(e.is_redirect()),
            _ => panic!("expected too many redirects"),
        }
    }

    #[test]
    fn abort_finishes_unreusable() {
        let config = HttpConfig::default();
        let ctx = ctx(&config);
        let mut handler = HandlerCell::new(Box::new(Counting {
            abort_on_body: true,
            ..Counting::default()
        }));
        let mut d = EventDispatcher::new(&ctx, &config, None, false);
        d.on_event(status(StatusCode::OK), &mut handler);
        d.on_event(headers(&[(CONTENT_LENGTH, "10")]), &mut handler);
        assert!(matches!(
            d.on_event(WireEvent::Body("abc".into()), &mut handler),
            Step::Finished(Finish::Completed { reusable: false })
        ));
        assert_eq!(d.state(), ProtocolState::Aborted);
    }

    #[test]
    fn close_without_framing_completes_gracefully() {
        let config = HttpConfig::default();
        let ctx = ctx(&config);
        let mut handler = HandlerCell::new(Box::new(Counting::default()));
        let mut d = EventDispatcher::new(&ctx, &config, None, false);
        d.on_event(status(StatusCode::OK), &mut handler);
        d.on_event(headers(&[]), &mut handler);
        d.on_event(WireEvent::Body("tail".into()), &mut handler);
        assert!(matches!(
            d.on_event(WireEvent::Closed, &mut handler),
            Step::Finished(Finish::Completed { reusable: false })
        ));
    }

    #[test]
    fn close_mid_framed_body_is_remotely_closed() {
        let config = HttpConfig::default();
        let ctx = ctx(&config);
        let mut handler = HandlerCell::new(Box::new(Counting::default()));
        let mut d = EventDispatcher::new(&ctx, &config, None, false);
        d.on_event(status(StatusCode::OK), &mut handler);
        d.on_event(headers(&[(CONTENT_LENGTH, "10")]), &mut handler);
        match d.on_event(WireEvent::Closed, &mut handler) {
            Step::Finished(Finish::Failed(e)) => assert!(e.is_remotely_closed()),
            _ => panic!("expected remotely closed"),
        }
    }

    #[test]
    fn stale_reused_connection_retries_once_per_budget() {
        let config = HttpConfig::default();
        let ctx = ctx(&config);
        let mut handler = HandlerCell::new(Box::new(Counting::default()));

        let mut fresh = EventDispatcher::new(&ctx, &config, None, false);
        assert!(matches!(fresh.on_event(WireEvent::Closed, &mut handler), Step::Finished(Finish::Failed(_))));

        let mut reused = EventDispatcher::new(&ctx, &config, None, true);
        match reused.on_event(WireEvent::Closed, &mut handler) {
            Step::Finished(Finish::Replay { ctx: next, .. }) => assert_eq!(next.retry_count(), 1),
            _ => panic!("expected a retry"),
        }
    }
}
