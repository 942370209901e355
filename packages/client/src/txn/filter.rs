//! Response filters
//!
//! Filters run in registration order once a response's headers are parsed,
//! before the status handlers and before anything reaches the caller. A
//! filter may ask for the request to be replayed, optionally with a
//! different handler.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::handler::AsyncHandler;
use crate::error::{self, BoxError};
use crate::http::{Request, ResponseHeaders, ResponseStatus};

/// What a filter sees, and how it asks for a replay
pub struct FilterContext<'a> {
    request: &'a Request,
    status: &'a ResponseStatus,
    headers: &'a ResponseHeaders,
    replay: Option<FilterReplay>,
}

/// A replay requested by a filter
#[derive(Debug)]
pub(crate) struct FilterReplay {
    pub(crate) request: Request,
    /// `Box<dyn AsyncHandler<Output = T>>` behind `Any`; checked against the
    /// transaction's output type by the driver.
    pub(crate) handler: Option<Box<dyn Any + Send>>,
}

impl<'a> FilterContext<'a> {
    pub(crate) fn new(request: &'a Request, status: &'a ResponseStatus, headers: &'a ResponseHeaders) -> Self {
        Self {
            request,
            status,
            headers,
            replay: None,
        }
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        self.request
    }

    #[must_use]
    pub fn status(&self) -> &ResponseStatus {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &ResponseHeaders {
        self.headers
    }

    /// Replay `request` instead of delivering this response.
    pub fn replay_request(&mut self, request: Request) {
        self.replay = Some(FilterReplay { request, handler: None });
    }

    /// Replay `request` and deliver its response to `handler`.
    ///
    /// The handler's output type must match the one the transaction was
    /// submitted with; otherwise the transaction fails with a handler error.
    pub fn replay_with_handler<H: AsyncHandler>(&mut self, request: Request, handler: H) {
        let boxed: Box<dyn AsyncHandler<Output = H::Output>> = Box::new(handler);
        self.replay = Some(FilterReplay {
            request,
            handler: Some(Box::new(boxed)),
        });
    }

    #[must_use]
    pub fn replay_requested(&self) -> bool {
        self.replay.is_some()
    }
}

impl fmt::Debug for FilterContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterContext")
            .field("url", self.request.url())
            .field("status", &self.status.status())
            .field("replay", &self.replay.is_some())
            .finish()
    }
}

/// Inspects responses before delivery
pub trait ResponseFilter: Send + Sync + fmt::Debug {
    /// # Errors
    ///
    /// An error fails the transaction with a handler error.
    fn filter(&self, ctx: &mut FilterContext<'_>) -> Result<(), BoxError>;
}

/// Ordered list of filters
#[derive(Clone, Default)]
pub struct ResponseFilters(Vec<Arc<dyn ResponseFilter>>);

impl ResponseFilters {
    pub fn push(&mut self, filter: Arc<dyn ResponseFilter>) {
        self.0.push(filter);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Run every filter; stops at the first one that requests a replay.
    pub(crate) fn run(
        &self,
        request: &Request,
        status: &ResponseStatus,
        headers: &ResponseHeaders,
    ) -> crate::Result<Option<FilterReplay>> {
        let mut ctx = FilterContext::new(request, status, headers);
        for filter in &self.0 {
            filter.filter(&mut ctx).map_err(error::handler)?;
            if ctx.replay.is_some() {
                tracing::debug!(target: "conduit::txn", ?filter, "response filter requested a replay");
                break;
            }
        }
        Ok(ctx.replay)
    }
}

impl fmt::Debug for ResponseFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, StatusCode, Version};

    #[derive(Debug)]
    struct ReplayOn(StatusCode);

    impl ResponseFilter for ReplayOn {
        fn filter(&self, ctx: &mut FilterContext<'_>) -> Result<(), BoxError> {
            if ctx.status().status() == self.0 {
                let next = ctx.request().clone();
                ctx.replay_request(next);
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Failing;

    impl ResponseFilter for Failing {
        fn filter(&self, _ctx: &mut FilterContext<'_>) -> Result<(), BoxError> {
            Err("nope".into())
        }
    }

    fn parts(code: StatusCode) -> (Request, ResponseStatus, ResponseHeaders) {
        let request = Request::get("http://h/").build().expect("test URL should parse");
        let status = ResponseStatus::new(code, Version::HTTP_11, String::new(), request.url().clone());
        (request, status, ResponseHeaders::new(HeaderMap::new()))
    }

    #[test]
    fn first_replay_wins_and_stops_the_chain() {
        let mut filters = ResponseFilters::default();
        filters.push(Arc::new(ReplayOn(StatusCode::SERVICE_UNAVAILABLE)));
        filters.push(Arc::new(Failing));

        let (request, status, headers) = parts(StatusCode::SERVICE_UNAVAILABLE);
        let replay = filters.run(&request, &status, &headers).expect("replay stops before failing filter");
        assert!(replay.is_some());

        let (request, status, headers) = parts(StatusCode::OK);
        let err = filters.run(&request, &status, &headers).expect_err("second filter fails");
        assert!(err.is_handler());
    }
}
