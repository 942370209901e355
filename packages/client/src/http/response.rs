//! Response views handed to handlers, and the collected `Response`

use bytes::{Bytes, BytesMut};
use cookie::Cookie;
use http::{HeaderMap, StatusCode, Version};
use url::Url;

use super::headers::set_cookies;
use crate::error::BoxError;
use crate::txn::handler::{AsyncHandler, State};

/// Status line of a response, as seen by `on_status_received`
#[derive(Debug, Clone)]
pub struct ResponseStatus {
    status: StatusCode,
    version: Version,
    reason: String,
    url: Url,
}

impl ResponseStatus {
    pub(crate) fn new(status: StatusCode, version: Version, reason: String, url: Url) -> Self {
        Self {
            status,
            version,
            reason,
            url,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// URL of the attempt that produced this response.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Response headers, as seen by `on_headers_received`
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders {
    headers: HeaderMap,
}

impl ResponseHeaders {
    pub(crate) fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of `name` as a string, if present and valid UTF-8.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// One chunk of response body
#[derive(Debug, Clone)]
pub struct BodyPart {
    bytes: Bytes,
}

impl BodyPart {
    pub(crate) fn new(bytes: Bytes) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A fully buffered response
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    version: Version,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Final URL after any redirects.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Cookies set by this response.
    #[must_use]
    pub fn cookies(&self) -> Vec<Cookie<'static>> {
        set_cookies(&self.headers)
    }
}

/// Handler that buffers the whole response into a [`Response`]
#[derive(Debug, Default)]
pub struct ResponseCollector {
    status: Option<ResponseStatus>,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AsyncHandler for ResponseCollector {
    type Output = Response;

    fn on_status_received(&mut self, status: &ResponseStatus) -> Result<State, BoxError> {
        self.status = Some(status.clone());
        Ok(State::Continue)
    }

    fn on_headers_received(&mut self, headers: &ResponseHeaders) -> Result<State, BoxError> {
        self.headers = headers.headers().clone();
        Ok(State::Continue)
    }

    fn on_body_part_received(&mut self, part: &BodyPart) -> Result<State, BoxError> {
        self.body.extend_from_slice(part.bytes());
        Ok(State::Continue)
    }

    fn on_completed(&mut self) -> Result<Response, BoxError> {
        let status = self.status.take().ok_or("response completed without a status line")?;
        Ok(Response {
            status: status.status,
            version: status.version,
            url: status.url,
            headers: std::mem::take(&mut self.headers),
            body: std::mem::take(&mut self.body).freeze(),
        })
    }
}
