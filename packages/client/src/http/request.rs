//! Request value type and builder
//!
//! A `Request` is never mutated once submitted. Redirects, auth retries and
//! filter replays derive a new request with the crate-private setters below.

use std::time::Duration;

use cookie::Cookie;
use http::header::{CONTENT_LENGTH, COOKIE, HOST, TRANSFER_ENCODING, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Version};
use url::{Position, Url};

use super::body::Body;
use super::headers::{add_or_replace_cookie, cookie_header};
use crate::auth::Realm;
use crate::error;
use crate::proxy::ProxyServer;
use crate::transport::RequestHead;

/// One logical HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    version: Version,
    headers: HeaderMap,
    body: Body,
    cookies: Vec<Cookie<'static>>,
    follow_redirects: Option<bool>,
    realm: Option<Realm>,
    proxy: Option<ProxyServer>,
    partition: Option<String>,
    request_timeout: Option<Duration>,
}

impl Request {
    /// Start building a request.
    pub fn builder(method: Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    /// Start building a `GET` request.
    pub fn get(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::GET, url)
    }

    /// Start building a `POST` request.
    pub fn post(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::POST, url)
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[must_use]
    pub fn cookies(&self) -> &[Cookie<'static>] {
        &self.cookies
    }

    /// Per-request redirect override; `None` defers to the client setting.
    #[must_use]
    pub fn follow_redirects(&self) -> Option<bool> {
        self.follow_redirects
    }

    #[must_use]
    pub fn realm(&self) -> Option<&Realm> {
        self.realm.as_ref()
    }

    /// Per-request proxy override.
    #[must_use]
    pub fn proxy(&self) -> Option<&ProxyServer> {
        self.proxy.as_ref()
    }

    /// Connection partition key; requests with different partitions never
    /// share pooled connections.
    #[must_use]
    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// True if the request asked for `Expect: 100-continue`.
    #[must_use]
    pub fn expects_continue(&self) -> bool {
        self.headers
            .get(http::header::EXPECT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"))
    }

    pub(crate) fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub(crate) fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub(crate) fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    pub(crate) fn clear_cookies(&mut self) {
        self.cookies.clear();
    }

    pub(crate) fn add_or_replace_cookie(&mut self, cookie: Cookie<'static>) {
        add_or_replace_cookie(&mut self.cookies, cookie);
    }

    /// Builds the head written on the wire.
    ///
    /// With a plain-text proxy the target is the absolute URL; otherwise it
    /// is the origin form (path and query).
    pub(crate) fn head(&self, proxy: Option<&ProxyServer>, user_agent: &str) -> crate::Result<RequestHead> {
        let target = if proxy.is_some() && self.url.scheme() == "http" {
            self.url[..Position::AfterQuery].to_string()
        } else {
            self.url[Position::BeforePath..Position::AfterQuery].to_string()
        };

        let mut headers = self.headers.clone();
        if !headers.contains_key(HOST) {
            headers.insert(HOST, host_header(&self.url)?);
        }
        if !headers.contains_key(USER_AGENT) && !user_agent.is_empty() {
            headers.insert(USER_AGENT, HeaderValue::from_str(user_agent).map_err(error::invalid_header)?);
        }
        if let Some(cookies) = cookie_header(&self.cookies) {
            headers.insert(COOKIE, HeaderValue::from_str(&cookies).map_err(error::invalid_header)?);
        }
        match self.body.content_length() {
            Some(0) => {}
            Some(len) => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
            }
            None if !headers.contains_key(CONTENT_LENGTH) => {
                headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            }
            None => {}
        }

        Ok(RequestHead {
            method: self.method.clone(),
            target,
            version: self.version,
            headers,
        })
    }
}

fn host_header(url: &Url) -> crate::Result<HeaderValue> {
    let host = url
        .host_str()
        .ok_or_else(|| error::invalid_url(format!("URL has no host: {url}")))?;
    let value = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    HeaderValue::from_str(&value).map_err(error::invalid_header)
}

/// Builder for [`Request`]
///
/// Errors are deferred until [`RequestBuilder::build`].
#[derive(Debug)]
pub struct RequestBuilder {
    request: crate::Result<Request>,
}

impl RequestBuilder {
    fn new(method: Method, url: &str) -> Self {
        let request = Url::parse(url)
            .map_err(error::invalid_url)
            .and_then(|url| match url.scheme() {
                "http" | "https" if url.has_host() => Ok(url),
                _ => Err(error::invalid_url(format!("unsupported URL: {url}"))),
            })
            .map(|url| Request {
                method,
                url,
                version: Version::HTTP_11,
                headers: HeaderMap::new(),
                body: Body::Empty,
                cookies: Vec::new(),
                follow_redirects: None,
                realm: None,
                proxy: None,
                partition: None,
                request_timeout: None,
            });
        RequestBuilder { request }
    }

    fn map(mut self, f: impl FnOnce(&mut Request) -> crate::Result<()>) -> Self {
        let outcome = match self.request.as_mut() {
            Ok(request) => f(request),
            Err(_) => Ok(()),
        };
        if let Err(e) = outcome {
            self.request = Err(e);
        }
        self
    }

    /// Append a header.
    #[must_use]
    pub fn header(self, name: &str, value: &str) -> Self {
        self.map(|request| {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(error::invalid_header)?;
            let value = HeaderValue::from_str(value).map_err(error::invalid_header)?;
            request.headers.append(name, value);
            Ok(())
        })
    }

    /// Add a cookie, replacing one with the same name.
    #[must_use]
    pub fn cookie(self, name: &str, value: &str) -> Self {
        let cookie = Cookie::new(name.to_owned(), value.to_owned());
        self.map(|request| {
            request.add_or_replace_cookie(cookie);
            Ok(())
        })
    }

    #[must_use]
    pub fn body(self, body: impl Into<Body>) -> Self {
        let body = body.into();
        self.map(|request| {
            request.body = body;
            Ok(())
        })
    }

    #[must_use]
    pub fn version(self, version: Version) -> Self {
        self.map(|request| {
            request.version = version;
            Ok(())
        })
    }

    /// Force redirect following on or off for this request only.
    #[must_use]
    pub fn follow_redirects(self, follow: bool) -> Self {
        self.map(|request| {
            request.follow_redirects = Some(follow);
            Ok(())
        })
    }

    #[must_use]
    pub fn realm(self, realm: Realm) -> Self {
        self.map(|request| {
            request.realm = Some(realm);
            Ok(())
        })
    }

    #[must_use]
    pub fn proxy(self, proxy: ProxyServer) -> Self {
        self.map(|request| {
            request.proxy = Some(proxy);
            Ok(())
        })
    }

    #[must_use]
    pub fn partition(self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.map(|request| {
            request.partition = Some(key);
            Ok(())
        })
    }

    #[must_use]
    pub fn request_timeout(self, timeout: Duration) -> Self {
        self.map(|request| {
            request.request_timeout = Some(timeout);
            Ok(())
        })
    }

    /// Finish the request.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while building.
    pub fn build(self) -> crate::Result<Request> {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_form_target_and_host() {
        let request = Request::get("http://example.com:8080/a/b?x=1#frag")
            .build()
            .expect("test URL should parse");
        let head = request.head(None, "conduit/test").expect("head should build");
        assert_eq!(head.target, "/a/b?x=1");
        assert_eq!(head.headers[HOST], "example.com:8080");
        assert_eq!(head.headers[USER_AGENT], "conduit/test");
    }

    #[test]
    fn absolute_form_through_plain_proxy() {
        let request = Request::get("http://example.com/a")
            .build()
            .expect("test URL should parse");
        let proxy = ProxyServer::new("proxy.local", 3128);
        let head = request.head(Some(&proxy), "").expect("head should build");
        assert_eq!(head.target, "http://example.com/a");
    }

    #[test]
    fn body_framing_headers() {
        let request = Request::post("http://example.com/")
            .body("hello")
            .build()
            .expect("test URL should parse");
        let head = request.head(None, "").expect("head should build");
        assert_eq!(head.headers[CONTENT_LENGTH], "5");

        let streamed = Request::post("http://example.com/")
            .body(crate::feeder::FeedableBody::new())
            .build()
            .expect("test URL should parse");
        let head = streamed.head(None, "").expect("head should build");
        assert_eq!(head.headers[TRANSFER_ENCODING], "chunked");
    }

    #[test]
    fn invalid_header_is_deferred_to_build() {
        let err = Request::get("http://example.com/")
            .header("bad header", "x")
            .build()
            .expect_err("header name with a space must fail");
        assert!(err.is_request());
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = Request::get("ftp://example.com/")
            .build()
            .expect_err("ftp is not supported");
        assert!(err.is_builder());
    }
}
