//! Request construction for the next redirect hop

use http::header::LOCATION;
use http::{HeaderMap, Method, StatusCode};

use super::headers::{is_cross_origin, remove_content_headers, remove_sensitive_headers};
use super::location::resolve_location;
use crate::config::HttpConfig;
use crate::http::headers::set_cookies;
use crate::http::{Body, Request};

/// Whether the next hop is sent as `GET` without a body.
fn switches_to_get(status: StatusCode, method: &Method, config: &HttpConfig) -> bool {
    if *method == Method::GET || *method == Method::HEAD {
        return false;
    }
    match status {
        StatusCode::SEE_OTHER | StatusCode::MOVED_PERMANENTLY => true,
        StatusCode::FOUND => !config.strict_302_handling,
        _ => false,
    }
}

/// Build the request that follows a redirect response.
///
/// `Ok(None)` means the response cannot be followed (no `Location`, or a
/// streamed body that would have to be sent again) and is delivered to the
/// caller as is.
///
/// # Errors
///
/// Returns an error for an invalid `Location`.
pub(crate) fn redirect_request(
    request: &Request,
    status: StatusCode,
    headers: &HeaderMap,
    config: &HttpConfig,
) -> crate::Result<Option<Request>> {
    let Some(location) = headers.get(LOCATION) else {
        tracing::debug!(target: "conduit::status", %status, "redirect without Location, delivering");
        return Ok(None);
    };
    let location = location
        .to_str()
        .map_err(|e| crate::error::protocol(e).with_url(request.url().clone()))?;
    let mut next_url = resolve_location(request.url(), location)?;
    if config.remove_query_on_redirect {
        next_url.set_query(None);
    }

    let mut next = request.clone();
    if switches_to_get(status, request.method(), config) {
        next.set_method(Method::GET);
        next.set_body(Body::Empty);
        remove_content_headers(next.headers_mut());
    } else if !request.body().is_replayable() {
        tracing::debug!(target: "conduit::status", %status, "streamed body cannot be resent, delivering redirect");
        return Ok(None);
    }

    remove_sensitive_headers(next.headers_mut(), &next_url, request.url());
    if is_cross_origin(&next_url, request.url()) {
        next.clear_cookies();
    }
    next.headers_mut().remove(http::header::HOST);
    for cookie in set_cookies(headers) {
        next.add_or_replace_cookie(cookie);
    }
    next.set_url(next_url);

    tracing::debug!(
        target: "conduit::status",
        %status,
        from = %request.url(),
        to = %next.url(),
        method = %next.method(),
        "following redirect"
    );
    Ok(Some(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn response_headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn post(url: &str) -> Request {
        Request::post(url)
            .header("content-type", "text/plain")
            .body("payload")
            .build()
            .expect("test URL should parse")
    }

    #[test]
    fn found_switches_post_to_get_and_carries_cookies() {
        let headers = response_headers(&[("location", "/new/path"), ("set-cookie", "session=abc; Path=/")]);
        let next = redirect_request(&post("http://h/old"), StatusCode::FOUND, &headers, &HttpConfig::default())
            .expect("valid redirect")
            .expect("redirect should be followed");
        assert_eq!(next.url().as_str(), "http://h/new/path");
        assert_eq!(next.method(), Method::GET);
        assert!(next.body().is_empty());
        assert!(!next.headers().contains_key(http::header::CONTENT_TYPE));
        assert_eq!(next.cookies().len(), 1);
        assert_eq!(next.cookies()[0].value(), "abc");
    }

    #[test]
    fn strict_302_keeps_method() {
        let headers = response_headers(&[("location", "/next")]);
        let config = HttpConfig::default().with_strict_302_handling(true);
        let next = redirect_request(&post("http://h/"), StatusCode::FOUND, &headers, &config)
            .expect("valid redirect")
            .expect("redirect should be followed");
        assert_eq!(next.method(), Method::POST);
        assert_eq!(next.body().content_length(), Some(7));
    }

    #[test]
    fn temporary_redirect_keeps_method_and_body() {
        let headers = response_headers(&[("location", "http://h/again")]);
        let next = redirect_request(&post("http://h/"), StatusCode::TEMPORARY_REDIRECT, &headers, &HttpConfig::default())
            .expect("valid redirect")
            .expect("redirect should be followed");
        assert_eq!(next.method(), Method::POST);
        assert!(!next.body().is_empty());
    }

    #[test]
    fn query_removed_when_configured() {
        let headers = response_headers(&[("location", "/next?token=1")]);
        let config = HttpConfig::default().with_remove_query_on_redirect(true);
        let request = Request::get("http://h/?a=b").build().expect("test URL should parse");
        let next = redirect_request(&request, StatusCode::MOVED_PERMANENTLY, &headers, &config)
            .expect("valid redirect")
            .expect("redirect should be followed");
        assert_eq!(next.url().query(), None);
    }

    #[test]
    fn missing_location_is_delivered() {
        let request = Request::get("http://h/").build().expect("test URL should parse");
        let next = redirect_request(&request, StatusCode::FOUND, &HeaderMap::new(), &HttpConfig::default())
            .expect("no error");
        assert!(next.is_none());
    }

    #[test]
    fn cross_host_drops_authorization() {
        let headers = response_headers(&[("location", "http://other/")]);
        let request = Request::get("http://h/")
            .header("authorization", "Basic abc")
            .build()
            .expect("test URL should parse");
        let next = redirect_request(&request, StatusCode::FOUND, &headers, &HttpConfig::default())
            .expect("valid redirect")
            .expect("redirect should be followed");
        assert!(!next.headers().contains_key(http::header::AUTHORIZATION));
    }
}
