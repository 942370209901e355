//! Header manipulation utilities for redirects

use http::HeaderMap;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, PROXY_AUTHORIZATION, TRANSFER_ENCODING};
use url::Url;

/// True if `next` is on a different host or port than `previous`.
#[must_use]
pub fn is_cross_origin(next: &Url, previous: &Url) -> bool {
    next.host_str() != previous.host_str() || next.port_or_known_default() != previous.port_or_known_default()
}

/// Remove credentials when redirecting across hosts or ports
pub(crate) fn remove_sensitive_headers(headers: &mut HeaderMap, next: &Url, previous: &Url) {
    if is_cross_origin(next, previous) {
        headers.remove(AUTHORIZATION);
        headers.remove(COOKIE);
        headers.remove("cookie2");
        headers.remove(PROXY_AUTHORIZATION);
    }
}

/// Remove body framing headers when a redirect drops the body
pub(crate) fn remove_content_headers(headers: &mut HeaderMap) {
    headers.remove(CONTENT_LENGTH);
    headers.remove(CONTENT_TYPE);
    headers.remove(TRANSFER_ENCODING);
}
