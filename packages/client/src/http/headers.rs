//! Header helpers shared by the dispatcher, redirects and request heads

use cookie::Cookie;
use http::header::{CONNECTION, CONTENT_LENGTH, SET_COOKIE, TRANSFER_ENCODING};
use http::{HeaderMap, Version};

/// Decides whether the connection may be reused after this response.
///
/// `Connection: close` always wins. Without a `Connection` header only
/// HTTP/1.1 and later keep the connection alive; HTTP/1.0 needs an explicit
/// `keep-alive` token.
#[must_use]
pub fn is_keep_alive(version: Version, headers: &HeaderMap) -> bool {
    let mut saw_keep_alive = false;
    for value in headers.get_all(CONNECTION) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for token in value.split(',').map(str::trim) {
            if token.eq_ignore_ascii_case("close") {
                return false;
            }
            if token.eq_ignore_ascii_case("keep-alive") {
                saw_keep_alive = true;
            }
        }
    }
    saw_keep_alive || version >= Version::HTTP_11
}

/// True if the message length is announced by `Content-Length` or chunked encoding.
#[must_use]
pub fn has_explicit_framing(headers: &HeaderMap) -> bool {
    headers.contains_key(CONTENT_LENGTH) || is_chunked(headers)
}

/// True if the last transfer coding is `chunked`.
#[must_use]
pub fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .last()
        .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

/// Parses every `Set-Cookie` header, skipping values that do not parse.
#[must_use]
pub fn set_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| match Cookie::parse(v.to_owned()) {
            Ok(cookie) => Some(cookie),
            Err(e) => {
                tracing::debug!(target: "conduit::txn", error = %e, "ignoring malformed Set-Cookie");
                None
            }
        })
        .collect()
}

/// Adds `cookie` to `jar`, replacing any cookie with the same name.
pub fn add_or_replace_cookie(jar: &mut Vec<Cookie<'static>>, cookie: Cookie<'static>) {
    if let Some(existing) = jar.iter_mut().find(|c| c.name() == cookie.name()) {
        *existing = cookie;
    } else {
        jar.push(cookie);
    }
}

/// Renders cookies as a single `Cookie` request header value.
#[must_use]
pub fn cookie_header(jar: &[Cookie<'static>]) -> Option<String> {
    if jar.is_empty() {
        return None;
    }
    let pairs: Vec<String> = jar
        .iter()
        .map(|c| format!("{}={}", c.name(), c.value()))
        .collect();
    Some(pairs.join("; "))
}
