//! 401 / 407 challenge answering

use http::HeaderMap;
use http::header::{AUTHORIZATION, HeaderName, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION};

use crate::auth::Realm;
use crate::auth::authenticator::respond_to_challenges;
use crate::http::Request;

/// Build the retry for a challenge found in `headers[challenge_header]`.
///
/// `Ok(None)` when no offered scheme can be answered or the body cannot be
/// sent again; the challenge then reaches the caller.
pub(crate) fn answer(
    request: &Request,
    headers: &HeaderMap,
    challenge_header: HeaderName,
    realm: &Realm,
) -> crate::Result<Option<Request>> {
    if !request.body().is_replayable() {
        tracing::debug!(target: "conduit::status", "streamed body cannot be resent, delivering challenge");
        return Ok(None);
    }
    let credentials_header = if challenge_header == PROXY_AUTHENTICATE {
        PROXY_AUTHORIZATION
    } else {
        AUTHORIZATION
    };
    let Some(value) = respond_to_challenges(headers, challenge_header, realm, request)? else {
        tracing::debug!(target: "conduit::status", "no supported challenge scheme, delivering");
        return Ok(None);
    };
    let mut next = request.clone();
    next.headers_mut().insert(credentials_header, value);
    tracing::debug!(target: "conduit::status", url = %request.url(), "answering authentication challenge");
    Ok(Some(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use http::header::WWW_AUTHENTICATE;

    #[test]
    fn adds_authorization_for_basic_challenge() {
        let request = Request::get("http://h/").build().expect("test URL should parse");
        let mut headers = HeaderMap::new();
        headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static(r#"Basic realm="r""#));
        let next = answer(&request, &headers, WWW_AUTHENTICATE, &Realm::basic("u", "p"))
            .expect("no error")
            .expect("challenge answered");
        assert_eq!(next.headers()[AUTHORIZATION], "Basic dTpw");
    }

    #[test]
    fn proxy_challenge_sets_proxy_authorization() {
        let request = Request::get("http://h/").build().expect("test URL should parse");
        let mut headers = HeaderMap::new();
        headers.insert(PROXY_AUTHENTICATE, HeaderValue::from_static("Basic"));
        let next = answer(&request, &headers, PROXY_AUTHENTICATE, &Realm::basic("u", "p"))
            .expect("no error")
            .expect("challenge answered");
        assert!(next.headers().contains_key(PROXY_AUTHORIZATION));
        assert!(!next.headers().contains_key(AUTHORIZATION));
    }
}
