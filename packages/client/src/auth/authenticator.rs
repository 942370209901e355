//! Challenge responders
//!
//! Basic is answered by the crate itself. Other schemes (Digest, NTLM,
//! Negotiate) are plugged in by implementing [`Authenticator`] and attaching
//! it to the [`Realm`].

use std::fmt;

use http::{HeaderMap, HeaderValue};

use super::basic_auth::basic_auth;
use super::challenge::{Challenge, parse_challenges};
use super::realm::Realm;
use crate::error::BoxError;
use crate::http::Request;

/// Computes the credentials header for a challenge
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Scheme token this authenticator answers, e.g. `"Digest"`.
    fn scheme(&self) -> &str;

    /// Build the `Authorization` / `Proxy-Authorization` value.
    ///
    /// # Errors
    ///
    /// Any error aborts the transaction with a handler error.
    fn respond(&self, challenge: &Challenge, realm: &Realm, request: &Request) -> Result<HeaderValue, BoxError>;
}

/// Built-in Basic responder
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAuthenticator;

impl Authenticator for BasicAuthenticator {
    fn scheme(&self) -> &str {
        "Basic"
    }

    fn respond(&self, _challenge: &Challenge, realm: &Realm, _request: &Request) -> Result<HeaderValue, BoxError> {
        Ok(basic_auth(realm.principal(), Some(realm.password()))?)
    }
}

/// Finds the first challenge in `headers[name]` that the realm can answer
/// and computes the response. `Ok(None)` means no supported scheme was offered.
pub(crate) fn respond_to_challenges(
    headers: &HeaderMap,
    name: http::header::HeaderName,
    realm: &Realm,
    request: &Request,
) -> crate::Result<Option<HeaderValue>> {
    let builtin = BasicAuthenticator;
    for value in headers.get_all(&name) {
        let challenges = match parse_challenges(value) {
            Ok(challenges) => challenges,
            Err(e) => {
                tracing::debug!(target: "conduit::status", error = %e, "skipping unparsable challenge");
                continue;
            }
        };
        for challenge in &challenges {
            let authenticator: &dyn Authenticator = match realm.authenticator() {
                Some(custom) if challenge.is(custom.scheme()) => custom.as_ref(),
                _ if challenge.is(builtin.scheme()) => &builtin,
                _ => continue,
            };
            let mut value = authenticator
                .respond(challenge, realm, request)
                .map_err(crate::error::handler)?;
            value.set_sensitive(true);
            return Ok(Some(value));
        }
    }
    Ok(None)
}
