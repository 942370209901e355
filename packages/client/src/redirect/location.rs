//! `Location` header resolution

use url::Url;

use crate::error;

/// Resolve a `Location` value against the URL that produced it.
///
/// Absolute locations replace the base; relative ones (`/new/path`,
/// `next`, `//host/path`) are joined to it.
///
/// # Errors
///
/// Returns a protocol error for an unparsable location and a builder error
/// for schemes other than http and https.
pub fn resolve_location(base: &Url, location: &str) -> crate::Result<Url> {
    let next = base
        .join(location.trim())
        .map_err(|e| error::protocol(format!("invalid Location {location:?}: {e}")).with_url(base.clone()))?;
    match next.scheme() {
        "http" | "https" => Ok(next),
        other => Err(error::builder(format!("redirect to unsupported scheme {other:?}")).with_url(next.clone())),
    }
}
