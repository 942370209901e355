//! Redirect following
//!
//! Builds the request for the next hop from a 3xx response.

pub mod headers;
pub mod location;
pub mod replay;

pub use location::resolve_location;

use http::StatusCode;

/// True for the statuses the redirect handler may follow.
#[must_use]
pub fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}
