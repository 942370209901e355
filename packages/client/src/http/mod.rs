//! Request and response value types
//!
//! `Request` is the immutable description of one logical request; replays
//! derive new requests from it. Response views are what handlers receive.

pub mod body;
pub mod headers;
pub mod request;
pub mod response;

pub use body::Body;
pub use request::{Request, RequestBuilder};
pub use response::{BodyPart, Response, ResponseHeaders, ResponseStatus};
