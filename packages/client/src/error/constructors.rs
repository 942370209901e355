use super::types::{Error, Kind};

/// Boxed error type accepted from caller callbacks and body sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Creates an `Error` for a builder error.
pub fn builder<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Builder).with(e.into())
}

/// Creates an `Error` for a request error.
pub fn request<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Request).with(e.into())
}

/// Creates an `Error` for a network-level connect failure.
pub fn connect<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Connect).with(e.into())
}

/// Creates an `Error` for a global or per-destination limit being reached.
pub fn capacity_exceeded(reason: &str) -> Error {
    Error::new(Kind::CapacityExceeded).with(reason.to_string())
}

/// Creates an `Error` for a malformed response.
pub fn protocol<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Protocol).with(e.into())
}

/// Creates an `Error` for a redirect chain longer than the configured maximum.
pub fn too_many_redirects(max: u32, url: url::Url) -> Error {
    Error::new(Kind::Redirect)
        .with(format!("maximum redirects ({max}) exceeded"))
        .with_url(url)
}

/// Creates an `Error` for an elapsed request or read-idle timeout.
pub fn timeout<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Timeout).with(e.into())
}

/// Creates an `Error` for a body feed blocked past the write timeout.
pub fn write_timeout() -> Error {
    Error::new(Kind::Body).with(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        "write queue did not drain before the write timeout",
    ))
}

/// Creates an `Error` for request body failures.
pub fn body<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Body).with(e.into())
}

/// Creates an `Error` for a failing or panicking caller callback.
pub fn handler<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Handler).with(e.into())
}

/// Creates an `Error` for a cancelled transaction.
pub fn canceled() -> Error {
    Error::new(Kind::Canceled).with(super::helpers::OperationCanceled)
}

/// Creates an `Error` for a connection closed by the peer mid-response.
pub fn remotely_closed() -> Error {
    Error::new(Kind::RemotelyClosed).with(super::helpers::ConnectionClosed)
}

/// Creates an `Error` for an upgrade error.
pub fn upgrade<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Upgrade).with(e.into())
}

/// Creates an `Error` for an invalid URL.
pub fn invalid_url<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Builder).with(e.into())
}

/// Creates an `Error` for an invalid header value.
pub fn invalid_header<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Request).with(e.into())
}

/// Creates an `Error` for a rejected configuration.
pub fn configuration<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Builder).with(e.into())
}
