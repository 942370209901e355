use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// A Result alias where the Err case is `conduit_client::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// The single failure type delivered through result futures and `on_throwable`.
///
/// Every internal failure (pool capacity, connect, protocol, handler, timeout)
/// is normalized into this type before it leaves the transaction driver.
#[derive(Clone)]
pub struct Error {
    pub inner: Box<Inner>,
}

/// Error payload. The source is reference counted so the error stays `Clone`
/// and the same failure can be handed to the handler and the future.
#[derive(Clone)]
pub struct Inner {
    pub kind: Kind,
    pub source: Option<Arc<dyn StdError + Send + Sync>>,
    pub url: Option<url::Url>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    /// Invalid configuration or request construction
    Builder,
    /// Generic failure while sending the request
    Request,
    /// Network-level refusal, unresolved address or connect timeout
    Connect,
    /// Global or per-destination connection limit reached
    CapacityExceeded,
    /// Malformed response or header error reported by the codec
    Protocol,
    /// Redirect chain exceeded the configured maximum
    Redirect,
    /// Request or read-idle timeout
    Timeout,
    /// Request body feeding failed or blocked past the write timeout
    Body,
    /// A caller callback failed or panicked
    Handler,
    /// The result future was cancelled
    Canceled,
    /// The peer closed the connection mid-response
    RemotelyClosed,
    /// Protocol upgrade hand-off failed
    Upgrade,
}

impl Error {
    pub fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(Inner {
                kind,
                source: None,
                url: None,
            }),
        }
    }

    #[must_use = "Error builder methods return a new Error and should be used"]
    pub fn with<E: Into<Box<dyn StdError + Send + Sync>>>(mut self, source: E) -> Error {
        self.inner.source = Some(Arc::from(source.into()));
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: url::Url) -> Self {
        self.inner.url = Some(url);
        self
    }

    #[must_use]
    pub fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    /// Get the URL associated with this error, if any
    #[must_use]
    pub fn url(&self) -> Option<&url::Url> {
        self.inner.url.as_ref()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("conduit_client::Error");

        f.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            f.field("source", source);
        }

        if let Some(ref url) = self.inner.url {
            f.field("url", url);
        }

        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match &self.inner.kind {
            Kind::Builder => "builder error",
            Kind::Request => "error sending request",
            Kind::Connect => "connection error",
            Kind::CapacityExceeded => "connection capacity exceeded",
            Kind::Protocol => "protocol error",
            Kind::Redirect => "too many redirects",
            Kind::Timeout => "request timeout",
            Kind::Body => "request body error",
            Kind::Handler => "response handler failed",
            Kind::Canceled => "request canceled",
            Kind::RemotelyClosed => "remotely closed",
            Kind::Upgrade => "error upgrading connection",
        };
        f.write_str(prefix)?;
        if let Some(ref source) = self.inner.source {
            write!(f, ": {source}")?;
        }
        if let Some(ref url) = self.inner.url {
            write!(f, " ({url})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|err| &**err as &(dyn StdError + 'static))
    }
}
