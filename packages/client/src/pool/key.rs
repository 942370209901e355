//! Pool partitioning key

use std::fmt;

use url::Url;

use crate::error;
use crate::proxy::ProxyServer;

/// Identity of a pooled destination
///
/// Two requests share idle connections only if scheme, host, port, proxy
/// and partition all match. Default ports are normalised, so
/// `http://h/` and `http://h:80/` map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    secure: bool,
    host: String,
    port: u16,
    proxy: Option<(String, u16)>,
    partition: Option<String>,
}

impl EndpointKey {
    /// Derive the key for a request URL and the proxy chosen for it.
    ///
    /// # Errors
    ///
    /// Returns a builder error if the URL has no host or no known port.
    pub fn new(url: &Url, proxy: Option<&ProxyServer>, partition: Option<&str>) -> crate::Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| error::invalid_url(format!("URL has no host: {url}")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| error::invalid_url(format!("URL has no port: {url}")))?;
        Ok(Self {
            secure: url.scheme() == "https",
            host: host.to_ascii_lowercase(),
            port,
            proxy: proxy.map(|p| (p.host().to_string(), p.port())),
            partition: partition.map(str::to_owned),
        })
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn is_proxied(&self) -> bool {
        self.proxy.is_some()
    }

    #[must_use]
    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.secure { "https" } else { "http" };
        write!(f, "{scheme}://{}:{}", self.host, self.port)?;
        if let Some((host, port)) = &self.proxy {
            write!(f, " via {host}:{port}")?;
        }
        if let Some(partition) = &self.partition {
            write!(f, " [{partition}]")?;
        }
        Ok(())
    }
}
