//! Proxy server descriptor

use super::bypass::ProxyBypass;
use crate::auth::Realm;
use crate::transport::RemoteAddress;

/// An HTTP proxy
///
/// Plain-text requests are forwarded in absolute form. Secure requests are
/// tunnelled with `CONNECT` and TLS is started on the tunnel.
#[derive(Debug, Clone)]
pub struct ProxyServer {
    host: String,
    port: u16,
    realm: Option<Realm>,
    bypass: ProxyBypass,
}

impl ProxyServer {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            port,
            realm: None,
            bypass: ProxyBypass::new(),
        }
    }

    /// Credentials answered to `407 Proxy Authentication Required`.
    #[must_use]
    pub fn with_realm(mut self, realm: Realm) -> Self {
        self.realm = Some(realm);
        self
    }

    /// Add a host (or `.domain` suffix) that must not go through this proxy.
    #[must_use]
    pub fn with_non_proxy_host(mut self, host: &str) -> Self {
        self.bypass = self.bypass.add(host);
        self
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
    pub fn realm(&self) -> Option<&Realm> {
        self.realm.as_ref()
    }

    #[must_use]
    pub fn bypass(&self) -> &ProxyBypass {
        &self.bypass
    }

    pub(crate) fn address(&self) -> RemoteAddress {
        RemoteAddress::new(self.host.clone(), self.port, false)
    }
}
