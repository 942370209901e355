//! Proxy server descriptor and selection

pub mod bypass;
pub mod types;

pub use bypass::ProxyBypass;
pub use types::ProxyServer;

use crate::http::Request;

/// Picks the proxy for `request`: the per-request override first, then the
/// client-wide proxy. A proxy whose bypass list matches the target host is
/// skipped and the request connects directly.
pub(crate) fn select<'a>(request: &'a Request, configured: Option<&'a ProxyServer>) -> Option<&'a ProxyServer> {
    let proxy = request.proxy().or(configured)?;
    let host = request.url().host_str()?;
    if proxy.bypass().should_bypass(host) {
        tracing::debug!(target: "conduit::connect", host, "proxy bypassed");
        None
    } else {
        Some(proxy)
    }
}
