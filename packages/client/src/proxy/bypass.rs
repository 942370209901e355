//! Proxy bypass rules
//!
//! Hosts listed here connect directly even when a proxy is configured. An
//! entry starting with `.` matches the domain and all of its subdomains.

use std::net::IpAddr;

/// Proxy bypass rules for conditional proxy usage
#[derive(Clone, Debug, Default)]
pub struct ProxyBypass {
    pub no_proxy_hosts: Vec<String>,
    pub no_proxy_domains: Vec<String>,
    pub no_proxy_ips: Vec<IpAddr>,
}

impl ProxyBypass {
    /// Create an empty bypass list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, classifying it as a domain suffix, an IP or an exact host.
    #[must_use]
    pub fn add(mut self, entry: &str) -> Self {
        let entry = entry.trim().to_ascii_lowercase();
        if let Some(domain) = entry.strip_prefix('.') {
            self.no_proxy_domains.push(domain.to_string());
        } else if let Ok(ip) = entry.parse::<IpAddr>() {
            self.no_proxy_ips.push(ip);
        } else if !entry.is_empty() {
            self.no_proxy_hosts.push(entry);
        }
        self
    }

    /// Check if `host` should bypass the proxy
    #[must_use]
    pub fn should_bypass(&self, host: &str) -> bool {
        let host = host.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase();

        if self.no_proxy_hosts.iter().any(|h| *h == host) {
            return true;
        }

        for domain in &self.no_proxy_domains {
            if host == *domain || host.ends_with(&format!(".{domain}")) {
                return true;
            }
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            return self.no_proxy_ips.contains(&ip);
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_suffix_and_ip_matches() {
        let bypass = ProxyBypass::new()
            .add("localhost")
            .add(".corp.example")
            .add("10.0.0.1");
        assert!(bypass.should_bypass("LOCALHOST"));
        assert!(bypass.should_bypass("corp.example"));
        assert!(bypass.should_bypass("git.corp.example"));
        assert!(!bypass.should_bypass("notcorp.example"));
        assert!(bypass.should_bypass("10.0.0.1"));
        assert!(!bypass.should_bypass("example.com"));
    }
}
