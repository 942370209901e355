//! Credentials descriptor

use std::fmt;
use std::sync::Arc;

use super::authenticator::Authenticator;

/// Authentication scheme a realm is configured for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
    Ntlm,
    Negotiate,
}

impl AuthScheme {
    /// Scheme token as it appears in challenges.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::Basic => "Basic",
            AuthScheme::Digest => "Digest",
            AuthScheme::Ntlm => "NTLM",
            AuthScheme::Negotiate => "Negotiate",
        }
    }
}

/// Credentials used to answer `401` and `407` challenges
///
/// Schemes other than Basic need an [`Authenticator`] attached with
/// [`Realm::with_authenticator`]; without one their challenges are handed to
/// the caller unanswered.
#[derive(Clone)]
pub struct Realm {
    principal: String,
    password: String,
    scheme: AuthScheme,
    preemptive: bool,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl Realm {
    /// Basic credentials, sent only after a challenge.
    #[must_use]
    pub fn basic(principal: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(AuthScheme::Basic, principal, password)
    }

    #[must_use]
    pub fn new(scheme: AuthScheme, principal: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            password: password.into(),
            scheme,
            preemptive: false,
            authenticator: None,
        }
    }

    /// Send credentials on the first attempt instead of waiting for a challenge.
    /// Only honoured for Basic.
    #[must_use]
    pub fn preemptive(mut self, preemptive: bool) -> Self {
        self.preemptive = preemptive;
        self
    }

    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    #[must_use]
    pub fn principal(&self) -> &str {
        &self.principal
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn scheme(&self) -> &AuthScheme {
        &self.scheme
    }

    #[must_use]
    pub fn authenticator(&self) -> Option<&Arc<dyn Authenticator>> {
        self.authenticator.as_ref()
    }

    /// True if credentials go out before any challenge.
    #[must_use]
    pub fn applies_preemptively(&self) -> bool {
        self.preemptive && self.scheme == AuthScheme::Basic
    }
}

impl fmt::Debug for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realm")
            .field("principal", &self.principal)
            .field("password", &"<redacted>")
            .field("scheme", &self.scheme)
            .field("preemptive", &self.preemptive)
            .field("authenticator", &self.authenticator)
            .finish()
    }
}
