//! Per-attempt transaction context
//!
//! A context is a value. Starting a replay clones it into a new context for
//! the next attempt instead of mutating the current one.

use crate::auth::basic_auth;
use crate::config::HttpConfig;
use crate::http::Request;
use crate::status::StatusHandler;

/// Immutable description of one attempt of a logical request
#[derive(Debug, Clone)]
pub struct TransactionContext {
    request: Request,
    redirect_count: u32,
    max_redirects: u32,
    follow_redirects: bool,
    status_handler: Option<StatusHandler>,
    www_auth_attempts: u8,
    proxy_auth_attempts: u8,
    retry_count: u32,
    attempt: u32,
}

impl TransactionContext {
    /// Context for the first attempt.
    ///
    /// A preemptive Basic realm puts its `Authorization` header on the
    /// request here, so every later attempt carries it too.
    ///
    /// # Errors
    ///
    /// Fails if the preemptive credentials cannot be encoded.
    pub fn new(mut request: Request, config: &HttpConfig) -> crate::Result<Self> {
        let realm = request.realm().or(config.realm.as_ref()).cloned();
        if let Some(realm) = realm
            && realm.applies_preemptively()
            && !request.headers().contains_key(http::header::AUTHORIZATION)
        {
            let value = basic_auth(realm.principal(), Some(realm.password()))?;
            request.headers_mut().insert(http::header::AUTHORIZATION, value);
        }
        let follow_redirects = request.follow_redirects().unwrap_or(config.follow_redirects);
        Ok(Self {
            request,
            redirect_count: 0,
            max_redirects: config.max_redirects,
            follow_redirects,
            status_handler: None,
            www_auth_attempts: 0,
            proxy_auth_attempts: 0,
            retry_count: 0,
            attempt: 1,
        })
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[must_use]
    pub fn redirect_count(&self) -> u32 {
        self.redirect_count
    }

    #[must_use]
    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    #[must_use]
    pub fn follows_redirects(&self) -> bool {
        self.follow_redirects
    }

    /// Status handler bound by an earlier response of this transaction.
    #[must_use]
    pub fn status_handler(&self) -> Option<StatusHandler> {
        self.status_handler
    }

    #[must_use]
    pub fn www_auth_attempts(&self) -> u8 {
        self.www_auth_attempts
    }

    #[must_use]
    pub fn proxy_auth_attempts(&self) -> u8 {
        self.proxy_auth_attempts
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// 1-based number of this attempt within the logical request.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// True if another redirect would exceed the limit.
    #[must_use]
    pub fn redirect_limit_reached(&self) -> bool {
        self.redirect_count + 1 > self.max_redirects
    }

    fn next(&self, request: Request) -> Self {
        Self {
            request,
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    /// Context for following a redirect to `request`.
    ///
    /// The new location may challenge on its own, so the auth retry
    /// counters start over.
    #[must_use]
    pub fn for_redirect(&self, request: Request) -> Self {
        Self {
            redirect_count: self.redirect_count + 1,
            status_handler: Some(StatusHandler::Redirect),
            www_auth_attempts: 0,
            proxy_auth_attempts: 0,
            ..self.next(request)
        }
    }

    /// Context for answering an authentication challenge. Does not touch the
    /// redirect count.
    #[must_use]
    pub fn for_auth_retry(&self, request: Request, proxy: bool) -> Self {
        let mut next = self.next(request);
        if proxy {
            next.proxy_auth_attempts += 1;
            next.status_handler = Some(StatusHandler::ProxyAuthorization);
        } else {
            next.www_auth_attempts += 1;
            next.status_handler = Some(StatusHandler::Authorization);
        }
        next
    }

    /// Context for a replay requested by a response filter.
    #[must_use]
    pub fn for_filter_replay(&self, request: Request) -> Self {
        Self {
            status_handler: None,
            ..self.next(request)
        }
    }

    /// Context for resending the same request after a stale pooled
    /// connection closed under it.
    #[must_use]
    pub fn for_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.next(self.request.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Realm;

    fn request(url: &str) -> Request {
        Request::get(url).build().expect("test URL should parse")
    }

    #[test]
    fn redirect_copy_increments_count_and_binds_handler() {
        let config = HttpConfig::default().with_max_redirects(2);
        let first = TransactionContext::new(request("http://h/a"), &config).expect("context");
        let second = first.for_redirect(request("http://h/b"));
        assert_eq!(first.redirect_count(), 0);
        assert_eq!(second.redirect_count(), 1);
        assert_eq!(second.attempt(), 2);
        assert_eq!(second.status_handler(), Some(StatusHandler::Redirect));
        assert_eq!(second.request().url().path(), "/b");
        let third = second.for_redirect(request("http://h/c"));
        assert!(third.redirect_limit_reached());
    }

    #[test]
    fn auth_retry_keeps_redirect_count() {
        let config = HttpConfig::default();
        let ctx = TransactionContext::new(request("http://h/"), &config)
            .expect("context")
            .for_redirect(request("http://h/x"));
        let retried = ctx.for_auth_retry(request("http://h/x"), false);
        assert_eq!(retried.redirect_count(), 1);
        assert_eq!(retried.www_auth_attempts(), 1);
        assert_eq!(retried.proxy_auth_attempts(), 0);
        assert_eq!(retried.status_handler(), Some(StatusHandler::Authorization));
    }

    #[test]
    fn redirect_clears_auth_attempts() {
        let config = HttpConfig::default();
        let answered = TransactionContext::new(request("http://h/"), &config)
            .expect("context")
            .for_auth_retry(request("http://h/"), false)
            .for_auth_retry(request("http://h/"), true);
        assert_eq!(answered.www_auth_attempts(), 1);
        assert_eq!(answered.proxy_auth_attempts(), 1);

        let moved = answered.for_redirect(request("http://other/b"));
        assert_eq!(moved.www_auth_attempts(), 0);
        assert_eq!(moved.proxy_auth_attempts(), 0);
        assert_eq!(moved.redirect_count(), 1);
    }

    #[test]
    fn request_override_beats_client_redirect_flag() {
        let config = HttpConfig::default().with_follow_redirects(true);
        let request = Request::get("http://h/")
            .follow_redirects(false)
            .build()
            .expect("test URL should parse");
        let ctx = TransactionContext::new(request, &config).expect("context");
        assert!(!ctx.follows_redirects());
    }

    #[test]
    fn preemptive_realm_sets_authorization_up_front() {
        let config = HttpConfig::default().with_realm(Realm::basic("u", "p").preemptive(true));
        let ctx = TransactionContext::new(request("http://h/"), &config).expect("context");
        assert_eq!(ctx.request().headers()[http::header::AUTHORIZATION], "Basic dTpw");
    }
}
