//! Status handlers
//!
//! A status handler may claim a response (redirect, 401, 407) and turn it
//! into a replay instead of delivering it. The kinds form a closed set and
//! dispatch through [`StatusHandler::handle`].

pub mod authorization;

use http::header::{PROXY_AUTHENTICATE, WWW_AUTHENTICATE};
use http::{HeaderMap, StatusCode};

use crate::config::HttpConfig;
use crate::proxy::ProxyServer;
use crate::redirect::{is_redirect, replay::redirect_request};
use crate::txn::context::TransactionContext;

/// Kind of status handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusHandler {
    /// 301, 302, 303, 307, 308
    Redirect,
    /// 401
    Authorization,
    /// 407
    ProxyAuthorization,
}

/// What a claimed response turns into
#[derive(Debug)]
pub enum Handled {
    /// Replay with the new context.
    Replay(TransactionContext),
    /// The handler gave up; deliver the response normally.
    Deliver,
}

impl StatusHandler {
    /// Handler registered for `status`, if any.
    #[must_use]
    pub fn for_status(status: StatusCode) -> Option<Self> {
        if is_redirect(status) {
            Some(StatusHandler::Redirect)
        } else if status == StatusCode::UNAUTHORIZED {
            Some(StatusHandler::Authorization)
        } else if status == StatusCode::PROXY_AUTHENTICATION_REQUIRED {
            Some(StatusHandler::ProxyAuthorization)
        } else {
            None
        }
    }

    #[must_use]
    pub fn handles_status(self, status: StatusCode) -> bool {
        StatusHandler::for_status(status) == Some(self)
    }

    /// Whether this handler takes the response over for `ctx`.
    ///
    /// Redirects need following enabled. Authorization needs credentials,
    /// no preemptive Basic already sent, and no earlier retry for the same
    /// challenge kind within this transaction.
    #[must_use]
    pub fn claims(self, ctx: &TransactionContext, config: &HttpConfig, proxy: Option<&ProxyServer>) -> bool {
        match self {
            StatusHandler::Redirect => ctx.follows_redirects(),
            StatusHandler::Authorization => {
                let realm = ctx.request().realm().or(config.realm.as_ref());
                realm.is_some_and(|r| !r.applies_preemptively()) && ctx.www_auth_attempts() == 0
            }
            StatusHandler::ProxyAuthorization => {
                proxy.is_some_and(|p| p.realm().is_some()) && ctx.proxy_auth_attempts() == 0
            }
        }
    }

    /// Build the replay for a claimed response.
    ///
    /// # Errors
    ///
    /// Invalid `Location`, or a failing challenge responder.
    pub fn handle(
        self,
        status: StatusCode,
        headers: &HeaderMap,
        ctx: &TransactionContext,
        config: &HttpConfig,
        proxy: Option<&ProxyServer>,
    ) -> crate::Result<Handled> {
        let request = ctx.request();
        let handled = match self {
            StatusHandler::Redirect => redirect_request(request, status, headers, config)?
                .map(|next| ctx.for_redirect(next)),
            StatusHandler::Authorization => {
                match request.realm().or(config.realm.as_ref()) {
                    Some(realm) => authorization::answer(request, headers, WWW_AUTHENTICATE, realm)?
                        .map(|next| ctx.for_auth_retry(next, false)),
                    None => None,
                }
            }
            StatusHandler::ProxyAuthorization => match proxy.and_then(ProxyServer::realm) {
                Some(realm) => authorization::answer(request, headers, PROXY_AUTHENTICATE, realm)?
                    .map(|next| ctx.for_auth_retry(next, true)),
                None => None,
            },
        };
        Ok(handled.map_or(Handled::Deliver, Handled::Replay))
    }
}
