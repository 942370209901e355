//! Request transactions
//!
//! A transaction is one logical request: possibly several attempts
//! (redirects, auth retries, filter replays, stale-connection retries)
//! feeding one handler and completing one [`ResponseFuture`].

pub mod context;
pub(crate) mod dispatcher;
pub(crate) mod driver;
pub mod filter;
pub mod future;
pub mod handler;

pub use context::TransactionContext;
pub use dispatcher::ProtocolState;
pub use filter::{FilterContext, ResponseFilter, ResponseFilters};
pub use future::ResponseFuture;
pub use handler::{AsyncHandler, State};
