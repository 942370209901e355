//! Core HTTP client implementation
//!
//! `HttpClient` owns the shared pieces (configuration, connection manager,
//! pool and statistics) and spawns one driver task per submitted request.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use tokio::sync::oneshot;

use super::stats::{ClientStats, ClientStatsSnapshot};
use crate::config::HttpConfig;
use crate::connect::ConnectionManager;
use crate::error;
use crate::http::{Request, Response, response::ResponseCollector};
use crate::pool::{ConnectionPool, PoolSettings};
use crate::transport::Transport;
use crate::txn::context::TransactionContext;
use crate::txn::driver;
use crate::txn::future::{CancelSignal, ResponseFuture};
use crate::txn::handler::{AsyncHandler, HandlerCell};

/// State shared by a client and its in-flight transactions
#[derive(Debug)]
pub(crate) struct ClientInner {
    pub(crate) config: Arc<HttpConfig>,
    pub(crate) manager: ConnectionManager,
    pub(crate) stats: Arc<ClientStats>,
    runtime: Handle,
    closed: AtomicBool,
}

/// Asynchronous HTTP client
///
/// Cheap to clone; clones share the pool and statistics.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

impl HttpClient {
    /// Client running its transactions on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Invalid configuration, or no runtime in context.
    pub fn new(config: HttpConfig, transport: Arc<dyn Transport>) -> crate::Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| error::builder(format!("HttpClient::new needs a Tokio runtime: {e}")))?;
        Self::with_runtime(config, transport, runtime)
    }

    /// Client running its transactions on `runtime`.
    ///
    /// # Errors
    ///
    /// Invalid configuration.
    pub fn with_runtime(config: HttpConfig, transport: Arc<dyn Transport>, runtime: Handle) -> crate::Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let stats = Arc::new(ClientStats::new());
        let pool = Arc::new(ConnectionPool::new(PoolSettings::from_config(&config), Arc::clone(&stats)));
        if config.pooling_enabled {
            pool.start_reaper(&runtime);
        }
        let manager = ConnectionManager::new(transport, pool, Arc::clone(&config), Arc::clone(&stats));
        tracing::debug!(target: "conduit::pool", pooling = config.pooling_enabled, "client created");
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                manager,
                stats,
                runtime,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Submit `request`; events go to `handler`.
    ///
    /// Never blocks. Every failure, including ones found before anything is
    /// sent, is reported through the returned future and `on_throwable`.
    pub fn execute<H: AsyncHandler>(&self, request: Request, handler: H) -> ResponseFuture<H::Output> {
        self.execute_boxed(request, Box::new(handler))
    }

    /// [`HttpClient::execute`] for an already boxed handler.
    pub fn execute_boxed<T: Send + 'static>(
        &self,
        request: Request,
        handler: Box<dyn AsyncHandler<Output = T>>,
    ) -> ResponseFuture<T> {
        let cancel = Arc::new(CancelSignal::default());
        let (tx, rx) = oneshot::channel();
        let future = ResponseFuture::new(rx, Arc::clone(&cancel), self.inner.runtime.clone());
        let mut handler = HandlerCell::new(handler);
        self.inner.stats.record_request();

        let ctx = if self.is_closed() {
            Err(error::request("client is closed").with_url(request.url().clone()))
        } else {
            TransactionContext::new(request, &self.inner.config)
        };
        match ctx {
            Ok(ctx) => {
                self.inner
                    .runtime
                    .spawn(driver::run(Arc::clone(&self.inner), ctx, handler, cancel, tx));
            }
            Err(e) => {
                self.inner.stats.record_failure();
                handler.fail(&e);
                let _ = tx.send(Err(e));
            }
        }
        future
    }

    /// Submit `request` and collect the whole response.
    pub fn fetch(&self, request: Request) -> ResponseFuture<Response> {
        self.execute(request, ResponseCollector::new())
    }

    #[must_use]
    pub fn config(&self) -> &HttpConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn stats(&self) -> ClientStatsSnapshot {
        self.inner.stats.snapshot()
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        self.inner.manager.pool()
    }

    /// Drop the pooled connection with `id` after its transport saw it close.
    ///
    /// Returns false if the connection is not idle in the pool.
    pub fn evict_connection(&self, id: u64) -> bool {
        self.inner.manager.pool().evict(id)
    }

    /// Open connections, idle and in use.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.inner.manager.limiter().open_connections()
    }

    /// Stop accepting requests and close every pooled connection.
    ///
    /// In-flight transactions run to completion; their connections are
    /// closed instead of pooled. Idempotent.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(target: "conduit::pool", "closing client");
            self.inner.manager.pool().shutdown();
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}
