//! Transaction driver
//!
//! One spawned task per logical request. Each loop iteration is one
//! attempt: obtain a connection, write the request, feed wire events to the
//! dispatcher, then either finish or derive the next attempt's context.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::context::TransactionContext;
use super::dispatcher::{EventDispatcher, Finish, Step};
use super::future::CancelSignal;
use super::handler::{AsyncHandler, HandlerCell};
use crate::client::ClientInner;
use crate::error::{self, Error};
use crate::feeder::writer::{BodyWriter, Progress};
use crate::pool::PooledConnection;
use crate::proxy::{self, ProxyServer};
use crate::transport::{Connection, WireEvent};

enum Attempt<T> {
    Done(crate::Result<T>),
    Replay {
        ctx: TransactionContext,
        handler: Option<Box<dyn std::any::Any + Send>>,
    },
}

/// Drive a transaction to its end and deliver the result.
pub(crate) async fn run<T: Send + 'static>(
    inner: Arc<ClientInner>,
    ctx: TransactionContext,
    mut handler: HandlerCell<T>,
    cancel: Arc<CancelSignal>,
    tx: oneshot::Sender<crate::Result<T>>,
) {
    let result = drive(&inner, ctx, &mut handler, &cancel).await;
    match &result {
        Ok(_) => inner.stats.record_success(),
        Err(e) => {
            inner.stats.record_failure();
            tracing::debug!(target: "conduit::txn", error = %e, "transaction failed");
        }
    }
    if tx.send(result).is_err() {
        tracing::trace!(target: "conduit::txn", "result future dropped before completion");
    }
}

async fn drive<T: Send + 'static>(
    inner: &ClientInner,
    mut ctx: TransactionContext,
    handler: &mut HandlerCell<T>,
    cancel: &CancelSignal,
) -> crate::Result<T> {
    loop {
        if cancel.is_canceled() {
            return Err(canceled(handler));
        }
        let proxy = proxy::select(ctx.request(), inner.config.proxy.as_ref()).cloned();
        tracing::debug!(
            target: "conduit::txn",
            url = %ctx.request().url(),
            method = %ctx.request().method(),
            attempt = ctx.attempt(),
            "dispatching request",
        );

        let obtained = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(canceled(handler)),
            conn = inner.manager.obtain(ctx.request(), proxy.as_ref()) => conn,
        };
        let conn = match obtained {
            Ok(conn) => conn,
            Err(e) => {
                handler.fail(&e);
                return Err(e);
            }
        };

        match attempt(inner, &ctx, handler, cancel, conn, proxy.as_ref()).await {
            Attempt::Done(result) => return result,
            Attempt::Replay { ctx: next, handler: replacement } => {
                if let Some(replacement) = replacement {
                    match replacement.downcast::<Box<dyn AsyncHandler<Output = T>>>() {
                        Ok(replacement) => handler.replace(*replacement),
                        Err(_) => {
                            let e = error::handler("replacement handler has a different output type")
                                .with_url(next.request().url().clone());
                            handler.fail(&e);
                            return Err(e);
                        }
                    }
                }
                record_replay(inner, &ctx, &next);
                ctx = next;
            }
        }
    }
}

fn record_replay(inner: &ClientInner, previous: &TransactionContext, next: &TransactionContext) {
    if next.redirect_count() > previous.redirect_count() {
        inner.stats.record_redirect();
        tracing::debug!(target: "conduit::txn", to = %next.request().url(), hop = next.redirect_count(), "following redirect");
    } else if next.www_auth_attempts() > previous.www_auth_attempts()
        || next.proxy_auth_attempts() > previous.proxy_auth_attempts()
    {
        inner.stats.record_auth_retry();
    } else if next.retry_count() > previous.retry_count() {
        inner.stats.record_request_retry();
    }
}

fn canceled<T: Send + 'static>(handler: &mut HandlerCell<T>) -> Error {
    let e = error::canceled();
    handler.fail(&e);
    e
}

/// A reused connection that fails while the head is written is presumed
/// stale; the request goes out again on another one if its body allows.
fn retry_after_write_failure(inner: &ClientInner, ctx: &TransactionContext, conn: &PooledConnection) -> bool {
    conn.is_reused() && ctx.request().body().is_replayable() && ctx.retry_count() < inner.config.max_request_retry
}

async fn attempt<T: Send + 'static>(
    inner: &ClientInner,
    ctx: &TransactionContext,
    handler: &mut HandlerCell<T>,
    cancel: &CancelSignal,
    conn: PooledConnection,
    proxy: Option<&ProxyServer>,
) -> Attempt<T> {
    let config = &inner.config;
    let head = match ctx.request().head(proxy, &config.user_agent) {
        Ok(head) => head,
        Err(e) => {
            inner.manager.discard(conn);
            handler.fail(&e);
            return Attempt::Done(Err(e));
        }
    };
    let wire = Arc::clone(conn.connection());
    let deadline = ctx
        .request()
        .request_timeout()
        .or(config.request_timeout)
        .map(|timeout| (Instant::now() + timeout, timeout));

    let sent = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            inner.manager.discard(conn);
            return Attempt::Done(Err(canceled(handler)));
        }
        sent = wire.send_head(&head) => sent,
    };
    if let Err(e) = sent {
        if retry_after_write_failure(inner, ctx, &conn) {
            tracing::debug!(target: "conduit::txn", id = conn.id(), error = %e, "stale pooled connection, retrying");
            inner.manager.discard(conn);
            return Attempt::Replay {
                ctx: ctx.for_retry(),
                handler: None,
            };
        }
        inner.manager.discard(conn);
        let e = error::request(e).with_url(ctx.request().url().clone());
        handler.fail(&e);
        return Attempt::Done(Err(e));
    }
    handler.notify("on_headers_written", |h| h.on_headers_written());

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let total = ctx.request().body().content_length();
    let writer = BodyWriter::new(
        Arc::clone(&wire),
        progress_tx,
        config.feeder_max_pending_bytes,
        config.write_timeout,
    );
    let write = writer.write(ctx.request().body().clone());
    tokio::pin!(write);
    let mut writing = !ctx.request().expects_continue();
    let mut body_done = false;
    let mut dispatcher = EventDispatcher::new(ctx, config, proxy, conn.is_reused());

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                dispatcher.abort();
                inner.manager.discard(conn);
                return Attempt::Done(Err(canceled(handler)));
            }
            written = &mut write, if writing && !body_done => {
                body_done = true;
                match written {
                    Ok(bytes) => inner.stats.record_bytes_sent(bytes),
                    Err(e) => {
                        dispatcher.abort();
                        drain_progress(&mut progress_rx, handler, total);
                        inner.manager.discard(conn);
                        let e = e.with_url(ctx.request().url().clone());
                        handler.fail(&e);
                        return Attempt::Done(Err(e));
                    }
                }
            }
            Some(progress) = progress_rx.recv() => on_progress(handler, progress, total),
            event = next_event(wire.as_ref(), deadline, config.read_idle_timeout) => {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        dispatcher.abort();
                        inner.manager.discard(conn);
                        let e = e.with_url(ctx.request().url().clone());
                        handler.fail(&e);
                        return Attempt::Done(Err(e));
                    }
                };
                match dispatcher.on_event(event, handler) {
                    Step::Continue => {}
                    Step::ResumeBody => writing = true,
                    Step::Finished(finish) => {
                        drain_progress(&mut progress_rx, handler, total);
                        inner.stats.record_bytes_received(dispatcher.bytes_received());
                        return finish_attempt(inner, handler, conn, finish, body_done);
                    }
                }
            }
        }
    }
}

fn finish_attempt<T: Send + 'static>(
    inner: &ClientInner,
    handler: &mut HandlerCell<T>,
    conn: PooledConnection,
    finish: Finish,
    body_done: bool,
) -> Attempt<T> {
    match finish {
        Finish::Completed { reusable } => {
            settle(inner, conn, reusable && body_done);
            Attempt::Done(handler.complete())
        }
        Finish::Replay {
            ctx,
            handler: replacement,
            reuse_connection,
        } => {
            settle(inner, conn, reuse_connection && body_done);
            Attempt::Replay {
                ctx,
                handler: replacement,
            }
        }
        Finish::Failed(e) => {
            inner.manager.discard(conn);
            handler.fail(&e);
            Attempt::Done(Err(e))
        }
        Finish::Upgrade => {
            tracing::debug!(target: "conduit::txn", id = conn.id(), "handing connection to upgrade handler");
            inner.stats.record_connection_closed();
            let raw = conn.detach();
            match handler.upgrade(raw) {
                Ok(()) => Attempt::Done(handler.complete()),
                Err(e) => {
                    handler.fail(&e);
                    Attempt::Done(Err(e))
                }
            }
        }
    }
}

/// Pool the connection if the exchange left it clean, otherwise close it.
fn settle(inner: &ClientInner, mut conn: PooledConnection, reusable: bool) {
    if reusable {
        conn.set_cacheable(true);
        inner.manager.release(conn);
    } else {
        conn.connection().skip_remainder();
        inner.manager.discard(conn);
    }
}

fn on_progress<T: Send + 'static>(handler: &mut HandlerCell<T>, progress: Progress, total: Option<u64>) {
    match progress {
        Progress::Written { amount, current } => {
            handler.notify("on_content_write_progress", |h| h.on_content_write_progress(amount, current, total));
        }
        Progress::Completed => handler.notify("on_content_write_completed", |h| h.on_content_write_completed()),
    }
}

fn drain_progress<T: Send + 'static>(
    rx: &mut mpsc::UnboundedReceiver<Progress>,
    handler: &mut HandlerCell<T>,
    total: Option<u64>,
) {
    while let Ok(progress) = rx.try_recv() {
        on_progress(handler, progress, total);
    }
}

/// Next wire event, bounded by the request deadline and the read-idle timeout.
async fn next_event(
    conn: &dyn Connection,
    deadline: Option<(Instant, Duration)>,
    read_idle: Option<Duration>,
) -> crate::Result<WireEvent> {
    let idle_at = read_idle.map(|idle| Instant::now() + idle);
    let limit = match (deadline.map(|(at, _)| at), idle_at) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    let Some(limit) = limit else {
        return Ok(conn.next_event().await);
    };
    match tokio::time::timeout_at(limit, conn.next_event()).await {
        Ok(event) => Ok(event),
        Err(_) => Err(match deadline {
            Some((at, timeout)) if Instant::now() >= at => {
                tracing::debug!(target: "conduit::txn", ?timeout, "request timeout");
                error::timeout(format!("request timeout of {timeout:?} elapsed"))
            }
            _ => {
                tracing::debug!(target: "conduit::txn", timeout = ?read_idle, "read idle timeout");
                error::timeout(format!("no data for {:?}", read_idle.unwrap_or_default()))
            }
        }),
    }
}
