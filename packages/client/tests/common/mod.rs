//! Scripted in-memory transport shared by the integration tests
//!
//! Replies are queued per `host:port`. A connection takes the next reply
//! for its address once the request it carries is fully written, so
//! several connections to one host share a single script.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use conduit_client::transport::BoxFuture;
use conduit_client::{Connection, RemoteAddress, RequestHead, StatusLine, Transport, WireEvent};
use futures::FutureExt;
use http::header::{CONTENT_LENGTH, EXPECT, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Version};
use tokio::sync::mpsc;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// One scripted response
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    version: Version,
    headers: Vec<(HeaderName, HeaderValue)>,
    chunks: Vec<Bytes>,
    ending: Ending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Complete,
    Close,
    Hold,
    /// The connection dies before any byte of a response.
    Stale,
}

impl Reply {
    pub fn new(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("valid test status"),
            version: Version::HTTP_11,
            headers: Vec::new(),
            chunks: Vec::new(),
            ending: Ending::Complete,
        }
    }

    /// Status with a `Content-Length` framed body.
    pub fn text(status: u16, body: &'static str) -> Self {
        Self::new(status)
            .header("content-length", &body.len().to_string())
            .chunk(body)
    }

    pub fn stale() -> Self {
        Self {
            ending: Ending::Stale,
            ..Self::new(200)
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((
            HeaderName::from_bytes(name.as_bytes()).expect("valid test header name"),
            HeaderValue::from_str(value).expect("valid test header value"),
        ));
        self
    }

    pub fn chunk(mut self, bytes: &'static str) -> Self {
        self.chunks.push(Bytes::from_static(bytes.as_bytes()));
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// End with a peer close instead of message completion.
    pub fn then_close(mut self) -> Self {
        self.ending = Ending::Close;
        self
    }

    /// Never finish the message.
    pub fn then_hold(mut self) -> Self {
        self.ending = Ending::Hold;
        self
    }

    fn events(&self) -> Vec<WireEvent> {
        if self.ending == Ending::Stale {
            return vec![WireEvent::Closed];
        }
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            headers.append(name.clone(), value.clone());
        }
        let mut events = vec![
            WireEvent::Status(StatusLine {
                version: self.version,
                status: self.status,
                reason: self.status.canonical_reason().unwrap_or_default().to_owned(),
            }),
            WireEvent::Headers(headers),
        ];
        events.extend(self.chunks.iter().cloned().map(WireEvent::Body));
        match self.ending {
            Ending::Complete => events.push(WireEvent::Complete),
            Ending::Close => events.push(WireEvent::Closed),
            Ending::Hold | Ending::Stale => {}
        }
        events
    }

    fn closes_connection(&self) -> bool {
        matches!(self.ending, Ending::Close | Ending::Stale)
    }
}

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<String, VecDeque<Reply>>,
    refused: HashSet<String>,
}

#[derive(Debug, Default)]
struct Shared {
    script: Mutex<Script>,
    heads: Mutex<Vec<RequestHead>>,
}

impl Shared {
    fn next_reply(&self, authority: &str) -> Option<Reply> {
        self.script
            .lock()
            .expect("script lock")
            .replies
            .get_mut(authority)
            .and_then(VecDeque::pop_front)
    }
}

/// In-memory [`Transport`] with scripted replies
#[derive(Debug, Default)]
pub struct MockTransport {
    shared: Arc<Shared>,
    connections: Mutex<Vec<Arc<MockConnection>>>,
    connects: AtomicUsize,
    throttle: AtomicBool,
    stall: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `reply` for the next request sent to `host:port`.
    pub fn reply(&self, authority: &str, reply: Reply) {
        self.shared
            .script
            .lock()
            .expect("script lock")
            .replies
            .entry(authority.to_owned())
            .or_default()
            .push_back(reply);
    }

    pub fn refuse(&self, authority: &str) {
        self.shared
            .script
            .lock()
            .expect("script lock")
            .refused
            .insert(authority.to_owned());
    }

    /// Make every connection report a full write queue on every other check.
    pub fn throttle_writes(&self) {
        self.throttle.store(true, Ordering::SeqCst);
    }

    /// Make every new connection report a full write queue forever.
    pub fn stall_writes(&self) {
        self.stall.store(true, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Every request head written, in order.
    pub fn heads(&self) -> Vec<RequestHead> {
        self.shared.heads.lock().expect("heads lock").clone()
    }

    pub fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections.lock().expect("connections lock").clone()
    }
}

impl Transport for MockTransport {
    fn connect(&self, address: &RemoteAddress) -> BoxFuture<'static, io::Result<Arc<dyn Connection>>> {
        let authority = format!("{}:{}", address.host, address.port);
        let refused = self
            .shared
            .script
            .lock()
            .expect("script lock")
            .refused
            .contains(&authority);
        if refused {
            return async { Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")) }.boxed();
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        let conn = Arc::new(MockConnection::new(
            authority,
            Arc::clone(&self.shared),
            self.throttle.load(Ordering::SeqCst),
            self.stall.load(Ordering::SeqCst),
        ));
        self.connections
            .lock()
            .expect("connections lock")
            .push(Arc::clone(&conn));
        let conn: Arc<dyn Connection> = conn;
        async move { Ok(conn) }.boxed()
    }
}

/// One scripted connection
#[derive(Debug)]
pub struct MockConnection {
    id: u64,
    authority: String,
    shared: Arc<Shared>,
    open: AtomicBool,
    throttled: bool,
    stalled: bool,
    checks: AtomicUsize,
    max_pending: AtomicUsize,
    received: Mutex<BytesMut>,
    exchanges: AtomicUsize,
    tx: mpsc::UnboundedSender<WireEvent>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<WireEvent>>,
}

impl MockConnection {
    fn new(authority: String, shared: Arc<Shared>, throttled: bool, stalled: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            authority,
            shared,
            open: AtomicBool::new(true),
            throttled,
            stalled,
            checks: AtomicUsize::new(0),
            max_pending: AtomicUsize::new(usize::MAX),
            received: Mutex::new(BytesMut::new()),
            exchanges: AtomicUsize::new(0),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Body bytes written on this connection, across exchanges.
    pub fn received(&self) -> Bytes {
        self.received.lock().expect("received lock").clone().freeze()
    }

    /// Requests fully written on this connection.
    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    fn respond(&self) {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        let Some(reply) = self.shared.next_reply(&self.authority) else {
            return;
        };
        for event in reply.events() {
            let _ = self.tx.send(event);
        }
        if reply.closes_connection() {
            self.open.store(false, Ordering::SeqCst);
        }
    }
}

impl Connection for MockConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send_head<'a>(&'a self, head: &'a RequestHead) -> BoxFuture<'a, io::Result<()>> {
        async move {
            if !self.is_open() {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection closed"));
            }
            self.shared.heads.lock().expect("heads lock").push(head.clone());
            let expects_continue = head
                .headers
                .get(EXPECT)
                .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"100-continue"));
            if expects_continue {
                let _ = self.tx.send(WireEvent::Status(StatusLine {
                    version: Version::HTTP_11,
                    status: StatusCode::CONTINUE,
                    reason: "Continue".to_owned(),
                }));
            }
            let has_body = head.headers.contains_key(CONTENT_LENGTH) || head.headers.contains_key(TRANSFER_ENCODING);
            if !has_body {
                self.respond();
            }
            Ok(())
        }
        .boxed()
    }

    fn send_body(&self, chunk: Bytes, last: bool) -> BoxFuture<'_, io::Result<()>> {
        async move {
            if !self.is_open() {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection closed"));
            }
            self.received.lock().expect("received lock").extend_from_slice(&chunk);
            if last {
                self.respond();
            }
            Ok(())
        }
        .boxed()
    }

    fn can_write(&self) -> bool {
        !self.stalled && (!self.throttled || self.checks.fetch_add(1, Ordering::SeqCst) % 2 == 0)
    }

    fn writable(&self) -> BoxFuture<'_, ()> {
        async { tokio::time::sleep(Duration::from_millis(1)).await }.boxed()
    }

    fn next_event(&self) -> BoxFuture<'_, WireEvent> {
        async move {
            let mut rx = self.rx.lock().await;
            rx.recv().await.unwrap_or(WireEvent::Closed)
        }
        .boxed()
    }

    fn skip_remainder(&self) {}

    fn start_tls<'a>(&'a self, _host: &'a str) -> BoxFuture<'a, io::Result<()>> {
        async { Ok(()) }.boxed()
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn max_pending_bytes(&self) -> usize {
        self.max_pending.load(Ordering::SeqCst)
    }

    fn set_max_pending_bytes(&self, bytes: usize) {
        self.max_pending.store(bytes, Ordering::SeqCst);
    }
}

/// Handler that records what it saw and never holds the response.
#[derive(Debug, Default, Clone)]
pub struct Probe {
    pub parts: Arc<AtomicUsize>,
    pub throwables: Arc<AtomicUsize>,
    pub completions: Arc<AtomicUsize>,
    pub write_completions: Arc<AtomicUsize>,
    pub written: Arc<AtomicU64>,
    pub last_status: u16,
}

impl conduit_client::AsyncHandler for Probe {
    type Output = u16;

    fn on_status_received(&mut self, status: &conduit_client::ResponseStatus) -> Result<conduit_client::State, conduit_client::BoxError> {
        self.last_status = status.status().as_u16();
        Ok(conduit_client::State::Continue)
    }

    fn on_body_part_received(&mut self, _part: &conduit_client::BodyPart) -> Result<conduit_client::State, conduit_client::BoxError> {
        self.parts.fetch_add(1, Ordering::SeqCst);
        Ok(conduit_client::State::Continue)
    }

    fn on_completed(&mut self) -> Result<u16, conduit_client::BoxError> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        Ok(self.last_status)
    }

    fn on_throwable(&mut self, _error: &conduit_client::Error) {
        self.throwables.fetch_add(1, Ordering::SeqCst);
    }

    fn on_content_write_progress(&mut self, _amount: u64, current: u64, _total: Option<u64>) {
        self.written.store(current, Ordering::SeqCst);
    }

    fn on_content_write_completed(&mut self) {
        self.write_completions.fetch_add(1, Ordering::SeqCst);
    }
}

/// Wait until `condition` holds, yielding to the runtime in between.
pub async fn until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
