//! Connection reuse and capacity limits

mod common;

use std::sync::atomic::Ordering;

use common::{MockTransport, Probe, Reply, until};
use conduit_client::{Connection, HttpClient, HttpConfig, Request};

fn get(url: &str) -> Request {
    Request::get(url).build().expect("test URL should parse")
}

#[tokio::test]
async fn sequential_requests_reuse_one_connection() {
    let transport = MockTransport::new();
    transport.reply("h:80", Reply::text(200, "one"));
    transport.reply("h:80", Reply::text(200, "two"));
    let client = HttpClient::new(HttpConfig::default(), transport.clone()).expect("client");

    let first = client.fetch(get("http://h/a")).await.expect("first response");
    assert_eq!(first.text(), "one");
    assert_eq!(client.pool().idle_count(), 1);

    let second = client.fetch(get("http://h/b")).await.expect("second response");
    assert_eq!(second.text(), "two");
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(transport.connections()[0].exchanges(), 2);

    let stats = client.stats();
    assert_eq!(stats.pool_hits, 1);
    assert_eq!(stats.pool_misses, 1);
    assert_eq!(stats.requests_successful, 2);
}

#[tokio::test]
async fn per_host_limit_fails_fast_while_a_connection_is_out() {
    let transport = MockTransport::new();
    let config = HttpConfig::default().with_max_connections_per_host(Some(1));
    let client = HttpClient::new(config, transport.clone()).expect("client");

    transport.reply("h:80", Reply::text(200, "a"));
    transport.reply("h:80", Reply::text(200, "b"));
    client.fetch(get("http://h/1")).await.expect("first cycle");
    client.fetch(get("http://h/2")).await.expect("second cycle");
    assert_eq!(transport.connect_count(), 1);

    // Take the pooled connection and keep it busy.
    transport.reply(
        "h:80",
        Reply::new(200).header("content-length", "100").chunk("partial").then_hold(),
    );
    let probe = Probe::default();
    let busy = client.execute(get("http://h/slow"), probe.clone());
    until(|| probe.parts.load(Ordering::SeqCst) == 1).await;

    let err = client
        .fetch(get("http://h/3"))
        .await
        .expect_err("second connection to h must be refused");
    assert!(err.is_capacity_exceeded(), "{err}");
    assert_eq!(client.open_connections(), 1);

    transport.reply("other:80", Reply::text(200, "elsewhere"));
    let other = client.fetch(get("http://other/")).await.expect("other host is unaffected");
    assert_eq!(other.text(), "elsewhere");

    assert!(busy.cancel());
    assert!(busy.await.expect_err("canceled").is_canceled());

    transport.reply("h:80", Reply::text(200, "again"));
    let again = client.fetch(get("http://h/4")).await.expect("capacity is back");
    assert_eq!(again.text(), "again");
}

#[tokio::test]
async fn global_limit_counts_idle_connections() {
    let transport = MockTransport::new();
    let config = HttpConfig::default().with_max_connections(Some(1));
    let client = HttpClient::new(config, transport.clone()).expect("client");

    transport.reply("a:80", Reply::text(200, "a"));
    client.fetch(get("http://a/")).await.expect("first host");
    assert_eq!(client.pool().idle_count(), 1);

    let err = client
        .fetch(get("http://b/"))
        .await
        .expect_err("idle connection to a still holds the only slot");
    assert!(err.is_capacity_exceeded());
}

#[tokio::test]
async fn connection_close_header_prevents_pooling() {
    let transport = MockTransport::new();
    transport.reply("h:80", Reply::text(200, "bye").header("connection", "close"));
    transport.reply("h:80", Reply::text(200, "fresh"));
    let client = HttpClient::new(HttpConfig::default(), transport.clone()).expect("client");

    client.fetch(get("http://h/")).await.expect("first response");
    assert_eq!(client.pool().idle_count(), 0);
    assert!(!transport.connections()[0].is_open());

    client.fetch(get("http://h/")).await.expect("second response");
    assert_eq!(transport.connect_count(), 2);
}

#[tokio::test]
async fn http10_without_keep_alive_is_not_reused() {
    let transport = MockTransport::new();
    transport.reply("h:80", Reply::text(200, "old").version(http::Version::HTTP_10));
    let client = HttpClient::new(HttpConfig::default(), transport.clone()).expect("client");

    client.fetch(get("http://h/")).await.expect("response");
    assert_eq!(client.pool().idle_count(), 0);
}

#[tokio::test]
async fn partitions_do_not_share_connections() {
    let transport = MockTransport::new();
    transport.reply("h:80", Reply::text(200, "x"));
    transport.reply("h:80", Reply::text(200, "y"));
    let client = HttpClient::new(HttpConfig::default(), transport.clone()).expect("client");

    let a = Request::get("http://h/").partition("tenant-a").build().expect("request");
    let b = Request::get("http://h/").partition("tenant-b").build().expect("request");
    client.fetch(a).await.expect("tenant a");
    client.fetch(b).await.expect("tenant b");
    assert_eq!(transport.connect_count(), 2);
    assert_eq!(client.pool().idle_count(), 2);
}

#[tokio::test]
async fn refused_connect_is_a_connect_error() {
    let transport = MockTransport::new();
    transport.refuse("down:80");
    let client = HttpClient::new(HttpConfig::default(), transport.clone()).expect("client");

    let err = client.fetch(get("http://down/")).await.expect_err("refused");
    assert!(err.is_connect());
    assert_eq!(client.open_connections(), 0);
    assert_eq!(client.stats().connections_failed, 1);
}

#[tokio::test]
async fn closed_client_rejects_new_requests() {
    let transport = MockTransport::new();
    transport.reply("h:80", Reply::text(200, "x"));
    let client = HttpClient::new(HttpConfig::default(), transport.clone()).expect("client");
    client.fetch(get("http://h/")).await.expect("response");
    assert_eq!(client.pool().idle_count(), 1);

    client.close();
    client.close();
    assert!(client.is_closed());
    assert_eq!(client.pool().idle_count(), 0);
    assert!(!transport.connections()[0].is_open());

    let probe = Probe::default();
    let err = client
        .execute(get("http://h/"), probe.clone())
        .await
        .expect_err("closed client");
    assert!(err.is_request());
    assert_eq!(probe.throwables.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn close_notification_evicts_the_idle_connection() {
    let transport = MockTransport::new();
    transport.reply("h:80", Reply::text(200, "a"));
    let client = HttpClient::new(HttpConfig::default(), transport.clone()).expect("client");
    client.fetch(get("http://h/")).await.expect("response");
    assert_eq!(client.pool().idle_count(), 1);

    let conn = transport.connections()[0].clone();
    assert!(client.evict_connection(conn.id()));
    assert!(!client.evict_connection(conn.id()));
    assert!(!conn.is_open());
    assert_eq!(client.pool().idle_count(), 0);
    assert_eq!(client.open_connections(), 0);
    assert_eq!(client.stats().connections_closed, 1);
}
