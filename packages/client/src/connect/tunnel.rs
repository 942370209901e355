//! `CONNECT` tunnels through an HTTP proxy
//!
//! The tunnel is set up on the raw proxy connection before it is handed to a
//! transaction. A `407` is answered once with the proxy's realm; any other
//! non-2xx status fails the acquisition.

use http::header::{HOST, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method, StatusCode, Version};

use crate::auth::authenticator::respond_to_challenges;
use crate::error;
use crate::http::Request;
use crate::pool::{EndpointKey, PooledConnection};
use crate::proxy::ProxyServer;
use crate::transport::{Connection, RequestHead, WireEvent};

struct TunnelResponse {
    status: StatusCode,
    headers: HeaderMap,
}

pub(crate) async fn establish(conn: &PooledConnection, proxy: &ProxyServer, user_agent: &str) -> crate::Result<()> {
    let key = conn.key();
    let authority = format!("{}:{}", key.host(), key.port());
    let mut authorization: Option<HeaderValue> = None;

    for attempt in 0..2 {
        let head = connect_head(&authority, user_agent, authorization.as_ref())?;
        let connection = conn.connection();
        connection.send_head(&head).await.map_err(error::connect)?;
        let response = read_response(connection.as_ref()).await?;

        if response.status.is_success() {
            tracing::debug!(target: "conduit::connect", %authority, proxy = proxy.host(), "tunnel established");
            return connection.start_tls(key.host()).await.map_err(error::connect);
        }

        if response.status == StatusCode::PROXY_AUTHENTICATION_REQUIRED
            && attempt == 0
            && connection.is_open()
            && let Some(realm) = proxy.realm()
        {
            let request = tunnel_request(key)?;
            authorization = respond_to_challenges(&response.headers, PROXY_AUTHENTICATE, realm, &request)?;
            if authorization.is_some() {
                tracing::debug!(target: "conduit::connect", %authority, "retrying CONNECT with proxy credentials");
                continue;
            }
        }

        return Err(error::connect(format!(
            "proxy CONNECT to {authority} failed with status {}",
            response.status
        )));
    }

    Err(error::connect(format!("proxy rejected credentials for {authority}")))
}

fn tunnel_request(key: &EndpointKey) -> crate::Result<Request> {
    Request::builder(Method::CONNECT, &format!("https://{}:{}/", key.host(), key.port())).build()
}

fn connect_head(authority: &str, user_agent: &str, authorization: Option<&HeaderValue>) -> crate::Result<RequestHead> {
    let mut headers = HeaderMap::new();
    headers.insert(HOST, HeaderValue::from_str(authority).map_err(error::invalid_header)?);
    headers.insert("proxy-connection", HeaderValue::from_static("keep-alive"));
    if !user_agent.is_empty() {
        headers.insert(USER_AGENT, HeaderValue::from_str(user_agent).map_err(error::invalid_header)?);
    }
    if let Some(value) = authorization {
        headers.insert(PROXY_AUTHORIZATION, value.clone());
    }
    Ok(RequestHead {
        method: Method::CONNECT,
        target: authority.to_string(),
        version: Version::HTTP_11,
        headers,
    })
}

async fn read_response(conn: &dyn Connection) -> crate::Result<TunnelResponse> {
    let mut status = None;
    let mut headers = HeaderMap::new();
    loop {
        match conn.next_event().await {
            WireEvent::Status(line) => status = Some(line.status),
            WireEvent::Headers(h) => {
                headers = h;
                // A successful CONNECT has no body; the tunnel starts here.
                if status.is_some_and(|s| s.is_success()) {
                    break;
                }
            }
            WireEvent::Body(_) => {}
            WireEvent::Complete => break,
            WireEvent::HeaderError(msg) => return Err(error::protocol(msg)),
            WireEvent::Error(e) => return Err(error::connect(e)),
            WireEvent::Closed => return Err(error::connect(error::ConnectionClosed)),
        }
    }
    let status = status.ok_or_else(|| error::protocol("CONNECT response without status line"))?;
    Ok(TunnelResponse { status, headers })
}
