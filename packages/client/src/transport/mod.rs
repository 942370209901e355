//! Transport collaborator contract
//!
//! The engine never touches sockets, TLS or the HTTP/1 byte format. A
//! [`Transport`] opens [`Connection`]s; a connection writes request heads and
//! body chunks and yields parsed [`WireEvent`]s in arrival order.

pub mod connection;

pub use connection::{BoxFuture, Connection, RemoteAddress, RequestHead, StatusLine, Transport, WireEvent};
