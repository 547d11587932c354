//! Lazy-connect, ALPN-negotiating connection façade over the HTTP/1.1
//! and HTTP/2 sans-I/O engines. One [`Connection`] is one transport to
//! one origin; the pool scheduler decides which connection a request
//! goes to, and this crate drives it once chosen.

pub mod connection;
pub mod http1;
pub mod http2;
pub mod meta;
pub mod pool_connection;

pub use connection::{Connection, TunnelDialer};
pub use http1::Http1Session;
pub use http2::Http2Session;
pub use meta::{ConnMeta, Status};
pub use pool_connection::PoolConnection;
