//! Proxy adapters layered on top of [`wireclient_connection`]: a plain
//! forwarding proxy for `http://` targets, and two tunnel dialers
//! ([`connect_tunnel::HttpConnectDialer`], [`socks5::Socks5Dialer`])
//! that plug into [`wireclient_connection::Connection::with_tunnel`] so
//! everything past "plaintext stream to the target" — TLS, ALPN,
//! HTTP/1.1-vs-HTTP/2 — is handled exactly like a direct connection.

pub mod connect_tunnel;
pub mod error;
pub mod forwarding;
pub mod socks5;

pub use connect_tunnel::HttpConnectDialer;
pub use error::Socks5Error;
pub use forwarding::ForwardingProxy;
pub use socks5::Socks5Dialer;
