//! A pooled HTTP/1.1 + HTTP/2 client core: a connection pool that
//! multiplexes persistent connections, sans-I/O protocol engines per
//! connection, and forwarding/`CONNECT`-tunnel/SOCKS5 proxy adapters.
//!
//! This crate re-exports the pieces most callers need from the
//! subcrates; reach into `wireclient_connection`/`wireclient_proxy`
//! directly for anything lower-level.

pub use wireclient_common as common;
pub use wireclient_connection as connection;
pub use wireclient_pool as pool;
pub use wireclient_proxy as proxy;
pub use wireclient_types as types;

pub use common::{Error, Http2Config, PoolConfig, Result, TimeoutConfig};
pub use pool::{HttpProxy, Pool, PoolOptions, ProxyPoolOptions, SocksProxy};
pub use types::{Body, ByteStream, Headers, Request, Response, Url};

/// Minimal, dependency-light logging setup for binaries and examples
/// that embed this crate without bringing their own `tracing` stack —
/// `RUST_LOG` controls verbosity, defaulting to `info`.
pub fn init_minimal_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
