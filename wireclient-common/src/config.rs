//! Configuration types. Kept `serde`-derivable the way the teacher's own
//! config structs are, even though nothing here is deserialized from a
//! file today — it's the shape a caller embedding this in their own
//! service config would expect.

use crate::constants::DEFAULT_MAX_CONNECTIONS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-request timeout budget. Every field is independently optional;
/// `None` means "no timeout for this phase".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Bounds TCP/Unix connect and the TLS handshake.
    pub connect: Option<Duration>,
    /// Bounds a single network read.
    pub read: Option<Duration>,
    /// Bounds a single network write.
    pub write: Option<Duration>,
    /// Bounds waiting for the pool to hand out a connection.
    pub pool: Option<Duration>,
}

impl TimeoutConfig {
    /// No timeouts at all.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

/// Top-level pool configuration, mirroring the exposed `Pool(...)`
/// constructor parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Hard cap on total connections held by the pool.
    pub max_connections: usize,
    /// Cap on simultaneously IDLE connections; surplus idle connections
    /// are evicted during assignment. `None` means unbounded (defaults to
    /// `max_connections`).
    pub max_keepalive_connections: Option<usize>,
    /// How long a connection may sit IDLE before it's treated as expired.
    /// `Some(Duration::ZERO)` means connections are never reused.
    pub keepalive_expiry: Option<Duration>,
    /// Offer HTTP/1.1.
    pub http1: bool,
    /// Offer HTTP/2 (via ALPN, when TLS is in play).
    pub http2: bool,
    /// Number of retries on *connect* failure before giving up.
    pub retries: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_keepalive_connections: None,
            keepalive_expiry: Some(Duration::from_secs(5)),
            http1: true,
            http2: false,
            retries: 0,
        }
    }
}

impl PoolConfig {
    /// Effective idle cap: `max_keepalive_connections`, defaulting to
    /// `max_connections` when unset.
    #[must_use]
    pub fn effective_max_keepalive(&self) -> usize {
        self.max_keepalive_connections.unwrap_or(self.max_connections)
    }
}

/// HTTP/2 engine tuning, separated out so it can be overridden without
/// touching pool-level settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Http2Config {
    /// Local `SETTINGS_MAX_CONCURRENT_STREAMS` advertised to the peer.
    pub max_concurrent_streams: u32,
    /// Local `SETTINGS_MAX_HEADER_LIST_SIZE`.
    pub max_header_list_size: u32,
    /// Maximum bytes read off the socket per `receive_events` call.
    pub read_chunk_size: usize,
}

impl Default for Http2Config {
    fn default() -> Self {
        Self {
            max_concurrent_streams: crate::constants::HTTP2_MAX_CONCURRENT_STREAMS,
            max_header_list_size: crate::constants::HTTP2_MAX_HEADER_LIST_SIZE,
            read_chunk_size: 64 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_defaults_match_design() {
        let cfg = PoolConfig::default();
        assert_eq!(cfg.max_connections, 10);
        assert!(cfg.http1);
        assert!(!cfg.http2);
        assert_eq!(cfg.retries, 0);
        assert_eq!(cfg.effective_max_keepalive(), 10);
    }

    #[test]
    fn explicit_keepalive_cap_overrides_default() {
        let cfg = PoolConfig {
            max_keepalive_connections: Some(2),
            ..PoolConfig::default()
        };
        assert_eq!(cfg.effective_max_keepalive(), 2);
    }
}
