//! Numeric defaults pinned by the design. Centralised so the pool,
//! connection façade and HTTP/2 engine don't each hardcode their own copy.

/// Default `Pool::max_connections`.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Default header block size limit for the HTTP/1.1 engine (100 KiB).
pub const HTTP1_MAX_HEADER_SIZE: usize = 100 * 1024;

/// HTTP/2 initial `SETTINGS_ENABLE_PUSH`.
pub const HTTP2_ENABLE_PUSH: u32 = 0;

/// HTTP/2 initial `SETTINGS_MAX_CONCURRENT_STREAMS`.
pub const HTTP2_MAX_CONCURRENT_STREAMS: u32 = 100;

/// HTTP/2 initial `SETTINGS_MAX_HEADER_LIST_SIZE`.
pub const HTTP2_MAX_HEADER_LIST_SIZE: u32 = 65536;

/// Connection-level flow control window increment applied right after
/// connect, on top of the RFC 9113 default initial window of 65535.
pub const HTTP2_CONNECTION_WINDOW_DELTA: i32 = 1 << 24;

/// Default ALPN protocol offer order when both HTTP/1.1 and HTTP/2 are
/// enabled.
pub const ALPN_PROTOCOLS: &[&str] = &["http/1.1", "h2"];

/// Default-port table keyed by scheme, per the data model.
#[must_use]
pub fn default_port_for_scheme(scheme: &[u8]) -> Option<u16> {
    match scheme {
        b"http" => Some(80),
        b"https" => Some(443),
        b"ws" => Some(80),
        b"wss" => Some(443),
        b"socks5" => Some(1080),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_schemes_have_default_ports() {
        assert_eq!(default_port_for_scheme(b"http"), Some(80));
        assert_eq!(default_port_for_scheme(b"https"), Some(443));
        assert_eq!(default_port_for_scheme(b"ws"), Some(80));
        assert_eq!(default_port_for_scheme(b"wss"), Some(443));
        assert_eq!(default_port_for_scheme(b"socks5"), Some(1080));
        assert_eq!(default_port_for_scheme(b"ftp"), None);
    }
}
