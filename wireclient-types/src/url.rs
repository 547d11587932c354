//! `URL` and `Origin`, the two identity types everything else in this
//! crate is keyed on.
//!
//! Inputs are treated as ASCII; byte slices are accepted as-is and never
//! re-validated as UTF-8, matching the "byte inputs accepted as-is" rule.

use bytes::Bytes;
use std::fmt;
use wireclient_common::constants::default_port_for_scheme;

/// A parsed, wire-level URL: `scheme://host[:port]target`.
///
/// Two `Url`s are equal iff all four components match exactly (no
/// normalization beyond what the caller already did).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Url {
    pub scheme: Bytes,
    pub host: Bytes,
    pub port: Option<u16>,
    pub target: Bytes,
}

/// Error returned by [`Url::parse`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlParseError {
    #[error("missing \"://\" in url")]
    MissingSchemeSeparator,
    #[error("empty host")]
    EmptyHost,
    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

impl Url {
    /// Parse `scheme://host[:port][/target]` from a string. The target
    /// defaults to `/` when omitted, matching how an HTTP request line is
    /// constructed downstream.
    pub fn parse(input: &str) -> Result<Self, UrlParseError> {
        let (scheme, rest) = input
            .split_once("://")
            .ok_or(UrlParseError::MissingSchemeSeparator)?;

        let (authority, target) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        if authority.is_empty() {
            return Err(UrlParseError::EmptyHost);
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((h, p)) if !h.is_empty() && p.chars().all(|c| c.is_ascii_digit()) && !p.is_empty() => {
                let port: u16 = p
                    .parse()
                    .map_err(|_| UrlParseError::InvalidPort(p.to_string()))?;
                (h, Some(port))
            }
            _ => (authority, None),
        };

        if host.is_empty() {
            return Err(UrlParseError::EmptyHost);
        }

        Ok(Self {
            scheme: Bytes::copy_from_slice(scheme.as_bytes()),
            host: Bytes::copy_from_slice(host.as_bytes()),
            port,
            target: Bytes::copy_from_slice(target.as_bytes()),
        })
    }

    /// Build a `Url` directly from byte components, no parsing.
    #[must_use]
    pub fn from_parts(scheme: Bytes, host: Bytes, port: Option<u16>, target: Bytes) -> Self {
        Self { scheme, host, port, target }
    }

    /// The scheme's default port, if known.
    #[must_use]
    pub fn default_port(&self) -> Option<u16> {
        default_port_for_scheme(&self.scheme)
    }

    /// Port to actually dial: explicit port, else the scheme default.
    #[must_use]
    pub fn effective_port(&self) -> Option<u16> {
        self.port.or_else(|| self.default_port())
    }

    /// Derive the `Origin` this URL routes through.
    #[must_use]
    pub fn origin(&self) -> Origin {
        Origin {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            port: self.effective_port().unwrap_or(0),
        }
    }

    /// The `Host` header value: `host[:port]` with default-port
    /// suppression.
    #[must_use]
    pub fn host_header_value(&self) -> Bytes {
        match self.port {
            Some(port) if Some(port) != self.default_port() => {
                Bytes::from(format!(
                    "{}:{}",
                    String::from_utf8_lossy(&self.host),
                    port
                ))
            }
            _ => self.host.clone(),
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}",
            String::from_utf8_lossy(&self.scheme),
            String::from_utf8_lossy(&self.host),
        )?;
        if let Some(port) = self.port {
            if Some(port) != self.default_port() {
                write!(f, ":{port}")?;
            }
        }
        write!(f, "{}", String::from_utf8_lossy(&self.target))
    }
}

/// `(scheme, host, effective_port)` — the unit of connection affinity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub scheme: Bytes,
    pub host: Bytes,
    pub port: u16,
}

impl Origin {
    /// True for `https`/`wss`, i.e. origins that need TLS.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        matches!(&self.scheme[..], b"https" | b"wss")
    }

    /// True for `http`/`ws` plaintext origins.
    #[must_use]
    pub fn is_plaintext(&self) -> bool {
        !self.is_tls()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}",
            String::from_utf8_lossy(&self.scheme),
            String::from_utf8_lossy(&self.host),
            self.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_then_display_preserves_default_port_suppression() {
        let url = Url::parse("https://example.com/path?q=1").unwrap();
        assert_eq!(url.scheme.as_ref(), b"https");
        assert_eq!(url.host.as_ref(), b"example.com");
        assert_eq!(url.port, None);
        assert_eq!(url.target.as_ref(), b"/path?q=1");
        assert_eq!(url.to_string(), "https://example.com/path?q=1");
    }

    #[test]
    fn explicit_non_default_port_round_trips() {
        let url = Url::parse("http://example.com:8080/").unwrap();
        assert_eq!(url.port, Some(8080));
        assert_eq!(url.to_string(), "http://example.com:8080/");
    }

    #[test]
    fn explicit_default_port_is_suppressed_on_display() {
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(url.to_string(), "https://example.com/");
    }

    #[test]
    fn missing_path_defaults_to_root() {
        let url = Url::parse("http://example.com").unwrap();
        assert_eq!(url.target.as_ref(), b"/");
    }

    #[test]
    fn equality_requires_all_four_components() {
        let a = Url::parse("http://example.com/a").unwrap();
        let b = Url::parse("http://example.com/a").unwrap();
        let c = Url::parse("http://example.com/b").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn origin_equality_ignores_target() {
        let a = Url::parse("http://example.com/a").unwrap().origin();
        let b = Url::parse("http://example.com/b").unwrap().origin();
        assert_eq!(a, b);
    }

    #[test]
    fn origin_default_ports_per_scheme() {
        assert_eq!(Url::parse("http://h/").unwrap().origin().port, 80);
        assert_eq!(Url::parse("https://h/").unwrap().origin().port, 443);
        assert_eq!(Url::parse("ws://h/").unwrap().origin().port, 80);
        assert_eq!(Url::parse("wss://h/").unwrap().origin().port, 443);
    }

    #[test]
    fn host_header_suppresses_default_port() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(url.host_header_value().as_ref(), b"example.com");
        let url = Url::parse("https://example.com:8443/").unwrap();
        assert_eq!(url.host_header_value().as_ref(), b"example.com:8443");
    }

    #[test]
    fn rejects_missing_scheme_separator() {
        assert_eq!(
            Url::parse("example.com/a"),
            Err(UrlParseError::MissingSchemeSeparator)
        );
    }
}
