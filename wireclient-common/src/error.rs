//! Error taxonomy shared by every wireclient crate.
//!
//! Mirrors the error kinds named by the design: connect-class errors that
//! the connection façade retries, protocol-class errors that close the
//! connection, and pool-class errors that only fail the waiting request.

use std::fmt;
use std::io;

/// Top-level error returned to callers of `handle_request`.
///
/// `ConnectionNotAvailable` is deliberately *not* a variant here: it is an
/// internal signal consumed inside the pool's retry loop (see
/// [`HandleRequestError`]) and must never reach a caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request URL's scheme is not one of `http`, `https`, `ws`, `wss`.
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// TCP/Unix connect failed.
    #[error("connect error: {0}")]
    ConnectError(String),

    /// TCP/Unix connect, or the TLS handshake riding on top of it, timed out.
    #[error("connect timed out")]
    ConnectTimeout,

    /// A network read failed (after the connection was already established).
    #[error("read error: {0}")]
    ReadError(String),

    /// A network read timed out.
    #[error("read timed out")]
    ReadTimeout,

    /// A network write failed.
    #[error("write error: {0}")]
    WriteError(String),

    /// A network write timed out.
    #[error("write timed out")]
    WriteTimeout,

    /// This side violated the wire protocol (a bug in this client, or
    /// misuse of the sans-I/O engine).
    #[error("local protocol error: {0}")]
    LocalProtocolError(String),

    /// The remote peer violated the wire protocol.
    #[error("remote protocol error: {0}")]
    RemoteProtocolError(String),

    /// The remote peer closed a connection we believed was idle and
    /// kept-alive, discovered when we tried to reuse it.
    #[error("server disconnected without sending a response")]
    ServerDisconnectedError,

    /// A forwarding/tunneling/SOCKS5 proxy misbehaved or refused the
    /// request.
    #[error("proxy error: {0}")]
    ProxyError(String),

    /// Waiting for a pool connection to become available exceeded
    /// `timeout.pool`.
    #[error("timed out waiting for a connection from the pool")]
    PoolTimeout,
}

impl Error {
    /// True for the two error kinds the connection façade retries on
    /// connect, per the retry policy: non-connect errors are never retried.
    #[must_use]
    pub fn is_connect_class(&self) -> bool {
        matches!(self, Error::ConnectError(_) | Error::ConnectTimeout)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => Error::ReadTimeout,
            _ => Error::ReadError(err.to_string()),
        }
    }
}

/// Internal signal: the connection chosen by the pool scheduler turned out
/// to be unusable by the time the caller actually tried to use it (the
/// HTTP/2 "went unavailable between assignment and use" race, or an idle
/// HTTP/1.1 socket discovered to be half-closed).
///
/// This never escapes `handle_request`; callers only ever see [`Error`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionNotAvailable;

impl fmt::Display for ConnectionNotAvailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("connection not available")
    }
}

impl std::error::Error for ConnectionNotAvailable {}

/// The result of asking a connection to `handle_request`: either a
/// success, a signal to retry assignment, or a fatal error to propagate.
#[derive(Debug)]
pub enum HandleRequestError {
    /// The pool should clear this assignment and re-run the scheduler.
    Retry,
    /// The error should propagate to the caller.
    Fatal(Error),
}

impl From<Error> for HandleRequestError {
    fn from(err: Error) -> Self {
        HandleRequestError::Fatal(err)
    }
}

impl From<ConnectionNotAvailable> for HandleRequestError {
    fn from(_: ConnectionNotAvailable) -> Self {
        HandleRequestError::Retry
    }
}

impl From<io::Error> for HandleRequestError {
    fn from(err: io::Error) -> Self {
        HandleRequestError::Fatal(err.into())
    }
}

/// Result alias used throughout wireclient for caller-facing operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_errors_are_retry_class() {
        assert!(Error::ConnectError("refused".into()).is_connect_class());
        assert!(Error::ConnectTimeout.is_connect_class());
        assert!(!Error::ReadError("boom".into()).is_connect_class());
        assert!(!Error::PoolTimeout.is_connect_class());
    }

    #[test]
    fn connection_not_available_never_becomes_fatal_directly() {
        let err: HandleRequestError = ConnectionNotAvailable.into();
        assert!(matches!(err, HandleRequestError::Retry));
    }

    #[test]
    fn io_error_maps_to_read_class() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::ReadError(_)));
    }
}
