//! SOCKS5-specific failure modes, kept distinct here even though they
//! all collapse into a single [`wireclient_common::Error::ProxyError`]
//! string once they cross into the shared error taxonomy — callers
//! debugging a proxy failure want to know which of the three RFC 1928
//! negotiation steps rejected them.

use wireclient_common::Error;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Socks5Error {
    #[error("proxy did not accept any offered socks5 authentication method")]
    NoAcceptableMethod,
    #[error("proxy selected username/password authentication but no credentials were configured")]
    AuthenticationNotConfigured,
    #[error("socks5 username/password authentication failed")]
    AuthenticationFailed,
    #[error("socks5 connect failed: {0}")]
    ConnectFailed(String),
}

impl From<Socks5Error> for Error {
    fn from(err: Socks5Error) -> Self {
        Error::ProxyError(err.to_string())
    }
}
