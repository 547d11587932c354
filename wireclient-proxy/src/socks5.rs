//! SOCKS5 proxy adapter (RFC 1928, with RFC 1929 username/password
//! sub-negotiation). Like [`crate::connect_tunnel::HttpConnectDialer`],
//! this only produces a plaintext stream to the target; TLS and
//! protocol negotiation stay in [`wireclient_connection::Connection`].

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use wireclient_backend::{NetworkBackend, NetworkStream, SocketOptions};
use wireclient_common::{Error, Result, TimeoutConfig};
use wireclient_connection::TunnelDialer;
use wireclient_types::Origin;

use crate::error::Socks5Error;

const VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_USERNAME_PASSWORD: u8 = 0x02;
const METHOD_NO_ACCEPTABLE: u8 = 0xFF;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// Dials a SOCKS5 proxy and hands back a tunnel to `target`.
pub struct Socks5Dialer {
    proxy_origin: Origin,
    target: Origin,
    credentials: Option<(String, String)>,
    backend: Arc<dyn NetworkBackend>,
}

impl Socks5Dialer {
    #[must_use]
    pub fn new(
        proxy_origin: Origin,
        target: Origin,
        credentials: Option<(String, String)>,
        backend: Arc<dyn NetworkBackend>,
    ) -> Self {
        Self { proxy_origin, target, credentials, backend }
    }
}

/// Accumulates bytes off the wire until at least `need` are buffered,
/// the way the sans-I/O engines do, but inline — a SOCKS5 handshake is
/// a handful of short fixed frames, not worth a state machine of its own.
async fn read_at_least(
    stream: &mut Box<dyn NetworkStream>,
    pending: &mut Vec<u8>,
    need: usize,
    timeouts: TimeoutConfig,
) -> Result<()> {
    while pending.len() < need {
        let chunk = stream.read(4096, timeouts.read).await?;
        if chunk.is_empty() {
            return Err(Error::ServerDisconnectedError);
        }
        pending.extend_from_slice(&chunk);
    }
    Ok(())
}

fn decode_reply_code(code: u8) -> &'static str {
    match code {
        0x00 => "succeeded",
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown reply code",
    }
}

#[async_trait]
impl TunnelDialer for Socks5Dialer {
    async fn dial(&self, timeouts: TimeoutConfig) -> Result<Box<dyn NetworkStream>> {
        let proxy_host = String::from_utf8_lossy(&self.proxy_origin.host).into_owned();
        tracing::debug!(proxy = %self.proxy_origin, target = %self.target, "connecting to SOCKS5 proxy");

        let mut stream = self
            .backend
            .connect_tcp(&proxy_host, self.proxy_origin.port, timeouts.connect, None, SocketOptions::default())
            .await?;
        let mut pending: Vec<u8> = Vec::new();

        let greeting: Vec<u8> = if self.credentials.is_some() {
            vec![VERSION, 2, METHOD_NO_AUTH, METHOD_USERNAME_PASSWORD]
        } else {
            vec![VERSION, 1, METHOD_NO_AUTH]
        };
        stream.write(&greeting, timeouts.write).await?;

        read_at_least(&mut stream, &mut pending, 2, timeouts).await?;
        let method = pending[1];
        pending.drain(0..2);

        match method {
            METHOD_NO_AUTH => {}
            METHOD_USERNAME_PASSWORD => {
                let (user, pass) = self
                    .credentials
                    .as_ref()
                    .ok_or(Socks5Error::AuthenticationNotConfigured)?;
                let mut nego = vec![0x01u8, user.len() as u8];
                nego.extend_from_slice(user.as_bytes());
                nego.push(pass.len() as u8);
                nego.extend_from_slice(pass.as_bytes());
                stream.write(&nego, timeouts.write).await?;

                read_at_least(&mut stream, &mut pending, 2, timeouts).await?;
                let status = pending[1];
                pending.drain(0..2);
                if status != 0x00 {
                    return Err(Socks5Error::AuthenticationFailed.into());
                }
            }
            METHOD_NO_ACCEPTABLE => {
                return Err(Socks5Error::NoAcceptableMethod.into());
            }
            other => return Err(Error::ProxyError(format!("unexpected socks5 method selection {other}"))),
        }

        let host = String::from_utf8_lossy(&self.target.host).into_owned();
        let mut connect_req = vec![VERSION, CMD_CONNECT, 0x00];
        match host.parse::<IpAddr>() {
            Ok(IpAddr::V4(addr)) => {
                connect_req.push(ATYP_IPV4);
                connect_req.extend_from_slice(&addr.octets());
            }
            Ok(IpAddr::V6(addr)) => {
                connect_req.push(ATYP_IPV6);
                connect_req.extend_from_slice(&addr.octets());
            }
            Err(_) => {
                if host.len() > u8::MAX as usize {
                    return Err(Error::ProxyError("target hostname too long for socks5".into()));
                }
                connect_req.push(ATYP_DOMAIN);
                connect_req.push(host.len() as u8);
                connect_req.extend_from_slice(host.as_bytes());
            }
        }
        connect_req.extend_from_slice(&self.target.port.to_be_bytes());
        stream.write(&connect_req, timeouts.write).await?;

        read_at_least(&mut stream, &mut pending, 4, timeouts).await?;
        let reply_code = pending[1];
        let atyp = pending[3];
        pending.drain(0..4);

        let addr_len = match atyp {
            ATYP_IPV4 => 4,
            ATYP_IPV6 => 16,
            ATYP_DOMAIN => {
                read_at_least(&mut stream, &mut pending, 1, timeouts).await?;
                let n = pending[0] as usize;
                pending.drain(0..1);
                n
            }
            other => return Err(Error::RemoteProtocolError(format!("unknown socks5 address type {other}"))),
        };
        read_at_least(&mut stream, &mut pending, addr_len + 2, timeouts).await?;
        pending.drain(0..addr_len + 2);

        if reply_code != 0x00 {
            return Err(Socks5Error::ConnectFailed(decode_reply_code(reply_code).to_string()).into());
        }

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_codes_decode_to_readable_strings() {
        assert_eq!(decode_reply_code(0x00), "succeeded");
        assert_eq!(decode_reply_code(0x05), "connection refused");
        assert_eq!(decode_reply_code(0xEE), "unknown reply code");
    }
}
