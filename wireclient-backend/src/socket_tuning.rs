//! Socket tuning applied to every freshly connected TCP stream: disables
//! Nagle's algorithm and enables keepalive probing so a dead peer is
//! noticed before an idle-pooled connection is handed back out.

use socket2::SockRef;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;

const KEEPALIVE_TIME: Duration = Duration::from_secs(30);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Socket-level options a caller can request for a single connect call,
/// mirroring the network backend interface's `socket_options` parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketOptions {
    pub recv_buffer_size: Option<usize>,
    pub send_buffer_size: Option<usize>,
    pub keepalive: bool,
}

pub fn configure(stream: &TcpStream, opts: &SocketOptions) -> io::Result<()> {
    stream.set_nodelay(true)?;

    let socket = SockRef::from(stream);
    if let Some(size) = opts.recv_buffer_size {
        socket.set_recv_buffer_size(size)?;
    }
    if let Some(size) = opts.send_buffer_size {
        socket.set_send_buffer_size(size)?;
    }
    if opts.keepalive {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(KEEPALIVE_TIME)
            .with_interval(KEEPALIVE_INTERVAL);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    Ok(())
}

pub fn configure_silent(stream: &TcpStream, opts: &SocketOptions) {
    if let Err(err) = configure(stream, opts) {
        tracing::debug!(error = %err, "socket tuning failed, continuing with defaults");
    }
}
