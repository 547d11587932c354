//! Network backend abstraction: connects TCP/Unix sockets and upgrades
//! them to TLS, presenting the `read`/`write`/`close`/`start_tls`/
//! `extra_info` surface the sans-I/O protocol engines are built against.

pub mod backend;
pub mod io_stream;
pub mod socket_tuning;
pub mod stream;
pub mod tls;

pub use backend::{NetworkBackend, TokioBackend};
pub use socket_tuning::SocketOptions;
pub use stream::{ExtraInfoKey, ExtraInfoValue, NetworkStream};
