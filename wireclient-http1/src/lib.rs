//! Sans-I/O HTTP/1.1: a request/response state machine that consumes and
//! produces bytes but never touches a socket itself.

pub mod connection;
pub mod event;
pub mod state;

pub use connection::{Http11Connection, READ_CHUNK_HINT};
pub use event::{Event, InformationalResponse, NeedData, NextEvent, Paused, ResponseHead};
pub use state::ConnectionState;
