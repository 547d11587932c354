//! The pool scheduler and the `Pool`/`HttpProxy`/`SocksProxy` façades
//! built on top of it. Everything here is origin-keyed connection
//! lifecycle management and request queuing; the actual wire protocols
//! live in `wireclient-connection`.

pub mod pool;
pub mod proxy;
pub mod scheduler;

pub use pool::{Pool, PoolOptions};
pub use proxy::{HttpProxy, ProxyPoolOptions, SocksProxy};
pub use scheduler::{ConnectionFactory, PoolRequest, Scheduler};
