//! The common surface the pool scheduler drives every connection kind
//! through. A plain [`Connection`] implements it directly; the proxy
//! adapters (forwarding, tunneling, SOCKS5) wrap one and implement it
//! too, so the scheduler never needs to know which kind it holds.

use crate::connection::Connection;
use crate::meta::ConnMeta;
use async_trait::async_trait;
use std::sync::Arc;
use wireclient_common::{HandleRequestError, TimeoutConfig};
use wireclient_types::{Origin, Request, Response};

#[async_trait]
pub trait PoolConnection: Send + Sync {
    fn origin(&self) -> &Origin;

    fn meta(&self) -> &Arc<ConnMeta>;

    fn request_count(&self) -> u64 {
        self.meta().request_count()
    }

    fn is_idle(&self) -> bool {
        self.meta().is_idle()
    }

    fn has_expired(&self) -> bool {
        self.meta().has_expired()
    }

    fn is_closed(&self) -> bool {
        self.meta().is_closed()
    }

    /// Whether the scheduler may hand this connection a new request
    /// right now.
    fn is_available(&self) -> bool;

    /// Whether this connection is a candidate for a request bound for
    /// `origin`. Direct HTTP/1.1, HTTP/2, and tunneling-proxy connections
    /// all match by exact origin equality (the default); a forwarding
    /// proxy connection overrides this to match any plaintext-HTTP origin
    /// regardless of its own origin (the proxy's).
    fn can_handle_request(&self, origin: &Origin) -> bool {
        self.origin() == origin
    }

    /// Human-readable status line for `Pool::connections()`.
    fn info(&self) -> String {
        format!("{} status={:?} requests={}", self.origin(), self.meta().status(), self.request_count())
    }

    async fn handle_request(
        &self,
        request: &mut Request,
        timeouts: TimeoutConfig,
    ) -> std::result::Result<Response, HandleRequestError>;

    async fn close(&self);
}

#[async_trait]
impl PoolConnection for Connection {
    fn origin(&self) -> &Origin {
        Connection::origin(self)
    }

    fn meta(&self) -> &Arc<ConnMeta> {
        Connection::meta(self)
    }

    fn is_available(&self) -> bool {
        Connection::is_available(self)
    }

    fn info(&self) -> String {
        Connection::info(self)
    }

    async fn handle_request(
        &self,
        request: &mut Request,
        timeouts: TimeoutConfig,
    ) -> std::result::Result<Response, HandleRequestError> {
        Connection::handle_request(self, request, timeouts).await
    }

    async fn close(&self) {
        Connection::close(self).await
    }
}
