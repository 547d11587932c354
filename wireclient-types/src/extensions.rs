//! Request/response `extensions`: the side-channel for timeouts, tracing,
//! and the handful of protocol-specific details callers can ask for
//! (HTTP version, upgraded network stream, HTTP/2 stream id, trailers).

use crate::headers::Headers;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};
use wireclient_common::TimeoutConfig;

/// A phase name paired with the lifecycle stage it's reporting, e.g.
/// `("connection.connect_tcp", TraceStage::Started)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStage {
    Started,
    Complete,
    Failed,
}

impl TraceStage {
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            TraceStage::Started => "started",
            TraceStage::Complete => "complete",
            TraceStage::Failed => "failed",
        }
    }
}

/// Caller-supplied observer invoked around each instrumented phase of a
/// request's life (see the phase names in the design's external
/// interfaces section). This is the caller-visible counterpart to the
/// `tracing` spans the engines also emit; tests key off this callback,
/// operators key off `tracing`.
pub trait TraceCallback: Send + Sync {
    fn on_event(&self, phase: &str, stage: TraceStage, detail: Option<&str>);
}

/// A `TraceCallback` built from a plain closure, for callers that don't
/// want to implement the trait themselves.
pub struct TraceFn<F>(pub F);

impl<F> TraceCallback for TraceFn<F>
where
    F: Fn(&str, TraceStage, Option<&str>) + Send + Sync,
{
    fn on_event(&self, phase: &str, stage: TraceStage, detail: Option<&str>) {
        (self.0)(phase, stage, detail);
    }
}

/// Extensions carried on a `Request`.
#[derive(Clone, Default)]
pub struct RequestExtensions {
    pub timeout: TimeoutConfig,
    pub trace: Option<Arc<dyn TraceCallback>>,
    /// Overrides the request-target bytes sent on the wire (used by the
    /// forwarding proxy adapter to rewrite the target to an absolute URI).
    pub target_override: Option<bytes::Bytes>,
}

impl fmt::Debug for RequestExtensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExtensions")
            .field("timeout", &self.timeout)
            .field("trace", &self.trace.is_some())
            .field("target_override", &self.target_override)
            .finish()
    }
}

impl RequestExtensions {
    pub(crate) fn trace(&self, phase: &str, stage: TraceStage, detail: Option<&str>) {
        if let Some(cb) = &self.trace {
            cb.on_event(phase, stage, detail);
        }
    }
}

/// Which HTTP version a `Response` was negotiated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http11,
    Http2,
}

impl HttpVersion {
    #[must_use]
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            HttpVersion::Http11 => b"HTTP/1.1",
            HttpVersion::Http2 => b"HTTP/2",
        }
    }
}

/// Extensions carried on a `Response`.
#[derive(Default)]
pub struct ResponseExtensions {
    pub http_version: Option<HttpVersion>,
    /// HTTP/1.1 only: the textual reason phrase (`"OK"`, `"Not Found"`, ...).
    pub reason_phrase: Option<String>,
    /// Present when the response represents a protocol upgrade (`101`) or
    /// a successful `CONNECT`: the raw, post-handshake network stream,
    /// type-erased so this crate doesn't need to depend on a concrete
    /// backend. Downcast with [`ResponseExtensions::network_stream`].
    pub network_stream: Option<Box<dyn Any + Send>>,
    /// HTTP/2 only: the stream id this response was carried on.
    pub stream_id: Option<u32>,
    /// HTTP/2 only: trailing headers, pseudo-headers already filtered out.
    /// Arrive only once the body is fully drained, so this is a shared
    /// cell the body writes into and the caller polls after `close()`
    /// rather than a plain field set at construction.
    pub trailing_headers: Option<Arc<OnceLock<Headers>>>,
}

impl fmt::Debug for ResponseExtensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseExtensions")
            .field("http_version", &self.http_version)
            .field("reason_phrase", &self.reason_phrase)
            .field("network_stream", &self.network_stream.is_some())
            .field("stream_id", &self.stream_id)
            .field("trailing_headers", &self.trailing_headers().is_some())
            .finish()
    }
}

impl ResponseExtensions {
    /// The trailing headers, if the body has drained far enough to have
    /// received them (HTTP/2 only; always `None` otherwise).
    #[must_use]
    pub fn trailing_headers(&self) -> Option<&Headers> {
        self.trailing_headers.as_ref()?.get()
    }

    /// Downcast the type-erased upgraded stream to a concrete type `T`
    /// (the backend's stream type). Returns `None` if there was no
    /// upgrade, or `T` doesn't match what was stored.
    pub fn network_stream<T: Any>(&mut self) -> Option<Box<T>> {
        self.network_stream.take()?.downcast::<T>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn trace_fn_invokes_closure() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let ext = RequestExtensions {
            trace: Some(Arc::new(TraceFn(move |_, _, _| {
                c.fetch_add(1, Ordering::SeqCst);
            }))),
            ..Default::default()
        };
        ext.trace("connection.connect_tcp", TraceStage::Started, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn http_version_wire_bytes() {
        assert_eq!(HttpVersion::Http11.as_bytes(), b"HTTP/1.1");
        assert_eq!(HttpVersion::Http2.as_bytes(), b"HTTP/2");
    }

    #[test]
    fn network_stream_downcast_roundtrip() {
        let mut ext = ResponseExtensions {
            network_stream: Some(Box::new(42u32)),
            ..Default::default()
        };
        let recovered = ext.network_stream::<u32>();
        assert_eq!(recovered.map(|b| *b), Some(42));
    }
}
