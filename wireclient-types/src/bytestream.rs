//! The lazy byte-chunk abstraction request and response bodies are built
//! from. Network-backed streams are single-pass; only literal byte
//! containers are restartable.

use async_trait::async_trait;
use bytes::Bytes;
use wireclient_common::Error;

/// An abstract, explicitly-closeable sequence of byte chunks.
///
/// Implementations backed by a live socket (HTTP/1.1 response bodies,
/// HTTP/2 `DATA` frames) are single-pass: once exhausted or closed, calling
/// `next_chunk` again yields `Ok(None)`. Implementations backed by an
/// in-memory buffer may additionally implement [`ByteStream::restart`].
#[async_trait]
pub trait ByteStream: Send {
    /// Produce the next chunk, or `None` at end of stream.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error>;

    /// Explicitly close the stream, releasing any underlying resources
    /// (for HTTP/1.1 this is what returns a connection to IDLE or forces
    /// it to CLOSED; see the connection engine for the exact rule).
    async fn close(&mut self) -> Result<(), Error>;

    /// Whether this stream can be rewound and replayed via [`Self::restart`].
    fn is_restartable(&self) -> bool {
        false
    }

    /// Rewind a restartable stream back to its start. Implementations that
    /// are not restartable should leave this as the default no-op error.
    fn restart(&mut self) -> Result<(), Error> {
        Err(Error::LocalProtocolError(
            "stream is not restartable".to_string(),
        ))
    }
}

/// A boxed body, the common currency `Request`/`Response` carry.
pub type Body = Box<dyn ByteStream>;

/// A restartable body backed by a single in-memory buffer.
pub struct BytesBody {
    data: Bytes,
    cursor: usize,
    closed: bool,
}

impl BytesBody {
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into(), cursor: 0, closed: false }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(Bytes::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl ByteStream for BytesBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        if self.closed || self.cursor >= self.data.len() {
            return Ok(None);
        }
        let chunk = self.data.slice(self.cursor..);
        self.cursor = self.data.len();
        Ok(Some(chunk))
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.closed = true;
        Ok(())
    }

    fn is_restartable(&self) -> bool {
        true
    }

    fn restart(&mut self) -> Result<(), Error> {
        self.cursor = 0;
        self.closed = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bytes_body_yields_once_then_ends() {
        let mut body = BytesBody::new(Bytes::from_static(b"hello"));
        assert_eq!(body.next_chunk().await.unwrap().unwrap().as_ref(), b"hello");
        assert!(body.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bytes_body_restart_replays() {
        let mut body = BytesBody::new(Bytes::from_static(b"hi"));
        let _ = body.next_chunk().await.unwrap();
        assert!(body.next_chunk().await.unwrap().is_none());
        body.restart().unwrap();
        assert_eq!(body.next_chunk().await.unwrap().unwrap().as_ref(), b"hi");
    }

    #[tokio::test]
    async fn empty_body_yields_nothing() {
        let mut body = BytesBody::empty();
        assert!(body.next_chunk().await.unwrap().is_none());
    }
}
