//! Drives a single [`wireclient_http1::Http11Connection`] over one
//! [`NetworkStream`]. HTTP/1.1 allows only one in-flight request, so the
//! session's lock is held for the lifetime of the whole request *and*
//! its response body — the body object carries the lock guard and
//! releases it on close, which is exactly the serialization the engine
//! needs.

use crate::meta::ConnMeta;
use async_trait::async_trait;
use bytes::Bytes;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use wireclient_backend::{ExtraInfoKey, ExtraInfoValue, NetworkStream};
use wireclient_common::{ConnectionNotAvailable, Error, HandleRequestError, Result, TimeoutConfig};
use wireclient_http1::{ConnectionState, Event, Http11Connection, NextEvent, READ_CHUNK_HINT};
use wireclient_types::{ByteStream, BytesBody, HttpVersion, Request, Response, ResponseExtensions};

struct Http1Inner {
    stream: Option<Box<dyn NetworkStream>>,
    engine: Http11Connection,
}

/// Owns one HTTP/1.1 transport connection.
pub struct Http1Session {
    inner: Arc<Mutex<Http1Inner>>,
}

impl Http1Session {
    #[must_use]
    pub fn new(stream: Box<dyn NetworkStream>) -> Self {
        Self { inner: Arc::new(Mutex::new(Http1Inner { stream: Some(stream), engine: Http11Connection::new() })) }
    }

    pub async fn handle_request(
        &self,
        meta: &Arc<ConnMeta>,
        keepalive_expiry: Option<Duration>,
        request: &mut Request,
        timeouts: TimeoutConfig,
    ) -> std::result::Result<Response, HandleRequestError> {
        let mut guard = self.inner.clone().lock_owned().await;

        if guard.engine.state() == ConnectionState::Idle {
            let stream = guard.stream.as_ref().expect("stream taken from a reusable session");
            if matches!(stream.extra_info(ExtraInfoKey::IsReadable), Some(ExtraInfoValue::Bool(true))) {
                guard.engine.close();
                meta.mark_closed();
                return Err(ConnectionNotAvailable.into());
            }
        }

        meta.mark_active();

        let head_bytes = guard.engine.send_request_headers(request)?;
        let stream = guard.stream.as_mut().expect("stream taken from a reusable session");
        stream.write(&head_bytes, timeouts.write).await?;

        while let Some(chunk) = request.body.next_chunk().await? {
            let framed = guard.engine.send_request_body_chunk(&chunk);
            let stream = guard.stream.as_mut().expect("stream present");
            stream.write(&framed, timeouts.write).await?;
        }
        let trailer = guard.engine.end_request_body();
        if !trailer.is_empty() {
            let stream = guard.stream.as_mut().expect("stream present");
            stream.write(&trailer, timeouts.write).await?;
        }

        let head = loop {
            match guard.engine.next_event()? {
                NextEvent::Event(Event::Response(head)) => break head,
                NextEvent::Event(Event::InformationalResponse(_)) => continue,
                NextEvent::NeedData(_) => {
                    let stream = guard.stream.as_mut().expect("stream present");
                    let data = stream.read(READ_CHUNK_HINT, timeouts.read).await?;
                    if data.is_empty() {
                        return Err(Error::RemoteProtocolError("Server disconnected".into()).into());
                    }
                    guard.engine.receive_data(&data);
                }
                NextEvent::Event(Event::Data(_) | Event::EndOfMessage | Event::ConnectionClosed)
                | NextEvent::Paused(_) => {
                    return Err(Error::RemoteProtocolError("unexpected event before response head".into()).into());
                }
            }
        };

        let is_connect = request.method.eq_ignore_ascii_case(b"CONNECT");
        let raw_handoff = head.status_code == 101 || (is_connect && (200..300).contains(&head.status_code));

        let mut extensions = ResponseExtensions { http_version: Some(HttpVersion::Http11), ..Default::default() };
        extensions.reason_phrase = Some(String::from_utf8_lossy(&head.reason_phrase).into_owned());

        if raw_handoff {
            let stream = guard.stream.take().expect("stream present for handoff");
            meta.mark_closed();
            extensions.network_stream = Some(Box::new(stream) as Box<dyn Any + Send>);
            return Ok(Response::new(head.status_code, head.headers, Box::new(BytesBody::empty()), extensions));
        }

        let body: Box<dyn ByteStream> = Box::new(Http1ResponseBody {
            guard: Some(guard),
            meta: Arc::clone(meta),
            keepalive_expiry,
            read_timeout: timeouts.read,
            done: false,
        });
        Ok(Response::new(head.status_code, head.headers, body, extensions))
    }
}

struct Http1ResponseBody {
    guard: Option<OwnedMutexGuard<Http1Inner>>,
    meta: Arc<ConnMeta>,
    keepalive_expiry: Option<Duration>,
    read_timeout: Option<Duration>,
    done: bool,
}

#[async_trait]
impl ByteStream for Http1ResponseBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.done {
            return Ok(None);
        }
        let guard = self.guard.as_mut().expect("body used after close");
        loop {
            match guard.engine.next_event()? {
                NextEvent::Event(Event::Data(chunk)) => return Ok(Some(chunk)),
                NextEvent::Event(Event::EndOfMessage | Event::ConnectionClosed) => {
                    self.done = true;
                    return Ok(None);
                }
                NextEvent::Paused(_) => {
                    self.done = true;
                    return Ok(None);
                }
                NextEvent::Event(Event::Response(_) | Event::InformationalResponse(_)) => {
                    return Err(Error::RemoteProtocolError("unexpected second response head".into()));
                }
                NextEvent::NeedData(_) => {
                    let stream = guard.stream.as_mut().expect("stream present while body is open");
                    let data = stream.read(READ_CHUNK_HINT, self.read_timeout).await?;
                    if data.is_empty() {
                        guard.engine.receive_eof();
                        continue;
                    }
                    guard.engine.receive_data(&data);
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut guard) = self.guard.take() {
            if self.done {
                guard.engine.response_closed();
            } else {
                // Caller abandoned the body before EOF: the decoder's
                // framing state can't be trusted for reuse, so the
                // connection is forced closed rather than returned idle.
                guard.engine.close();
            }
            if guard.engine.state() == ConnectionState::Closed {
                if let Some(stream) = guard.stream.as_mut() {
                    let _ = stream.close().await;
                }
                self.meta.mark_closed();
            } else {
                self.meta.mark_idle(self.keepalive_expiry);
            }
        }
        Ok(())
    }
}

impl Drop for Http1ResponseBody {
    fn drop(&mut self) {
        if let Some(mut guard) = self.guard.take() {
            guard.engine.close();
            self.meta.mark_closed();
            if let Some(mut stream) = guard.stream.take() {
                tokio::spawn(async move {
                    let _ = stream.close().await;
                });
            }
        }
    }
}
