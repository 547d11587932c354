//! Drives one [`Http2Connection`] shared by every in-flight request that
//! multiplexes over it. Four locks divide the work: `init` guards the
//! one-time connection preface, `engine` guards encode/decode of the
//! sans-I/O state machine, `write` serializes a logical send (so two
//! streams' frames never interleave mid-write), and `stream` is the
//! actual socket. `NetworkStream` has no `split()`, so a concurrent
//! read and write still briefly contend on the same `stream` lock —
//! `read`/`write` here serialize *logical* phases of the protocol, not
//! true parallel I/O.

use crate::meta::ConnMeta;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex as TokioMutex, Notify, OwnedSemaphorePermit};
use wireclient_backend::NetworkStream;
use wireclient_common::{ConnectionNotAvailable, Error, HandleRequestError, Result, TimeoutConfig};
use wireclient_http2::{ConnectionEvent, Http2Connection, StreamEvent};
use wireclient_sync::BoundedSemaphore;
use wireclient_types::{ByteStream, Headers, HttpVersion, Request, Response, ResponseExtensions};

/// RST_STREAM error code for a stream the caller abandoned before it
/// finished, per RFC 9113 §7.
const CANCEL: u32 = 0x8;

const READ_CHUNK_SIZE: usize = 8192;

#[derive(Default)]
struct StreamSlot {
    queue: VecDeque<StreamEvent>,
}

/// Owns one HTTP/2 transport connection and every stream multiplexed
/// over it.
pub struct Http2Session {
    engine: TokioMutex<Http2Connection>,
    stream: Arc<TokioMutex<Box<dyn NetworkStream>>>,
    read_phase: TokioMutex<()>,
    write_phase: TokioMutex<()>,
    init_lock: TokioMutex<()>,
    slots: parking_lot::Mutex<HashMap<u32, StreamSlot>>,
    concurrency: BoundedSemaphore,
    pump_notify: Notify,
    initialized: AtomicBool,
    broken: AtomicBool,
    meta: Arc<ConnMeta>,
}

impl Http2Session {
    #[must_use]
    pub fn new(stream: Box<dyn NetworkStream>, meta: Arc<ConnMeta>, max_concurrent_streams: usize) -> Arc<Self> {
        Arc::new(Self {
            engine: TokioMutex::new(Http2Connection::new()),
            stream: Arc::new(TokioMutex::new(stream)),
            read_phase: TokioMutex::new(()),
            write_phase: TokioMutex::new(()),
            init_lock: TokioMutex::new(()),
            slots: parking_lot::Mutex::new(HashMap::new()),
            concurrency: BoundedSemaphore::new(max_concurrent_streams),
            pump_notify: Notify::new(),
            initialized: AtomicBool::new(false),
            broken: AtomicBool::new(false),
            meta,
        })
    }

    async fn ensure_initialized(&self, timeouts: TimeoutConfig) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let _init_guard = self.init_lock.lock().await;
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let init_bytes = { self.engine.lock().await.send_connection_init() };
        let _write_guard = self.write_phase.lock().await;
        let mut stream = self.stream.lock().await;
        stream.write(&init_bytes, timeouts.write).await?;
        drop(stream);
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn push_stream_event(&self, stream_id: u32, event: StreamEvent) {
        let mut slots = self.slots.lock();
        slots.entry(stream_id).or_default().queue.push_back(event);
    }

    fn pop_stream_event(&self, stream_id: u32) -> Option<StreamEvent> {
        let mut slots = self.slots.lock();
        slots.get_mut(&stream_id).and_then(|slot| slot.queue.pop_front())
    }

    fn drop_stream_slot(&self, stream_id: u32) {
        self.slots.lock().remove(&stream_id);
    }

    fn mark_broken(&self) {
        self.broken.store(true, Ordering::Release);
        self.meta.mark_closed();
        self.pump_notify.notify_waiters();
    }

    /// Become the reader if nobody else currently is, pump exactly one
    /// round of socket data through the engine, and wake every other
    /// waiter. If another task is already pumping, wait for its result
    /// instead of reading concurrently.
    async fn pump_or_wait(&self, timeouts: TimeoutConfig) -> Result<()> {
        if self.broken.load(Ordering::Acquire) {
            return Err(Error::ServerDisconnectedError);
        }
        match self.read_phase.try_lock() {
            Ok(_phase_guard) => self.receive_events_once(timeouts).await,
            Err(_) => {
                let notified = self.pump_notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.broken.load(Ordering::Acquire) {
                    return Err(Error::ServerDisconnectedError);
                }
                notified.await;
                Ok(())
            }
        }
    }

    async fn receive_events_once(&self, timeouts: TimeoutConfig) -> Result<()> {
        let data = {
            let mut stream = self.stream.lock().await;
            stream.read(READ_CHUNK_SIZE, timeouts.read).await?
        };
        if data.is_empty() {
            self.mark_broken();
            return Err(Error::ServerDisconnectedError);
        }

        let (stream_events, conn_events, outgoing) = {
            let mut engine = self.engine.lock().await;
            let (stream_events, conn_events) = engine.receive_data(&data)?;
            let outgoing = engine.take_outgoing_bytes();
            (stream_events, conn_events, outgoing)
        };

        for (stream_id, event) in stream_events {
            self.push_stream_event(stream_id, event);
        }
        for event in conn_events {
            match event {
                ConnectionEvent::RemoteMaxConcurrentStreamsChanged(n) => {
                    self.concurrency.adjust_bound(n as usize);
                }
                ConnectionEvent::GoAway { .. } => self.meta.mark_goaway(),
            }
        }
        if !outgoing.is_empty() {
            let _write_guard = self.write_phase.lock().await;
            let mut stream = self.stream.lock().await;
            stream.write(&outgoing, timeouts.write).await?;
        }
        self.pump_notify.notify_waiters();
        Ok(())
    }

    async fn wait_for_stream_event(&self, stream_id: u32, timeouts: TimeoutConfig) -> Result<StreamEvent> {
        loop {
            if let Some(event) = self.pop_stream_event(stream_id) {
                return Ok(event);
            }
            self.pump_or_wait(timeouts).await?;
        }
    }

    /// The most this connection may send on `stream_id` right now,
    /// pumping incoming `WINDOW_UPDATE` frames while the window is
    /// exhausted.
    async fn wait_for_outgoing_flow(&self, stream_id: u32, timeouts: TimeoutConfig) -> Result<u32> {
        loop {
            let avail = self.engine.lock().await.outbound_flow(stream_id);
            if avail > 0 {
                return Ok(avail);
            }
            self.pump_or_wait(timeouts).await?;
        }
    }

    async fn write_framed(&self, frame: Bytes, timeouts: TimeoutConfig) -> Result<()> {
        let _write_guard = self.write_phase.lock().await;
        let mut stream = self.stream.lock().await;
        stream.write(&frame, timeouts.write).await
    }

    pub async fn handle_request(
        self: &Arc<Self>,
        request: &mut Request,
        timeouts: TimeoutConfig,
    ) -> std::result::Result<Response, HandleRequestError> {
        self.ensure_initialized(timeouts).await?;

        let permit = self.concurrency.acquire_owned().await;

        let stream_id = {
            let mut engine = self.engine.lock().await;
            engine.get_next_available_stream_id().map_err(|_| {
                self.meta.mark_stream_ids_exhausted();
                ConnectionNotAvailable
            })?
        };
        self.meta.mark_active();

        let head_bytes = { self.engine.lock().await.send_request_headers(stream_id, request)? };
        self.write_framed(head_bytes, timeouts).await?;

        while let Some(chunk) = request.body.next_chunk().await? {
            let mut offset = 0;
            while offset < chunk.len() {
                let avail = self.wait_for_outgoing_flow(stream_id, timeouts).await? as usize;
                let end = (offset + avail.max(1).min(chunk.len() - offset)).min(chunk.len());
                let frame = { self.engine.lock().await.send_data_frame(stream_id, &chunk[offset..end]) };
                self.write_framed(frame, timeouts).await?;
                offset = end;
            }
        }
        let end_frame = { self.engine.lock().await.end_stream(stream_id) };
        self.write_framed(end_frame, timeouts).await?;

        let head = loop {
            match self.wait_for_stream_event(stream_id, timeouts).await {
                Ok(StreamEvent::ResponseReceived(head)) => break head,
                Ok(StreamEvent::StreamReset { error_code }) => {
                    self.drop_stream_slot(stream_id);
                    return Err(Error::RemoteProtocolError(format!("stream reset before headers (error {error_code})")).into());
                }
                Ok(_) => continue,
                Err(err) => {
                    self.drop_stream_slot(stream_id);
                    return Err(err.into());
                }
            }
        };

        let trailing_headers = Arc::new(OnceLock::new());

        let extensions = ResponseExtensions {
            http_version: Some(HttpVersion::Http2),
            stream_id: Some(stream_id),
            trailing_headers: Some(Arc::clone(&trailing_headers)),
            ..Default::default()
        };

        let body: Box<dyn ByteStream> = Box::new(Http2ResponseBody {
            session: Arc::clone(self),
            stream_id,
            timeouts,
            done: false,
            trailing_headers,
            _permit: permit,
        });
        Ok(Response::new(head.status_code, head.headers, body, extensions))
    }
}

struct Http2ResponseBody {
    session: Arc<Http2Session>,
    stream_id: u32,
    timeouts: TimeoutConfig,
    done: bool,
    trailing_headers: Arc<OnceLock<Headers>>,
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl ByteStream for Http2ResponseBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.done {
            return Ok(None);
        }
        loop {
            match self.session.wait_for_stream_event(self.stream_id, self.timeouts).await? {
                StreamEvent::Data { data, flow_controlled_length } => {
                    let ack = {
                        let mut engine = self.session.engine.lock().await;
                        engine.acknowledge_received_data(self.stream_id, flow_controlled_length as u32)
                    };
                    if !ack.is_empty() {
                        self.session.write_framed(ack, self.timeouts).await?;
                    }
                    return Ok(Some(data));
                }
                StreamEvent::TrailingHeaders(headers) => {
                    let _ = self.trailing_headers.set(headers);
                    continue;
                }
                StreamEvent::StreamEnded => {
                    self.done = true;
                    return Ok(None);
                }
                StreamEvent::StreamReset { error_code } => {
                    self.done = true;
                    return Err(Error::RemoteProtocolError(format!("stream reset, error code {error_code}")));
                }
                StreamEvent::ResponseReceived(_) => continue,
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.done {
            let reset = { self.session.engine.lock().await.reset_stream(self.stream_id, CANCEL) };
            let _ = self.session.write_framed(reset, self.timeouts).await;
            self.done = true;
        } else {
            self.session.engine.lock().await.response_closed(self.stream_id);
        }
        self.session.drop_stream_slot(self.stream_id);
        Ok(())
    }
}

impl Drop for Http2ResponseBody {
    fn drop(&mut self) {
        self.session.drop_stream_slot(self.stream_id);
        if !self.done {
            // Caller dropped the body without closing it: tell the peer
            // to stop sending DATA for a stream nothing will read.
            let session = Arc::clone(&self.session);
            let stream_id = self.stream_id;
            let timeouts = self.timeouts;
            tokio::spawn(async move {
                let reset = { session.engine.lock().await.reset_stream(stream_id, CANCEL) };
                let _ = session.write_framed(reset, timeouts).await;
            });
        }
    }
}
