//! The connection engine: handshake, request/response calls, and the
//! background receive loop that drives them.
//!
//! A [`Connection`] is the handle a caller sends calls and pings through;
//! [`Connection::establish`] performs the handshake and spawns the task that
//! owns the read half of the stream for the rest of the connection's life.
//! Inbound calls from the peer arrive on the [`Inbound`] channel returned
//! alongside the connection, each paired with a [`Responder`] used to send
//! the reply.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::checksum::ChecksumType;
use crate::config::{Config, FRAME_HEADER_SIZE, HEADER_HOST_PORT, HEADER_PROCESS_NAME, VERSION};
use crate::correlation::CorrelationTable;
use crate::error::{Error, Result};
use crate::fragment::{fragment, Reassembler};
use crate::frame::{Frame, MessageType};
use crate::message::{
    Args, CallRequest, CallResponse, Cancel, ErrorCode, ErrorMessage, Headers, InitMessage,
    Message, Ping, Tracing,
};

type BoxedRead = Pin<Box<dyn AsyncRead + Send>>;
type BoxedWrite = Pin<Box<dyn AsyncWrite + Send>>;

/// Which side of the handshake this connection performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends `init_req` first and waits for `init_res`.
    Initiator,
    /// Waits for `init_req` and answers with `init_res`, echoing its id.
    Acceptor,
}

/// A complete inbound call, delivered once all of its fragments (if any) have
/// been reassembled.
pub struct Inbound {
    /// Correlation id this call arrived under.
    pub id: u32,
    /// The reassembled request.
    pub request: CallRequest,
    /// Handle used to send the matching response.
    pub responder: Responder,
}

/// Sends the response to one previously-received [`Inbound`] call.
#[derive(Clone)]
pub struct Responder {
    inner: Arc<Inner>,
    id: u32,
}

impl Responder {
    /// Sends a successful response, fragmenting it if needed.
    pub async fn respond(&self, response: CallResponse) -> Result<()> {
        self.inner
            .send_call_body(
                self.id,
                response,
                MessageType::CallRes,
                MessageType::CallResContinue,
            )
            .await
    }

    /// Sends an application-level error in place of a response.
    pub async fn respond_error(&self, code: ErrorCode, message: impl Into<String>) -> Result<()> {
        let body = ErrorMessage::untraced(code, message);
        self.inner
            .write_message(self.id, MessageType::Error, &Message::Error(body))
            .await
    }
}

/// Identity the peer advertised during handshake: its `host_port` and
/// `process_name` headers plus the protocol version it spoke. Recorded once,
/// at the end of the handshake, and immutable for the rest of the
/// connection's life (§3's `remote_host_port`/`remote_process_name`/
/// `negotiated_version` connection-state fields).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    /// The peer's advertised `host_port` header.
    pub host_port: String,
    /// The peer's advertised `process_name` header.
    pub process_name: String,
    /// The protocol version the peer's `init_req`/`init_res` carried.
    pub negotiated_version: u16,
}

struct Inner {
    write: AsyncMutex<BoxedWrite>,
    correlation: StdMutex<CorrelationTable>,
    req_reassembler: StdMutex<Reassembler<CallRequest>>,
    res_reassembler: StdMutex<Reassembler<CallResponse>>,
    config: Config,
    peer: PeerIdentity,
    closed: AtomicBool,
}

impl Inner {
    async fn write_message(&self, id: u32, message_type: MessageType, message: &Message) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        let payload = message.encode()?;
        let frame = Frame::new(message_type, id, payload);
        let bytes = frame.encode()?;
        let mut w = self.write.lock().await;
        w.write_all(&bytes).await?;
        w.flush().await?;
        Ok(())
    }

    /// Fragments `body` and writes every fragment while holding the write
    /// lock for the whole sequence, so no other logical message can
    /// interleave its frames with this one's.
    async fn send_call_body<T>(
        &self,
        id: u32,
        body: T,
        first_type: MessageType,
        continue_type: MessageType,
    ) -> Result<()>
    where
        T: crate::fragment::Fragmentable,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        let payloads = fragment(&body, self.config.max_frame_payload(), &self.config.checksum_registry)?;
        let mut w = self.write.lock().await;
        for (i, payload) in payloads.into_iter().enumerate() {
            let message_type = if i == 0 { first_type } else { continue_type };
            let bytes = Frame::new(message_type, id, payload).encode()?;
            w.write_all(&bytes).await?;
        }
        w.flush().await?;
        Ok(())
    }
}

/// A live connection: handshake already completed, background receive loop
/// already running.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Performs the handshake for `role` over `stream`, then spawns the
    /// background task that owns the read half for the rest of the
    /// connection's life.
    ///
    /// Returns the connection handle, a channel of inbound calls from the
    /// peer, and the `JoinHandle` of the background task (join it to learn
    /// when the connection closes).
    pub async fn establish<T>(
        stream: T,
        config: Config,
        role: Role,
    ) -> Result<(Connection, mpsc::UnboundedReceiver<Inbound>, JoinHandle<()>)>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (read_half, write_half): (BoxedRead, BoxedWrite) = {
            let (r, w) = stream.split();
            (Box::pin(r), Box::pin(w))
        };

        let mut read_half = read_half;
        let mut write_half = write_half;
        let mut correlation = CorrelationTable::new();

        let peer = match role {
            Role::Initiator => {
                let id = correlation.next_id();
                let init = local_init_message(&config);
                write_frame_raw(&mut write_half, MessageType::InitReq, id, init.encode()).await?;

                let frame = read_frame_raw(&mut read_half).await?;
                if frame.message_type != MessageType::InitRes {
                    return Err(Error::NotReady);
                }
                if frame.id != id {
                    return Err(Error::HandshakeProtocolViolation(
                        "init_res id did not match init_req id",
                    ));
                }
                validate_peer_init(&frame.payload)?
            }
            Role::Acceptor => {
                let frame = read_frame_raw(&mut read_half).await?;
                if frame.message_type != MessageType::InitReq {
                    return Err(Error::NotReady);
                }
                let peer = validate_peer_init(&frame.payload)?;

                let init = local_init_message(&config);
                write_frame_raw(&mut write_half, MessageType::InitRes, frame.id, init.encode())
                    .await?;
                peer
            }
        };

        log::info!(
            "handshake complete as {:?}, peer={}@{}",
            role,
            peer.process_name,
            peer.host_port
        );

        let inner = Arc::new(Inner {
            write: AsyncMutex::new(write_half),
            correlation: StdMutex::new(correlation),
            req_reassembler: StdMutex::new(Reassembler::new()),
            res_reassembler: StdMutex::new(Reassembler::new()),
            config,
            peer,
            closed: AtomicBool::new(false),
        });

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let loop_inner = inner.clone();
        let handle = tokio::spawn(async move {
            receive_loop(loop_inner, read_half, inbound_tx).await;
        });

        Ok((Connection { inner }, inbound_rx, handle))
    }

    /// Issues a call and awaits the response.
    pub async fn call(
        &self,
        service: impl Into<String>,
        ttl_ms: u32,
        args: Args,
    ) -> Result<CallResponse> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        let request = CallRequest {
            more_fragments: false,
            ttl_ms,
            tracing: Tracing::default(),
            service: service.into(),
            headers: Headers::new(),
            checksum_type: ChecksumType::Crc32,
            args,
        };

        let (id, rx) = {
            let mut c = self.inner.correlation.lock().unwrap();
            let id = c.next_id();
            let rx = c.insert(id)?;
            (id, rx)
        };

        if let Err(e) = self
            .inner
            .send_call_body(id, request, MessageType::CallReq, MessageType::CallReqContinue)
            .await
        {
            let _ = self.inner.correlation.lock().unwrap().cancel(id);
            return Err(e);
        }

        match rx.await {
            Ok(Ok(Message::CallRes(resp))) => Ok(resp),
            Ok(Ok(Message::Error(err))) => Err(Error::Remote(err.code as u8, err.message)),
            Ok(Ok(_)) => Err(Error::HandshakeProtocolViolation(
                "unexpected message type resolved a call",
            )),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Sends a keep-alive ping and awaits the pong.
    pub async fn ping(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        let (id, rx) = {
            let mut c = self.inner.correlation.lock().unwrap();
            let id = c.next_id();
            let rx = c.insert(id)?;
            (id, rx)
        };
        self.inner
            .write_message(id, MessageType::PingReq, &Message::PingReq(Ping))
            .await?;

        match rx.await {
            Ok(Ok(Message::PingRes(_))) => Ok(()),
            Ok(Ok(_)) => Err(Error::HandshakeProtocolViolation(
                "unexpected message type resolved a ping",
            )),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Best-effort cancellation of an outstanding call. Does not wait for
    /// the peer to acknowledge it.
    pub async fn cancel(&self, id: u32, why: impl Into<String>) -> Result<()> {
        self.inner.correlation.lock().unwrap().cancel(id)?;
        let body = Cancel {
            tracing: Tracing::default(),
            why: why.into(),
        };
        self.inner
            .write_message(id, MessageType::Cancel, &Message::Cancel(body))
            .await
    }

    /// Closes the connection: idempotent, fails every outstanding call with
    /// [`Error::ConnectionClosed`] and shuts down the write half. The
    /// background receive loop observes the ensuing EOF/error and exits on
    /// its own.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.correlation.lock().unwrap().fail_all_closed();
        let mut w = self.inner.write.lock().await;
        let _ = w.close().await;
    }

    /// Returns true once this connection has been closed (locally or by the
    /// receive loop observing the peer go away).
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Returns the identity the peer advertised during the handshake.
    pub fn peer_identity(&self) -> PeerIdentity {
        self.inner.peer.clone()
    }
}

fn local_init_message(config: &Config) -> InitMessage {
    let mut headers = Headers::new();
    headers.insert(HEADER_HOST_PORT, config.host_port.clone());
    headers.insert(HEADER_PROCESS_NAME, config.process_name.clone());
    InitMessage {
        version: VERSION,
        headers,
    }
}

/// Decodes and validates a peer's `init_req`/`init_res` body, returning the
/// identity it advertised (§3's `remote_host_port`/`remote_process_name`/
/// `negotiated_version`, mirroring `extract_handshake_headers` in
/// `original_source/tchannel/tornado/connection.py`, which stores
/// `self.remote_host`/`remote_process_name`/`requested_version` off the same
/// fields rather than discarding them once validated).
fn validate_peer_init(payload: &[u8]) -> Result<PeerIdentity> {
    let mut r = crate::message::Reader::new(payload);
    let init = InitMessage::decode(&mut r)?;
    if init.version != VERSION {
        return Err(Error::HandshakeProtocolViolation("unsupported protocol version"));
    }
    let host_port = init
        .headers
        .get(HEADER_HOST_PORT)
        .ok_or(Error::MissingHeader(HEADER_HOST_PORT))?
        .to_string();
    let process_name = init
        .headers
        .get(HEADER_PROCESS_NAME)
        .ok_or(Error::MissingHeader(HEADER_PROCESS_NAME))?
        .to_string();
    Ok(PeerIdentity {
        host_port,
        process_name,
        negotiated_version: init.version,
    })
}

async fn write_frame_raw(
    write: &mut BoxedWrite,
    message_type: MessageType,
    id: u32,
    payload: Vec<u8>,
) -> Result<()> {
    let bytes = Frame::new(message_type, id, payload).encode()?;
    write.write_all(&bytes).await?;
    write.flush().await?;
    Ok(())
}

async fn read_frame_raw(read: &mut BoxedRead) -> Result<Frame> {
    let mut size_prefix = [0u8; 2];
    read.read_exact(&mut size_prefix).await?;
    let total_size = Frame::decode_size(size_prefix);
    if total_size < FRAME_HEADER_SIZE {
        return Err(Error::FrameTruncated);
    }
    let mut rest = vec![0u8; total_size - 2];
    read.read_exact(&mut rest).await?;

    let mut full = Vec::with_capacity(total_size);
    full.extend_from_slice(&size_prefix);
    full.extend_from_slice(&rest);
    Frame::decode(&full)
}

async fn receive_loop(inner: Arc<Inner>, mut read: BoxedRead, inbound_tx: mpsc::UnboundedSender<Inbound>) {
    loop {
        let frame = match read_frame_raw(&mut read).await {
            Ok(f) => f,
            Err(Error::Io(msg)) => {
                log::debug!("connection closed: {}", msg);
                break;
            }
            Err(e) => {
                log::warn!("frame read failed, closing connection: {}", e);
                break;
            }
        };

        if let Err(e) = dispatch(&inner, frame, &inbound_tx) {
            log::warn!("dispatch failed, closing connection: {}", e);
            break;
        }
    }

    inner.closed.store(true, Ordering::SeqCst);
    inner.correlation.lock().unwrap().fail_all_closed();
}

/// Dispatches one inbound frame. Returns `Err` only for conditions that must
/// close the connection (handshake/fragment-sequencing protocol violations,
/// transport failures surfacing from a write); everything else (inbound
/// decode errors, orphan continuations/responses) is handled in place per
/// §7's propagation rules and never kills the connection.
fn dispatch(inner: &Arc<Inner>, frame: Frame, inbound_tx: &mpsc::UnboundedSender<Inbound>) -> Result<()> {
    match frame.message_type {
        MessageType::InitReq | MessageType::InitRes => {
            Err(Error::HandshakeAfterReady)
        }
        MessageType::CallReq => {
            let step = inner.req_reassembler.lock().unwrap().start(
                frame.id,
                &frame.payload,
                &inner.config.checksum_registry,
            );
            match step {
                Ok(Some(complete)) => deliver_inbound(inner, frame.id, complete, inbound_tx),
                Ok(None) => {}
                Err(e @ Error::FragmentSequenceViolation(_)) => return Err(e),
                Err(e) => reject_inbound_request(inner, frame.id, e),
            }
            Ok(())
        }
        MessageType::CallReqContinue => {
            let step = inner.req_reassembler.lock().unwrap().continue_with(
                frame.id,
                &frame.payload,
                &inner.config.checksum_registry,
            );
            match step {
                Ok(Some(complete)) => deliver_inbound(inner, frame.id, complete, inbound_tx),
                Ok(None) => {}
                Err(e @ Error::FragmentSequenceViolation(_)) => return Err(e),
                Err(e @ Error::OrphanContinuation(_)) => {
                    log::debug!("dropping call req continuation id {}: {}", frame.id, e);
                }
                Err(e) => reject_inbound_request(inner, frame.id, e),
            }
            Ok(())
        }
        MessageType::CallRes => {
            let step = inner.res_reassembler.lock().unwrap().start(
                frame.id,
                &frame.payload,
                &inner.config.checksum_registry,
            );
            complete_response(inner, frame.id, step)?;
            Ok(())
        }
        MessageType::CallResContinue => {
            let step = inner.res_reassembler.lock().unwrap().continue_with(
                frame.id,
                &frame.payload,
                &inner.config.checksum_registry,
            );
            complete_response(inner, frame.id, step)?;
            Ok(())
        }
        MessageType::Cancel => {
            inner.req_reassembler.lock().unwrap().discard(frame.id);
            log::debug!("peer cancelled call id {}", frame.id);
            Ok(())
        }
        MessageType::Claim => {
            log::debug!("received claim for id {} (no engine behavior)", frame.id);
            Ok(())
        }
        MessageType::PingReq => {
            let inner = inner.clone();
            let id = frame.id;
            tokio::spawn(async move {
                let _ = inner
                    .write_message(id, MessageType::PingRes, &Message::PingRes(Ping))
                    .await;
            });
            Ok(())
        }
        MessageType::PingRes => {
            if let Err(Error::OrphanResponse(id)) = inner
                .correlation
                .lock()
                .unwrap()
                .resolve(frame.id, Ok(Message::PingRes(Ping)))
            {
                log::debug!("orphan ping response for id {}, dropped", id);
            }
            Ok(())
        }
        MessageType::Error => {
            match ErrorMessage::decode(&mut crate::message::Reader::new(&frame.payload)) {
                Ok(err) => {
                    if let Err(Error::OrphanResponse(id)) = inner
                        .correlation
                        .lock()
                        .unwrap()
                        .resolve(frame.id, Ok(Message::Error(err)))
                    {
                        log::debug!("orphan error message for id {}, dropped", id);
                    }
                }
                Err(e) => fail_pending_decode(inner, frame.id, e),
            }
            Ok(())
        }
    }
}

/// A decode failure on an inbound *request*: answer the peer with a
/// `BadRequest` error reusing the frame's id, and drop any reassembly state
/// for it. Never closes the connection — a malformed request from one caller
/// does not affect the rest of the multiplexed stream.
fn reject_inbound_request(inner: &Arc<Inner>, id: u32, cause: Error) {
    log::warn!("decode error on inbound call id {}: {}", id, cause);
    inner.req_reassembler.lock().unwrap().discard(id);
    let inner = inner.clone();
    tokio::spawn(async move {
        let body = ErrorMessage::untraced(ErrorCode::BadRequest, cause.to_string());
        let _ = inner
            .write_message(id, MessageType::Error, &Message::Error(body))
            .await;
    });
}

/// A decode failure on an inbound *response* (or error envelope): fail the
/// matching pending slot, if any, with the decode error. Never closes the
/// connection, per §7.
fn fail_pending_decode(inner: &Arc<Inner>, id: u32, cause: Error) {
    log::warn!("decode error on inbound response id {}: {}", id, cause);
    let _ = inner.correlation.lock().unwrap().resolve(id, Err(cause));
}

/// Resolves the pending slot for `id` once a response reassembly step
/// produces a completed message. A fragment-sequence violation is a protocol
/// error and propagates to close the connection (per §7); an orphan
/// continuation (a `*_continue` frame for an id with no buffered start, e.g.
/// after this side already gave up on it) is logged and dropped, never
/// fatal.
fn complete_response(inner: &Arc<Inner>, id: u32, step: Result<Option<CallResponse>>) -> Result<()> {
    match step {
        Ok(Some(complete)) => {
            if let Err(Error::OrphanResponse(id)) = inner
                .correlation
                .lock()
                .unwrap()
                .resolve(id, Ok(Message::CallRes(complete)))
            {
                log::debug!("orphan call response for id {}, dropped", id);
            }
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(Error::OrphanContinuation(id)) => {
            log::debug!("orphan response continuation for id {}, dropped", id);
            Ok(())
        }
        Err(e @ Error::FragmentSequenceViolation(_)) => Err(e),
        Err(e) => {
            log::warn!("response reassembly failed for id {}: {}", id, e);
            let _ = inner.correlation.lock().unwrap().resolve(id, Err(e));
            Ok(())
        }
    }
}

fn deliver_inbound(
    inner: &Arc<Inner>,
    id: u32,
    request: CallRequest,
    inbound_tx: &mpsc::UnboundedSender<Inbound>,
) {
    let responder = Responder {
        inner: inner.clone(),
        id,
    };
    if inbound_tx
        .send(Inbound {
            id,
            request,
            responder,
        })
        .is_err()
    {
        log::debug!("inbound call id {} dropped: no receiver listening", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    fn server_config() -> Config {
        ConfigBuilder::new("127.0.0.1:0", "test-server").build()
    }

    fn client_config() -> Config {
        ConfigBuilder::new("127.0.0.1:0", "test-client").build()
    }

    #[tokio::test]
    async fn handshake_records_peer_identity() {
        // Literal S1 scenario: initiator "1.2.3.4:5"/"svc[42]" talks to
        // acceptor "5.6.7.8:9"/"peer[7]"; each side records the other's
        // advertised identity.
        let (client_io, server_io) = tokio::io::duplex(16 * 1024);
        let client_io = tokio_util::compat::TokioAsyncReadCompatExt::compat(client_io);
        let server_io = tokio_util::compat::TokioAsyncReadCompatExt::compat(server_io);

        let server_config = ConfigBuilder::new("5.6.7.8:9", "peer[7]").build();
        let client_config = ConfigBuilder::new("1.2.3.4:5", "svc[42]").build();

        let server_fut = Connection::establish(server_io, server_config, Role::Acceptor);
        let client_fut = Connection::establish(client_io, client_config, Role::Initiator);
        let (server_result, client_result) = tokio::join!(server_fut, client_fut);
        let (server_conn, _server_inbound, _server_handle) = server_result.unwrap();
        let (client_conn, _client_inbound, _client_handle) = client_result.unwrap();

        let client_sees = client_conn.peer_identity();
        assert_eq!(client_sees.host_port, "5.6.7.8:9");
        assert_eq!(client_sees.process_name, "peer[7]");
        assert_eq!(client_sees.negotiated_version, crate::config::VERSION);

        let server_sees = server_conn.peer_identity();
        assert_eq!(server_sees.host_port, "1.2.3.4:5");
        assert_eq!(server_sees.process_name, "svc[42]");
    }

    #[tokio::test]
    async fn handshake_and_call_roundtrip() {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let client_io = tokio_util::compat::TokioAsyncReadCompatExt::compat(client_io);
        let server_io = tokio_util::compat::TokioAsyncReadCompatExt::compat(server_io);

        let (server_conn, mut inbound, _server_handle) =
            Connection::establish(server_io, server_config(), Role::Acceptor)
                .await
                .unwrap();

        let server_task = tokio::spawn(async move {
            let call = inbound.recv().await.expect("inbound call");
            assert_eq!(call.request.service, "kv");
            call.responder
                .respond(CallResponse {
                    more_fragments: false,
                    tracing: Tracing::default(),
                    headers: Headers::new(),
                    checksum_type: ChecksumType::Crc32,
                    args: Args {
                        arg1: Vec::new(),
                        arg2: Vec::new(),
                        arg3: b"pong".to_vec(),
                    },
                })
                .await
                .unwrap();
        });

        let (client_conn, _client_inbound, _client_handle) =
            Connection::establish(client_io, client_config(), Role::Initiator)
                .await
                .unwrap();

        let response = client_conn
            .call(
                "kv",
                5000,
                Args {
                    arg1: b"get".to_vec(),
                    arg2: Vec::new(),
                    arg3: b"key".to_vec(),
                },
            )
            .await
            .unwrap();
        assert_eq!(response.args.arg3, b"pong");

        server_task.await.unwrap();
        let _ = server_conn;
    }

    #[tokio::test]
    async fn ping_roundtrip() {
        let (client_io, server_io) = tokio::io::duplex(16 * 1024);
        let client_io = tokio_util::compat::TokioAsyncReadCompatExt::compat(client_io);
        let server_io = tokio_util::compat::TokioAsyncReadCompatExt::compat(server_io);

        let (_server_conn, _server_inbound, _server_handle) =
            Connection::establish(server_io, server_config(), Role::Acceptor)
                .await
                .unwrap();
        let (client_conn, _client_inbound, _client_handle) =
            Connection::establish(client_io, client_config(), Role::Initiator)
                .await
                .unwrap();

        client_conn.ping().await.unwrap();
    }

    #[tokio::test]
    async fn close_fails_pending_calls() {
        let (client_io, server_io) = tokio::io::duplex(16 * 1024);
        let client_io = tokio_util::compat::TokioAsyncReadCompatExt::compat(client_io);
        let server_io = tokio_util::compat::TokioAsyncReadCompatExt::compat(server_io);

        let (server_conn, _server_inbound, _server_handle) =
            Connection::establish(server_io, server_config(), Role::Acceptor)
                .await
                .unwrap();
        let (client_conn, _client_inbound, _client_handle) =
            Connection::establish(client_io, client_config(), Role::Initiator)
                .await
                .unwrap();

        server_conn.close().await;

        let result = client_conn
            .call(
                "kv",
                1000,
                Args {
                    arg1: b"get".to_vec(),
                    arg2: Vec::new(),
                    arg3: b"key".to_vec(),
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn large_payload_is_fragmented_transparently() {
        let (client_io, server_io) = tokio::io::duplex(256 * 1024);
        let client_io = tokio_util::compat::TokioAsyncReadCompatExt::compat(client_io);
        let server_io = tokio_util::compat::TokioAsyncReadCompatExt::compat(server_io);

        let small_frame_config = ConfigBuilder::new("127.0.0.1:0", "test-server")
            .max_frame_size(512)
            .build();
        let (_server_conn, mut inbound, _server_handle) =
            Connection::establish(server_io, small_frame_config, Role::Acceptor)
                .await
                .unwrap();

        let server_task = tokio::spawn(async move {
            let call = inbound.recv().await.expect("inbound call");
            assert_eq!(call.request.args.arg3.len(), 10_000);
            call.responder
                .respond(CallResponse {
                    more_fragments: false,
                    tracing: Tracing::default(),
                    headers: Headers::new(),
                    checksum_type: ChecksumType::None,
                    args: Args {
                        arg1: Vec::new(),
                        arg2: Vec::new(),
                        arg3: vec![0xCD; 10_000],
                    },
                })
                .await
                .unwrap();
        });

        let small_frame_client_config = ConfigBuilder::new("127.0.0.1:0", "test-client")
            .max_frame_size(512)
            .build();
        let (client_conn, _client_inbound, _client_handle) =
            Connection::establish(client_io, small_frame_client_config, Role::Initiator)
                .await
                .unwrap();

        let response = client_conn
            .call(
                "kv",
                5000,
                Args {
                    arg1: b"put".to_vec(),
                    arg2: Vec::new(),
                    arg3: vec![0xAB; 10_000],
                },
            )
            .await
            .unwrap();
        assert_eq!(response.args.arg3.len(), 10_000);

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_inbound_request_does_not_close_connection() {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let client_io = tokio_util::compat::TokioAsyncReadCompatExt::compat(client_io);
        let server_io = tokio_util::compat::TokioAsyncReadCompatExt::compat(server_io);

        let (server_conn, mut inbound, _server_handle) =
            Connection::establish(server_io, server_config(), Role::Acceptor)
                .await
                .unwrap();
        let (client_conn, _client_inbound, _client_handle) =
            Connection::establish(client_io, client_config(), Role::Initiator)
                .await
                .unwrap();

        // A call_req frame too short to contain its fixed fields: simulates a
        // peer bug, not a protocol violation. Written directly to the wire,
        // bypassing the `call` API's own encoding.
        let bad_frame = Frame::new(MessageType::CallReq, 999, vec![0u8; 2]);
        let bytes = bad_frame.encode().unwrap();
        {
            let mut w = client_conn.inner.write.lock().await;
            w.write_all(&bytes).await.unwrap();
            w.flush().await.unwrap();
        }

        // Give the server's receive loop a tick to observe and discard it.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!server_conn.is_closed(), "decode error must not close the connection");

        let server_task = tokio::spawn(async move {
            let call = inbound
                .recv()
                .await
                .expect("a later well-formed call still arrives");
            call.responder
                .respond(CallResponse {
                    more_fragments: false,
                    tracing: Tracing::default(),
                    headers: Headers::new(),
                    checksum_type: ChecksumType::None,
                    args: Args {
                        arg1: Vec::new(),
                        arg2: Vec::new(),
                        arg3: b"ok".to_vec(),
                    },
                })
                .await
                .unwrap();
        });

        let response = client_conn
            .call(
                "kv",
                1000,
                Args {
                    arg1: b"get".to_vec(),
                    arg2: Vec::new(),
                    arg3: b"key".to_vec(),
                },
            )
            .await
            .unwrap();
        assert_eq!(response.args.arg3, b"ok");
        server_task.await.unwrap();
    }
}
