//! # Client Handshake Driver
//!
//! A blocking, single-attempt driver for the client side of connection
//! establishment: it opens a UDP socket, sends one Initial packet carrying
//! the configured handshake bytes, and waits for the server's first
//! flight. The state machine itself is pure ([`state::transition`]); this
//! module interprets its effects against a real socket.
//!
//! No timeouts, no retransmission, no response processing: the run ends
//! the moment a datagram arrives (it is returned to the caller) or a
//! [`StopHandle`] cancels the wait. The pending-records buffer and the
//! connection context's decrypted gate are the contract points with the
//! out-of-scope TLS collaborator.

pub mod socket;
pub mod state;

#[cfg(test)]
mod tests;

use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionContext, ConnectionHandle, ConnectionId};
use crate::error::{Error, Result};
use crate::frames::{CryptoFrame, Frame, FramePayload};
use crate::packet::{serialize_packet, Initial, Packet, VERSION_1};

pub use state::{transition, ClientState, Effect, Event};

/// Largest datagram the receive path accepts.
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Client configuration. Plain data; resolution happens once in
/// [`QuicClient::new`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host name or address.
    pub server: String,
    /// Server UDP port.
    pub port: u16,
    /// Protocol version for the Initial packet.
    pub version: u32,
    /// Destination connection ID to open with.
    pub dcid: ConnectionId,
    /// Source connection ID to advertise.
    pub scid: ConnectionId,
    /// Handshake bytes for the CRYPTO frame of the Initial packet; an
    /// empty value sends a bare Initial.
    pub crypto_payload: Bytes,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1".to_string(),
            port: crate::packet::QUIC_PORT,
            version: VERSION_1,
            dcid: ConnectionId::empty(),
            scid: ConnectionId::empty(),
            crypto_payload: Bytes::new(),
        }
    }
}

/// Cancellation handle for a running client.
///
/// Cloneable across threads; the driver's blocked receive observes a stop
/// request within one poll interval.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Request cancellation. Idempotent.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// The blocking client handshake driver.
pub struct QuicClient {
    config: ClientConfig,
    remote: SocketAddr,
    ctx: ConnectionHandle,
    state: ClientState,
    socket: Option<UdpSocket>,
    local_addr: Option<SocketAddr>,
    pending: Vec<Bytes>,
    stop: Arc<AtomicBool>,
    received: Option<Bytes>,
}

impl QuicClient {
    /// Build a client against `config`, resolving the server address once.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the server name does not resolve.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let remote = (config.server.as_str(), config.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    ErrorKind::NotFound,
                    "server name resolved to no addresses",
                ))
            })?;

        Ok(Self {
            config,
            remote,
            ctx: ConnectionContext::new(),
            state: ClientState::Initial,
            socket: None,
            local_addr: None,
            pending: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
            received: None,
        })
    }

    /// The automaton's current state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// The resolved remote address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// The kernel-assigned local address, once the socket is connected.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// The connection context shared with every packet of this run.
    pub fn context(&self) -> &ConnectionHandle {
        &self.ctx
    }

    /// A handle that cancels the run from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }

    /// Drive the automaton from [`ClientState::Initial`] to completion.
    ///
    /// Returns the server's first datagram, or `None` if a stop request
    /// won the race. The machine stays in
    /// [`ClientState::WaitingServerHandshake`] after a datagram; further
    /// processing of the response belongs to the caller.
    ///
    /// # Errors
    ///
    /// [`Error::Connect`] if the socket cannot be established (fatal, no
    /// retry), [`Error::Io`] for send/receive failures, and codec errors
    /// from building the Initial packet.
    pub fn run(&mut self) -> Result<Option<Bytes>> {
        info!(server = %self.remote, "starting QUIC client automaton");

        let mut event = Event::Start;
        loop {
            let (next, effects) = transition(self.state, event)?;
            debug!(
                from = self.state.name(),
                event = event.name(),
                to = next.name(),
                "transition"
            );
            self.state = next;

            let mut next_event = None;
            for effect in effects {
                if let Some(produced) = self.execute(*effect)? {
                    next_event = Some(produced);
                }
            }

            if self.state == ClientState::Stopped {
                return Ok(None);
            }
            match next_event {
                Some(produced) => event = produced,
                None => return Ok(self.received.take()),
            }
        }
    }

    fn execute(&mut self, effect: Effect) -> Result<Option<Event>> {
        match effect {
            Effect::InitTlsSession => Ok(Some(self.init_tls_session())),
            Effect::OpenSocket => self.open_socket().map(Some),
            Effect::QueueInitialRecord => self.queue_initial_record().map(Some),
            Effect::FlushRecords => self.flush_records().map(Some),
            Effect::AwaitDatagram => self.await_datagram().map(Some),
            Effect::Proceed => Ok(Some(Event::Proceed)),
            Effect::CloseSocket => {
                self.close_socket();
                Ok(None)
            }
        }
    }

    /// TLS session placeholder: seeds the connection context with the
    /// configured identity. Key derivation is the collaborator's job.
    fn init_tls_session(&mut self) -> Event {
        self.ctx.set_version(self.config.version);
        self.ctx.set_dcid(self.config.dcid.clone());
        self.ctx.set_scid(self.config.scid.clone());
        Event::TlsSessionReady
    }

    fn open_socket(&mut self) -> Result<Event> {
        let socket = socket::connect_udp(self.remote)?;
        let local = socket.local_addr()?;
        info!(local = %local, "socket connected");
        self.socket = Some(socket);
        self.local_addr = Some(local);
        Ok(Event::SocketConnected)
    }

    fn queue_initial_record(&mut self) -> Result<Event> {
        let mut packet = Initial::new(&self.ctx);
        packet.version = self.config.version;
        packet.dcid = self.config.dcid.clone();
        packet.scid = self.config.scid.clone();
        if !self.config.crypto_payload.is_empty() {
            packet.payload = FramePayload::Frames(vec![Frame::Crypto(CryptoFrame {
                offset: 0,
                data: self.config.crypto_payload.clone(),
            })]);
        }

        let record = serialize_packet(&Packet::Initial(packet))?;
        debug!(len = record.len(), "queued Initial record");
        self.pending.push(record);
        Ok(Event::RecordQueued)
    }

    fn flush_records(&mut self) -> Result<Event> {
        let records = std::mem::take(&mut self.pending);
        let socket = self.socket()?;
        for record in &records {
            socket.send(record)?;
        }
        debug!(count = records.len(), "flushed pending records");
        Ok(Event::RecordsFlushed)
    }

    /// The only suspension point: blocks until a datagram arrives or a
    /// stop request is observed.
    fn await_datagram(&mut self) -> Result<Event> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let received = loop {
            if self.stop.load(Ordering::Acquire) {
                return Ok(Event::Stop);
            }
            match self.socket()?.recv(&mut buf) {
                Ok(len) => break Bytes::copy_from_slice(&buf[..len]),
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue;
                }
                Err(err) => return Err(Error::Io(err)),
            }
        };
        debug!(len = received.len(), "received server datagram");
        self.received = Some(received);
        Ok(Event::Datagram)
    }

    fn close_socket(&mut self) {
        if !self.pending.is_empty() {
            warn!(
                pending = self.pending.len(),
                "stopping with records still pending"
            );
        }
        self.socket = None;
    }

    fn socket(&self) -> Result<&UdpSocket> {
        self.socket.as_ref().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                ErrorKind::NotConnected,
                "socket not open",
            ))
        })
    }
}
