//! # Client Handshake State Machine
//!
//! Pure state machine: accepts events, produces effects. All I/O lives in
//! the driver that interprets the effects, so every transition here is
//! synchronous and testable without a socket.
//!
//! The happy path is a straight chain from [`ClientState::Initial`] to
//! [`ClientState::WaitingServerHandshake`]; [`Event::Stop`] forces the
//! terminal [`ClientState::Stopped`] from anywhere.

#![forbid(unsafe_code)]

use crate::error::{Error, Result};

/// States of the client handshake automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Entry state; nothing has happened yet.
    Initial,
    /// Setting up the inner TLS session placeholder.
    InitTlsSession,
    /// Opening the UDP socket towards the server.
    Connect,
    /// Composing the first handshake record.
    QuicStart,
    /// The Initial record sits in the pending buffer.
    QuicAddedInitial,
    /// Flushing pending records onto the socket.
    QuicSendingInitial,
    /// The Initial flight is on the wire.
    QuicSentInitial,
    /// Blocked on the server's first handshake flight. The designed
    /// extension point; received datagrams are handed to the caller.
    WaitingServerHandshake,
    /// Terminal state after cancellation.
    Stopped,
}

impl ClientState {
    /// Name used in logs and automaton faults.
    pub fn name(self) -> &'static str {
        match self {
            ClientState::Initial => "INITIAL",
            ClientState::InitTlsSession => "INIT_TLS_SESSION",
            ClientState::Connect => "CONNECT",
            ClientState::QuicStart => "QUIC_START",
            ClientState::QuicAddedInitial => "QUIC_ADDED_INITIAL",
            ClientState::QuicSendingInitial => "QUIC_SENDING_INITIAL",
            ClientState::QuicSentInitial => "QUIC_SENT_INITIAL",
            ClientState::WaitingServerHandshake => "TLS13_WAITING_SERVER_HANDSHAKE",
            ClientState::Stopped => "STOPPED",
        }
    }
}

/// Events the automaton reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Kick off the run.
    Start,
    /// The TLS session placeholder exists.
    TlsSessionReady,
    /// The UDP socket is connected and locally bound.
    SocketConnected,
    /// A record landed in the pending buffer.
    RecordQueued,
    /// The pending buffer was flushed onto the socket.
    RecordsFlushed,
    /// Unconditional progress through a pass-through state.
    Proceed,
    /// A datagram arrived from the server.
    Datagram,
    /// External cancellation.
    Stop,
}

impl Event {
    /// Name used in logs and automaton faults.
    pub fn name(self) -> &'static str {
        match self {
            Event::Start => "Start",
            Event::TlsSessionReady => "TlsSessionReady",
            Event::SocketConnected => "SocketConnected",
            Event::RecordQueued => "RecordQueued",
            Event::RecordsFlushed => "RecordsFlushed",
            Event::Proceed => "Proceed",
            Event::Datagram => "Datagram",
            Event::Stop => "Stop",
        }
    }
}

/// Side effects the driver performs after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Create the TLS session placeholder and the connection context.
    InitTlsSession,
    /// Open and connect the UDP socket.
    OpenSocket,
    /// Build the Initial packet and append it to the pending buffer.
    QueueInitialRecord,
    /// Send every pending record on the socket.
    FlushRecords,
    /// Block until a datagram arrives or a stop is requested.
    AwaitDatagram,
    /// Emit [`Event::Proceed`].
    Proceed,
    /// Drop the socket. Unblocks nothing; the receive polls the stop flag.
    CloseSocket,
}

/// Advance the machine by one event.
///
/// Returns the next state and the effects the driver must perform, in
/// order. [`ClientState::Stopped`] absorbs everything; [`Event::Stop`] is
/// accepted in every state.
///
/// # Errors
///
/// [`Error::Automaton`] for any (state, event) pair outside the chain.
pub fn transition(state: ClientState, event: Event) -> Result<(ClientState, &'static [Effect])> {
    use ClientState as S;
    use Effect as F;
    use Event as E;

    Ok(match (state, event) {
        (S::Stopped, _) => (S::Stopped, &[]),
        (_, E::Stop) => (S::Stopped, &[F::CloseSocket]),
        (S::Initial, E::Start) => (S::InitTlsSession, &[F::InitTlsSession]),
        (S::InitTlsSession, E::TlsSessionReady) => (S::Connect, &[F::OpenSocket]),
        (S::Connect, E::SocketConnected) => (S::QuicStart, &[F::QueueInitialRecord]),
        (S::QuicStart, E::RecordQueued) => (S::QuicAddedInitial, &[F::Proceed]),
        (S::QuicAddedInitial, E::Proceed) => (S::QuicSendingInitial, &[F::FlushRecords]),
        (S::QuicSendingInitial, E::RecordsFlushed) => (S::QuicSentInitial, &[F::Proceed]),
        (S::QuicSentInitial, E::Proceed) => (S::WaitingServerHandshake, &[F::AwaitDatagram]),
        (S::WaitingServerHandshake, E::Datagram) => (S::WaitingServerHandshake, &[]),
        (state, event) => {
            return Err(Error::Automaton {
                state: state.name(),
                event: event.name(),
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_the_whole_chain() {
        let steps = [
            (Event::Start, ClientState::InitTlsSession),
            (Event::TlsSessionReady, ClientState::Connect),
            (Event::SocketConnected, ClientState::QuicStart),
            (Event::RecordQueued, ClientState::QuicAddedInitial),
            (Event::Proceed, ClientState::QuicSendingInitial),
            (Event::RecordsFlushed, ClientState::QuicSentInitial),
            (Event::Proceed, ClientState::WaitingServerHandshake),
        ];

        let mut state = ClientState::Initial;
        for (event, expected) in steps {
            let (next, effects) = transition(state, event).unwrap();
            assert_eq!(next, expected, "after {}", event.name());
            assert!(!effects.is_empty(), "every chain state drives an effect");
            state = next;
        }
    }

    #[test]
    fn datagram_keeps_waiting_with_no_effects() {
        let (next, effects) =
            transition(ClientState::WaitingServerHandshake, Event::Datagram).unwrap();
        assert_eq!(next, ClientState::WaitingServerHandshake);
        assert!(effects.is_empty());
    }

    #[test]
    fn stop_terminates_from_any_state() {
        let states = [
            ClientState::Initial,
            ClientState::Connect,
            ClientState::QuicSendingInitial,
            ClientState::WaitingServerHandshake,
        ];
        for state in states {
            let (next, effects) = transition(state, Event::Stop).unwrap();
            assert_eq!(next, ClientState::Stopped, "from {}", state.name());
            assert_eq!(effects, [Effect::CloseSocket]);
        }
    }

    #[test]
    fn stopped_absorbs_everything() {
        for event in [Event::Start, Event::Datagram, Event::Stop] {
            let (next, effects) = transition(ClientState::Stopped, event).unwrap();
            assert_eq!(next, ClientState::Stopped);
            assert!(effects.is_empty());
        }
    }

    #[test]
    fn out_of_order_events_are_faults() {
        let err = transition(ClientState::Initial, Event::Datagram).unwrap_err();
        assert!(matches!(
            err,
            Error::Automaton {
                state: "INITIAL",
                event: "Datagram"
            }
        ));

        assert!(transition(ClientState::QuicStart, Event::Start).is_err());
        assert!(transition(ClientState::WaitingServerHandshake, Event::Proceed).is_err());
    }
}
