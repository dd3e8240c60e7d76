//! quicwire: QUIC v1 wire-format codecs and a minimal client handshake
//! driver.
//!
//! This crate implements the wire encoding and connection-establishment
//! pieces of RFC 9000: the variable-length integer codec, the packet
//! number codec, the frame layer, the six packet variants, and a blocking
//! client automaton that sends one Initial flight and waits for the
//! server's answer.
//!
//! # What this crate is not
//!
//! There is no cryptography here. Packet payloads stay opaque byte blobs
//! until the per-connection [`ConnectionContext`] reports that keys are
//! available, and serialization runs through a pass-through protection
//! seam ([`packet::PacketProtector`]) where a TLS collaborator would apply
//! real header and payload protection. Loss recovery, congestion control,
//! streams, and the server role are out of scope.
//!
//! # Module Organization
//!
//! - `varint`: RFC 9000 Section 16 variable-length integers
//! - `connection`: shared per-connection context and connection IDs
//! - `frames`: the closed frame set and payload dissection
//! - `packet`: packet variants, dispatch, parsing, serialization
//! - `client`: the blocking handshake automaton
//! - `error`: the crate-wide error type and transport error codes
//!
//! # Example
//!
//! ```
//! use quicwire::{ConnectionContext, Frame, FramePayload, Packet};
//! use quicwire::packet::{parse_packet, serialize_packet, Initial};
//!
//! let ctx = ConnectionContext::new();
//! ctx.set_decrypted(true);
//!
//! let mut initial = Initial::new(&ctx);
//! initial.payload = FramePayload::Frames(vec![Frame::Ping]);
//!
//! let wire = serialize_packet(&Packet::Initial(initial)).unwrap();
//! let (parsed, consumed) = parse_packet(&ctx, &wire).unwrap();
//! assert_eq!(consumed, wire.len());
//! assert_eq!(parsed.summary(), "QUIC - Initial");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod connection;
pub mod error;
pub mod frames;
pub mod packet;
pub mod varint;

pub use client::{ClientConfig, ClientState, QuicClient, StopHandle};
pub use connection::{ConnectionContext, ConnectionHandle, ConnectionId};
pub use error::{Error, Result, TransportErrorCode};
pub use frames::{Frame, FramePayload};
pub use packet::{parse_packet, serialize_packet, Packet, PacketType};
