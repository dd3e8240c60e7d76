//! # QUIC Frame Types and Parsing (RFC 9000 Section 19)
//!
//! Frames are the unit of meaning inside packet payloads. The set of
//! frame types is closed: dispatch in both directions is a compile-time
//! `match` over [`Frame`], with [`Frame::Unknown`] absorbing tags outside
//! the registry instead of failing.
//!
//! Whether a payload can be read as frames at all is decided by the
//! owning connection's [`crate::connection::ConnectionContext`]: until its
//! decrypted gate is set, payloads stay [`FramePayload::Opaque`] and
//! round-trip byte-exact.

pub mod parse;
pub mod types;

pub use parse::{dissect_payload, parse_frame, serialize_frame, serialize_payload};
pub use types::{
    AckFrame, AckRange, ConnectionCloseFrame, CryptoFrame, EcnCounts, Frame, FramePayload,
    NewConnectionIdFrame, NewTokenFrame, ResetStreamFrame, StopSendingFrame, StreamFrame,
};
