//! # QUIC Packet Layer (RFC 9000 Section 17)
//!
//! Packet variant definitions, first-byte dispatch, wire parsing and
//! serialization, and the packet-number codec. Serialization runs the
//! assembled bytes through a [`PacketProtector`] seam; the default
//! [`NoProtection`] passes them through unchanged.

pub mod number;
pub mod parse;
pub mod types;

pub use number::{PacketNumberLen, PacketNumberRepr};
pub use parse::{parse_packet, serialize_packet, serialize_packet_protected, NoProtection, PacketProtector};
pub use types::{
    is_quic_port, Handshake, Initial, OneRtt, Packet, PacketType, Retry, VersionNegotiation,
    ZeroRtt, QUIC_PORT, VERSION_1, VERSION_NEGOTIATION,
};
