//! Error types for wire codecs and the client driver.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Unified error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    /// A value does not fit the 62-bit variable-length integer range.
    #[error("varint value {0} exceeds the encodable maximum 2^62-1")]
    VarIntOutOfRange(u64),

    /// A packet number cannot be encoded in at most four bytes.
    #[error("packet number {0} exceeds the 4-byte encodable range")]
    PacketNumberOutOfRange(u64),

    /// A packet number does not fit the explicitly selected width.
    #[error("packet number {value} does not fit in {width} byte(s)")]
    PacketNumberWidth {
        /// The packet number being encoded.
        value: u64,
        /// The selected width in bytes.
        width: usize,
    },

    /// A decode ran out of input.
    #[error("truncated input: need {needed} byte(s), {available} available")]
    Truncated {
        /// Bytes the decoder needed at the failure point.
        needed: usize,
        /// Bytes that were actually available.
        available: usize,
    },

    /// Structurally invalid packet or frame contents.
    #[error("malformed packet: {0}")]
    Malformed(&'static str),

    /// A connection ID longer than RFC 9000 permits.
    #[error("connection ID length {0} exceeds the maximum of 20 bytes")]
    CidTooLong(usize),

    /// Establishing the UDP socket towards the server failed. Fatal for
    /// the client automaton.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        /// Remote address the connect was attempted against.
        addr: SocketAddr,
        /// Underlying socket error.
        source: io::Error,
    },

    /// Socket I/O failure outside of connection establishment.
    #[error("socket I/O error: {0}")]
    Io(#[from] io::Error),

    /// An event the client automaton does not accept in its current state.
    #[error("automaton: unexpected event {event} in state {state}")]
    Automaton {
        /// Name of the state the machine was in.
        state: &'static str,
        /// Name of the rejected event.
        event: &'static str,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Transport error codes (RFC 9000 Section 20.1).
///
/// These are carried as variable-length integers inside CONNECTION_CLOSE
/// frames of type 0x1c. Codes outside this closed set stay numeric on the
/// wire and do not map to a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum TransportErrorCode {
    /// No error; graceful close.
    NoError = 0x00,
    /// Implementation error.
    InternalError = 0x01,
    /// Server refused the connection.
    ConnectionRefused = 0x02,
    /// Flow control limit violated.
    FlowControlError = 0x03,
    /// Too many streams opened.
    StreamLimitError = 0x04,
    /// Frame received on a stream in the wrong state.
    StreamStateError = 0x05,
    /// Change to a stream's final size.
    FinalSizeError = 0x06,
    /// Malformed frame.
    FrameEncodingError = 0x07,
    /// Invalid transport parameter.
    TransportParameterError = 0x08,
    /// More connection IDs than the peer's limit.
    ConnectionIdLimitError = 0x09,
    /// Generic protocol violation.
    ProtocolViolation = 0x0a,
    /// Invalid Retry token.
    InvalidToken = 0x0b,
    /// Application-layer error.
    ApplicationError = 0x0c,
    /// CRYPTO data buffered beyond limits.
    CryptoBufferExceeded = 0x0d,
    /// Key update error.
    KeyUpdateError = 0x0e,
    /// AEAD confidentiality or integrity limit reached.
    AeadLimitReached = 0x0f,
    /// No viable network path exists.
    NoViablePath = 0x10,
}

impl TransportErrorCode {
    /// Numeric code as carried on the wire.
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Map a wire value back into the closed set, if it names one.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0x00 => Some(Self::NoError),
            0x01 => Some(Self::InternalError),
            0x02 => Some(Self::ConnectionRefused),
            0x03 => Some(Self::FlowControlError),
            0x04 => Some(Self::StreamLimitError),
            0x05 => Some(Self::StreamStateError),
            0x06 => Some(Self::FinalSizeError),
            0x07 => Some(Self::FrameEncodingError),
            0x08 => Some(Self::TransportParameterError),
            0x09 => Some(Self::ConnectionIdLimitError),
            0x0a => Some(Self::ProtocolViolation),
            0x0b => Some(Self::InvalidToken),
            0x0c => Some(Self::ApplicationError),
            0x0d => Some(Self::CryptoBufferExceeded),
            0x0e => Some(Self::KeyUpdateError),
            0x0f => Some(Self::AeadLimitReached),
            0x10 => Some(Self::NoViablePath),
            _ => None,
        }
    }
}

impl core::fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::NoError => "NO_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::FlowControlError => "FLOW_CONTROL_ERROR",
            Self::StreamLimitError => "STREAM_LIMIT_ERROR",
            Self::StreamStateError => "STREAM_STATE_ERROR",
            Self::FinalSizeError => "FINAL_SIZE_ERROR",
            Self::FrameEncodingError => "FRAME_ENCODING_ERROR",
            Self::TransportParameterError => "TRANSPORT_PARAMETER_ERROR",
            Self::ConnectionIdLimitError => "CONNECTION_ID_LIMIT_ERROR",
            Self::ProtocolViolation => "PROTOCOL_VIOLATION",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::ApplicationError => "APPLICATION_ERROR",
            Self::CryptoBufferExceeded => "CRYPTO_BUFFER_EXCEEDED",
            Self::KeyUpdateError => "KEY_UPDATE_ERROR",
            Self::AeadLimitReached => "AEAD_LIMIT_REACHED",
            Self::NoViablePath => "NO_VIABLE_PATH",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_code_roundtrip() {
        for code in 0x00..=0x10u64 {
            let parsed = TransportErrorCode::from_code(code).unwrap();
            assert_eq!(parsed.code(), code);
        }
    }

    #[test]
    fn transport_error_code_unknown() {
        assert_eq!(TransportErrorCode::from_code(0x11), None);
        assert_eq!(TransportErrorCode::from_code(0x1_0000), None);
    }

    #[test]
    fn error_display_carries_detail() {
        let err = Error::Truncated {
            needed: 4,
            available: 1,
        };
        let text = err.to_string();
        assert!(text.contains("need 4"));
        assert!(text.contains("1 available"));
    }
}
