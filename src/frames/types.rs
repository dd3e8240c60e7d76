//! # Frame Type Definitions (RFC 9000 Section 19)
//!
//! One struct per frame with a body, collected into the closed [`Frame`]
//! enum. Integer fields are variable-length integers on the wire unless a
//! fixed width is called out.

#![forbid(unsafe_code)]

use bytes::Bytes;
use tinyvec::TinyVec;

use crate::connection::ConnectionId;

// ============================================================================
// Frame Type Tags (RFC 9000 Section 19)
// ============================================================================

/// PADDING frame type.
pub const FRAME_TYPE_PADDING: u8 = 0x00;
/// PING frame type.
pub const FRAME_TYPE_PING: u8 = 0x01;
/// ACK frame type, no ECN counts.
pub const FRAME_TYPE_ACK: u8 = 0x02;
/// ACK frame type with ECN counts.
pub const FRAME_TYPE_ACK_ECN: u8 = 0x03;
/// RESET_STREAM frame type.
pub const FRAME_TYPE_RESET_STREAM: u8 = 0x04;
/// STOP_SENDING frame type.
pub const FRAME_TYPE_STOP_SENDING: u8 = 0x05;
/// CRYPTO frame type.
pub const FRAME_TYPE_CRYPTO: u8 = 0x06;
/// NEW_TOKEN frame type.
pub const FRAME_TYPE_NEW_TOKEN: u8 = 0x07;
/// STREAM frame type base; the low three bits are OFF/LEN/FIN flags.
pub const FRAME_TYPE_STREAM_BASE: u8 = 0x08;
/// MAX_DATA frame type.
pub const FRAME_TYPE_MAX_DATA: u8 = 0x10;
/// MAX_STREAM_DATA frame type.
pub const FRAME_TYPE_MAX_STREAM_DATA: u8 = 0x11;
/// MAX_STREAMS frame type, bidirectional streams.
pub const FRAME_TYPE_MAX_STREAMS_BIDI: u8 = 0x12;
/// MAX_STREAMS frame type, unidirectional streams.
pub const FRAME_TYPE_MAX_STREAMS_UNI: u8 = 0x13;
/// DATA_BLOCKED frame type.
pub const FRAME_TYPE_DATA_BLOCKED: u8 = 0x14;
/// STREAM_DATA_BLOCKED frame type.
pub const FRAME_TYPE_STREAM_DATA_BLOCKED: u8 = 0x15;
/// STREAMS_BLOCKED frame type, bidirectional streams.
pub const FRAME_TYPE_STREAMS_BLOCKED_BIDI: u8 = 0x16;
/// STREAMS_BLOCKED frame type, unidirectional streams.
pub const FRAME_TYPE_STREAMS_BLOCKED_UNI: u8 = 0x17;
/// NEW_CONNECTION_ID frame type.
pub const FRAME_TYPE_NEW_CONNECTION_ID: u8 = 0x18;
/// RETIRE_CONNECTION_ID frame type.
pub const FRAME_TYPE_RETIRE_CONNECTION_ID: u8 = 0x19;
/// PATH_CHALLENGE frame type.
pub const FRAME_TYPE_PATH_CHALLENGE: u8 = 0x1a;
/// PATH_RESPONSE frame type.
pub const FRAME_TYPE_PATH_RESPONSE: u8 = 0x1b;
/// CONNECTION_CLOSE frame type, transport-level close.
pub const FRAME_TYPE_CONNECTION_CLOSE: u8 = 0x1c;
/// CONNECTION_CLOSE frame type, application-level close.
pub const FRAME_TYPE_CONNECTION_CLOSE_APP: u8 = 0x1d;
/// HANDSHAKE_DONE frame type.
pub const FRAME_TYPE_HANDSHAKE_DONE: u8 = 0x1e;

/// OFF flag bit of a STREAM frame tag.
pub const STREAM_OFF_BIT: u8 = 0x04;
/// LEN flag bit of a STREAM frame tag.
pub const STREAM_LEN_BIT: u8 = 0x02;
/// FIN flag bit of a STREAM frame tag.
pub const STREAM_FIN_BIT: u8 = 0x01;

// ============================================================================
// Frame Bodies
// ============================================================================

/// One additional ACK range: a gap below the previous range, then the
/// acknowledged run length (RFC 9000 Section 19.3.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckRange {
    /// Unacknowledged packets below the smallest of the previous range,
    /// minus two.
    pub gap: u64,
    /// Acknowledged packets in this range, counting from the range top.
    pub length: u64,
}

/// ECN counts attached to an ACK frame of type 0x03 (RFC 9000
/// Section 19.3.2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EcnCounts {
    /// Packets received with the ECT(0) codepoint.
    pub ect0: u64,
    /// Packets received with the ECT(1) codepoint.
    pub ect1: u64,
    /// Packets received with the ECN-CE codepoint.
    pub ce: u64,
}

/// ACK frame (RFC 9000 Section 19.3).
///
/// The wire carries a range count before the additional ranges; it is
/// derived from `ranges.len()` when serializing, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AckFrame {
    /// Largest packet number being acknowledged.
    pub largest_acked: u64,
    /// Acknowledgement delay in the peer's declared units.
    pub ack_delay: u64,
    /// Packets acknowledged contiguously below `largest_acked`.
    pub first_range: u64,
    /// Additional gap/length pairs, descending.
    pub ranges: TinyVec<[AckRange; 8]>,
    /// ECN counts; present iff the frame was (or will be) type 0x03.
    pub ecn: Option<EcnCounts>,
}

/// RESET_STREAM frame (RFC 9000 Section 19.4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetStreamFrame {
    /// Stream being reset.
    pub stream_id: u64,
    /// Application protocol error code.
    pub app_error_code: u64,
    /// Final size of the stream in bytes.
    pub final_size: u64,
}

/// STOP_SENDING frame (RFC 9000 Section 19.5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopSendingFrame {
    /// Stream the sender should stop sending on.
    pub stream_id: u64,
    /// Application protocol error code.
    pub app_error_code: u64,
}

/// CRYPTO frame (RFC 9000 Section 19.6).
///
/// The wire length field always equals `data.len()` and is derived at
/// serialization time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CryptoFrame {
    /// Byte offset into the cryptographic handshake stream.
    pub offset: u64,
    /// Handshake bytes.
    pub data: Bytes,
}

/// NEW_TOKEN frame (RFC 9000 Section 19.7).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTokenFrame {
    /// Token for a future Initial packet. Must not be empty on the wire.
    pub token: Bytes,
}

/// STREAM frame (RFC 9000 Section 19.8).
///
/// The OFF/LEN/FIN bits live in the type tag, so they are carried here as
/// struct state: `offset` is `Some` iff OFF was (or will be) set, and
/// `explicit_len` records LEN so a tail-form frame re-serializes into the
/// same tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFrame {
    /// Stream the data belongs to.
    pub stream_id: u64,
    /// Byte offset of this data in the stream; `None` means offset zero
    /// with no offset field on the wire.
    pub offset: Option<u64>,
    /// Whether the wire form carries a length field. Without one the data
    /// extends to the end of the packet payload.
    pub explicit_len: bool,
    /// Whether this frame ends the stream.
    pub fin: bool,
    /// Stream data.
    pub data: Bytes,
}

/// MAX_DATA frame (RFC 9000 Section 19.9).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxDataFrame {
    /// New connection-level flow control limit in bytes.
    pub maximum: u64,
}

/// MAX_STREAM_DATA frame (RFC 9000 Section 19.10).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxStreamDataFrame {
    /// Stream the limit applies to.
    pub stream_id: u64,
    /// New stream-level flow control limit in bytes.
    pub maximum: u64,
}

/// MAX_STREAMS frame (RFC 9000 Section 19.11).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxStreamsFrame {
    /// Cumulative number of streams of the given kind the peer may open.
    pub maximum: u64,
    /// True for tag 0x12 (bidirectional), false for 0x13.
    pub bidirectional: bool,
}

/// DATA_BLOCKED frame (RFC 9000 Section 19.12).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataBlockedFrame {
    /// Connection-level limit at which sending stalled.
    pub limit: u64,
}

/// STREAM_DATA_BLOCKED frame (RFC 9000 Section 19.13).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamDataBlockedFrame {
    /// Stream whose flow control limit was hit.
    pub stream_id: u64,
    /// Stream-level limit at which sending stalled.
    pub limit: u64,
}

/// STREAMS_BLOCKED frame (RFC 9000 Section 19.14).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamsBlockedFrame {
    /// Stream limit at which opening stalled.
    pub limit: u64,
    /// True for tag 0x16 (bidirectional), false for 0x17.
    pub bidirectional: bool,
}

/// NEW_CONNECTION_ID frame (RFC 9000 Section 19.15).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewConnectionIdFrame {
    /// Sequence number assigned by the sender.
    pub sequence_number: u64,
    /// Connection IDs below this sequence number should be retired.
    pub retire_prior_to: u64,
    /// The new connection ID, 1 to 20 bytes.
    pub cid: ConnectionId,
    /// Stateless reset token associated with the new ID.
    pub reset_token: [u8; 16],
}

/// RETIRE_CONNECTION_ID frame (RFC 9000 Section 19.16).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetireConnectionIdFrame {
    /// Sequence number of the connection ID being retired.
    pub sequence_number: u64,
}

/// PATH_CHALLENGE frame (RFC 9000 Section 19.17).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathChallengeFrame {
    /// Arbitrary payload the peer must echo.
    pub data: [u8; 8],
}

/// PATH_RESPONSE frame (RFC 9000 Section 19.18).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathResponseFrame {
    /// Echo of a PATH_CHALLENGE payload.
    pub data: [u8; 8],
}

/// CONNECTION_CLOSE frame (RFC 9000 Section 19.19).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionCloseFrame {
    /// Error code; a transport error code
    /// ([`crate::error::TransportErrorCode`]) for tag 0x1c, an application
    /// code for tag 0x1d. Unknown codes stay numeric.
    pub error_code: u64,
    /// Type of the frame that triggered the close; 0 when no single frame
    /// is at fault. Absent from the wire for application closes.
    pub frame_type: u64,
    /// Human-readable reason, possibly empty.
    pub reason: Bytes,
    /// True for tag 0x1d (application close), false for 0x1c.
    pub application: bool,
}

// ============================================================================
// Closed Frame Set
// ============================================================================

/// A single QUIC frame.
///
/// The set is closed; tags outside it parse into [`Frame::Unknown`]
/// carrying only the tag, and nothing beyond the tag byte is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// PADDING (0x00). One frame per padding byte; runs round-trip with
    /// their exact length.
    Padding,
    /// PING (0x01).
    Ping,
    /// ACK (0x02) or ACK with ECN (0x03).
    Ack(AckFrame),
    /// RESET_STREAM (0x04).
    ResetStream(ResetStreamFrame),
    /// STOP_SENDING (0x05).
    StopSending(StopSendingFrame),
    /// CRYPTO (0x06).
    Crypto(CryptoFrame),
    /// NEW_TOKEN (0x07).
    NewToken(NewTokenFrame),
    /// STREAM (0x08 through 0x0f).
    Stream(StreamFrame),
    /// MAX_DATA (0x10).
    MaxData(MaxDataFrame),
    /// MAX_STREAM_DATA (0x11).
    MaxStreamData(MaxStreamDataFrame),
    /// MAX_STREAMS (0x12, 0x13).
    MaxStreams(MaxStreamsFrame),
    /// DATA_BLOCKED (0x14).
    DataBlocked(DataBlockedFrame),
    /// STREAM_DATA_BLOCKED (0x15).
    StreamDataBlocked(StreamDataBlockedFrame),
    /// STREAMS_BLOCKED (0x16, 0x17).
    StreamsBlocked(StreamsBlockedFrame),
    /// NEW_CONNECTION_ID (0x18).
    NewConnectionId(NewConnectionIdFrame),
    /// RETIRE_CONNECTION_ID (0x19).
    RetireConnectionId(RetireConnectionIdFrame),
    /// PATH_CHALLENGE (0x1a).
    PathChallenge(PathChallengeFrame),
    /// PATH_RESPONSE (0x1b).
    PathResponse(PathResponseFrame),
    /// CONNECTION_CLOSE (0x1c, 0x1d).
    ConnectionClose(ConnectionCloseFrame),
    /// HANDSHAKE_DONE (0x1e).
    HandshakeDone,
    /// Any tag outside the closed set; the tag is all that is kept.
    Unknown(u8),
}

impl Frame {
    /// The type tag this frame serializes with.
    pub fn tag(&self) -> u8 {
        match self {
            Frame::Padding => FRAME_TYPE_PADDING,
            Frame::Ping => FRAME_TYPE_PING,
            Frame::Ack(ack) if ack.ecn.is_some() => FRAME_TYPE_ACK_ECN,
            Frame::Ack(_) => FRAME_TYPE_ACK,
            Frame::ResetStream(_) => FRAME_TYPE_RESET_STREAM,
            Frame::StopSending(_) => FRAME_TYPE_STOP_SENDING,
            Frame::Crypto(_) => FRAME_TYPE_CRYPTO,
            Frame::NewToken(_) => FRAME_TYPE_NEW_TOKEN,
            Frame::Stream(stream) => {
                let mut tag = FRAME_TYPE_STREAM_BASE;
                if stream.offset.is_some() {
                    tag |= STREAM_OFF_BIT;
                }
                if stream.explicit_len {
                    tag |= STREAM_LEN_BIT;
                }
                if stream.fin {
                    tag |= STREAM_FIN_BIT;
                }
                tag
            }
            Frame::MaxData(_) => FRAME_TYPE_MAX_DATA,
            Frame::MaxStreamData(_) => FRAME_TYPE_MAX_STREAM_DATA,
            Frame::MaxStreams(max) if max.bidirectional => FRAME_TYPE_MAX_STREAMS_BIDI,
            Frame::MaxStreams(_) => FRAME_TYPE_MAX_STREAMS_UNI,
            Frame::DataBlocked(_) => FRAME_TYPE_DATA_BLOCKED,
            Frame::StreamDataBlocked(_) => FRAME_TYPE_STREAM_DATA_BLOCKED,
            Frame::StreamsBlocked(blocked) if blocked.bidirectional => {
                FRAME_TYPE_STREAMS_BLOCKED_BIDI
            }
            Frame::StreamsBlocked(_) => FRAME_TYPE_STREAMS_BLOCKED_UNI,
            Frame::NewConnectionId(_) => FRAME_TYPE_NEW_CONNECTION_ID,
            Frame::RetireConnectionId(_) => FRAME_TYPE_RETIRE_CONNECTION_ID,
            Frame::PathChallenge(_) => FRAME_TYPE_PATH_CHALLENGE,
            Frame::PathResponse(_) => FRAME_TYPE_PATH_RESPONSE,
            Frame::ConnectionClose(close) if close.application => {
                FRAME_TYPE_CONNECTION_CLOSE_APP
            }
            Frame::ConnectionClose(_) => FRAME_TYPE_CONNECTION_CLOSE,
            Frame::HandshakeDone => FRAME_TYPE_HANDSHAKE_DONE,
            Frame::Unknown(tag) => *tag,
        }
    }
}

/// A packet's payload as seen through its connection context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// Payload dissected while the context was not decrypted: kept as raw
    /// bytes and re-serialized exactly.
    Opaque(Bytes),
    /// Payload dissected (or built) as a frame sequence.
    Frames(Vec<Frame>),
}

impl Default for FramePayload {
    fn default() -> Self {
        FramePayload::Frames(Vec::new())
    }
}

impl FramePayload {
    /// True if the payload is an undissected blob.
    pub fn is_opaque(&self) -> bool {
        matches!(self, FramePayload::Opaque(_))
    }

    /// The frame list, if the payload was dissected.
    pub fn frames(&self) -> Option<&[Frame]> {
        match self {
            FramePayload::Frames(frames) => Some(frames),
            FramePayload::Opaque(_) => None,
        }
    }

    /// True for an empty payload in either representation.
    pub fn is_empty(&self) -> bool {
        match self {
            FramePayload::Opaque(data) => data.is_empty(),
            FramePayload::Frames(frames) => frames.is_empty(),
        }
    }
}
