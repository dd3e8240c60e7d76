//! # Frame Dissection and Serialization (RFC 9000 Section 19)
//!
//! Payload-level entry points ([`dissect_payload`], [`serialize_payload`])
//! gate on the connection context's decrypted flag; frame-level entry
//! points ([`parse_frame`], [`serialize_frame`]) work on one frame at a
//! time. Dissection walks the payload to exhaustion; a frame whose
//! declared length overruns the payload is a truncation fault, while an
//! unrecognized tag is not a fault at all.

#![forbid(unsafe_code)]

use bytes::{BufMut, Bytes};
use tinyvec::TinyVec;

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::error::{Error, Result};
use crate::frames::types::*;
use crate::varint;

/// Dissect a packet payload under its connection context.
///
/// While the context is not decrypted the payload is kept as an opaque
/// blob; otherwise frames are parsed back to back until the payload is
/// exhausted.
pub fn dissect_payload(ctx: &ConnectionHandle, data: &[u8]) -> Result<FramePayload> {
    if !ctx.is_decrypted() {
        return Ok(FramePayload::Opaque(Bytes::copy_from_slice(data)));
    }

    let mut frames = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let (frame, consumed) = parse_frame(&data[offset..])?;
        frames.push(frame);
        offset += consumed;
    }
    Ok(FramePayload::Frames(frames))
}

/// Serialize a payload into `buf`, returning the bytes written.
///
/// Opaque payloads are emitted byte-exact.
pub fn serialize_payload<B: BufMut>(payload: &FramePayload, buf: &mut B) -> Result<usize> {
    match payload {
        FramePayload::Opaque(data) => {
            buf.put_slice(data);
            Ok(data.len())
        }
        FramePayload::Frames(frames) => {
            let mut written = 0;
            for frame in frames {
                written += serialize_frame(frame, buf)?;
            }
            Ok(written)
        }
    }
}

/// Parse a single frame from the front of `data`.
///
/// Returns the frame and the bytes consumed. Tags outside the closed set
/// yield [`Frame::Unknown`] and consume only the tag byte.
pub fn parse_frame(data: &[u8]) -> Result<(Frame, usize)> {
    let tag = *data.first().ok_or(Error::Truncated {
        needed: 1,
        available: 0,
    })?;

    match tag {
        FRAME_TYPE_PADDING => Ok((Frame::Padding, 1)),
        FRAME_TYPE_PING => Ok((Frame::Ping, 1)),
        FRAME_TYPE_ACK => parse_ack(data, false),
        FRAME_TYPE_ACK_ECN => parse_ack(data, true),
        FRAME_TYPE_RESET_STREAM => parse_reset_stream(data),
        FRAME_TYPE_STOP_SENDING => parse_stop_sending(data),
        FRAME_TYPE_CRYPTO => parse_crypto(data),
        FRAME_TYPE_NEW_TOKEN => parse_new_token(data),
        tag if (FRAME_TYPE_STREAM_BASE..=0x0f).contains(&tag) => parse_stream(data, tag),
        FRAME_TYPE_MAX_DATA => parse_max_data(data),
        FRAME_TYPE_MAX_STREAM_DATA => parse_max_stream_data(data),
        FRAME_TYPE_MAX_STREAMS_BIDI => parse_max_streams(data, true),
        FRAME_TYPE_MAX_STREAMS_UNI => parse_max_streams(data, false),
        FRAME_TYPE_DATA_BLOCKED => parse_data_blocked(data),
        FRAME_TYPE_STREAM_DATA_BLOCKED => parse_stream_data_blocked(data),
        FRAME_TYPE_STREAMS_BLOCKED_BIDI => parse_streams_blocked(data, true),
        FRAME_TYPE_STREAMS_BLOCKED_UNI => parse_streams_blocked(data, false),
        FRAME_TYPE_NEW_CONNECTION_ID => parse_new_connection_id(data),
        FRAME_TYPE_RETIRE_CONNECTION_ID => parse_retire_connection_id(data),
        FRAME_TYPE_PATH_CHALLENGE => parse_path_frame(data, true),
        FRAME_TYPE_PATH_RESPONSE => parse_path_frame(data, false),
        FRAME_TYPE_CONNECTION_CLOSE => parse_connection_close(data, false),
        FRAME_TYPE_CONNECTION_CLOSE_APP => parse_connection_close(data, true),
        FRAME_TYPE_HANDSHAKE_DONE => Ok((Frame::HandshakeDone, 1)),
        other => Ok((Frame::Unknown(other), 1)),
    }
}

/// Serialize one frame into `buf`, returning the bytes written.
pub fn serialize_frame<B: BufMut>(frame: &Frame, buf: &mut B) -> Result<usize> {
    buf.put_u8(frame.tag());
    let mut written = 1;

    match frame {
        Frame::Padding | Frame::Ping | Frame::HandshakeDone | Frame::Unknown(_) => {}
        Frame::Ack(ack) => {
            written += varint::encode(ack.largest_acked, buf)?;
            written += varint::encode(ack.ack_delay, buf)?;
            written += varint::encode(ack.ranges.len() as u64, buf)?;
            written += varint::encode(ack.first_range, buf)?;
            for range in &ack.ranges {
                written += varint::encode(range.gap, buf)?;
                written += varint::encode(range.length, buf)?;
            }
            if let Some(ecn) = &ack.ecn {
                written += varint::encode(ecn.ect0, buf)?;
                written += varint::encode(ecn.ect1, buf)?;
                written += varint::encode(ecn.ce, buf)?;
            }
        }
        Frame::ResetStream(reset) => {
            written += varint::encode(reset.stream_id, buf)?;
            written += varint::encode(reset.app_error_code, buf)?;
            written += varint::encode(reset.final_size, buf)?;
        }
        Frame::StopSending(stop) => {
            written += varint::encode(stop.stream_id, buf)?;
            written += varint::encode(stop.app_error_code, buf)?;
        }
        Frame::Crypto(crypto) => {
            written += varint::encode(crypto.offset, buf)?;
            written += varint::encode_prefixed(&crypto.data, buf)?;
        }
        Frame::NewToken(new_token) => {
            written += varint::encode_prefixed(&new_token.token, buf)?;
        }
        Frame::Stream(stream) => {
            written += varint::encode(stream.stream_id, buf)?;
            if let Some(offset) = stream.offset {
                written += varint::encode(offset, buf)?;
            }
            if stream.explicit_len {
                written += varint::encode(stream.data.len() as u64, buf)?;
            }
            buf.put_slice(&stream.data);
            written += stream.data.len();
        }
        Frame::MaxData(max) => {
            written += varint::encode(max.maximum, buf)?;
        }
        Frame::MaxStreamData(max) => {
            written += varint::encode(max.stream_id, buf)?;
            written += varint::encode(max.maximum, buf)?;
        }
        Frame::MaxStreams(max) => {
            written += varint::encode(max.maximum, buf)?;
        }
        Frame::DataBlocked(blocked) => {
            written += varint::encode(blocked.limit, buf)?;
        }
        Frame::StreamDataBlocked(blocked) => {
            written += varint::encode(blocked.stream_id, buf)?;
            written += varint::encode(blocked.limit, buf)?;
        }
        Frame::StreamsBlocked(blocked) => {
            written += varint::encode(blocked.limit, buf)?;
        }
        Frame::NewConnectionId(new_cid) => {
            written += varint::encode(new_cid.sequence_number, buf)?;
            written += varint::encode(new_cid.retire_prior_to, buf)?;
            buf.put_u8(new_cid.cid.len() as u8);
            buf.put_slice(new_cid.cid.as_bytes());
            buf.put_slice(&new_cid.reset_token);
            written += 1 + new_cid.cid.len() + 16;
        }
        Frame::RetireConnectionId(retire) => {
            written += varint::encode(retire.sequence_number, buf)?;
        }
        Frame::PathChallenge(challenge) => {
            buf.put_slice(&challenge.data);
            written += 8;
        }
        Frame::PathResponse(response) => {
            buf.put_slice(&response.data);
            written += 8;
        }
        Frame::ConnectionClose(close) => {
            written += varint::encode(close.error_code, buf)?;
            if !close.application {
                written += varint::encode(close.frame_type, buf)?;
            }
            written += varint::encode_prefixed(&close.reason, buf)?;
        }
    }
    Ok(written)
}

// ============================================================================
// Per-frame parsers
// ============================================================================

fn ensure(data: &[u8], needed: usize) -> Result<()> {
    if data.len() < needed {
        return Err(Error::Truncated {
            needed,
            available: data.len(),
        });
    }
    Ok(())
}

fn parse_ack(data: &[u8], has_ecn: bool) -> Result<(Frame, usize)> {
    let mut offset = 1;
    let (largest_acked, n) = varint::decode(&data[offset..])?;
    offset += n;
    let (ack_delay, n) = varint::decode(&data[offset..])?;
    offset += n;
    let (range_count, n) = varint::decode(&data[offset..])?;
    offset += n;
    let (first_range, n) = varint::decode(&data[offset..])?;
    offset += n;

    let mut ranges: TinyVec<[AckRange; 8]> = TinyVec::new();
    for _ in 0..range_count {
        let (gap, n) = varint::decode(&data[offset..])?;
        offset += n;
        let (length, n) = varint::decode(&data[offset..])?;
        offset += n;
        ranges.push(AckRange { gap, length });
    }

    let ecn = if has_ecn {
        let (ect0, n) = varint::decode(&data[offset..])?;
        offset += n;
        let (ect1, n) = varint::decode(&data[offset..])?;
        offset += n;
        let (ce, n) = varint::decode(&data[offset..])?;
        offset += n;
        Some(EcnCounts { ect0, ect1, ce })
    } else {
        None
    };

    Ok((
        Frame::Ack(AckFrame {
            largest_acked,
            ack_delay,
            first_range,
            ranges,
            ecn,
        }),
        offset,
    ))
}

fn parse_reset_stream(data: &[u8]) -> Result<(Frame, usize)> {
    let mut offset = 1;
    let (stream_id, n) = varint::decode(&data[offset..])?;
    offset += n;
    let (app_error_code, n) = varint::decode(&data[offset..])?;
    offset += n;
    let (final_size, n) = varint::decode(&data[offset..])?;
    offset += n;
    Ok((
        Frame::ResetStream(ResetStreamFrame {
            stream_id,
            app_error_code,
            final_size,
        }),
        offset,
    ))
}

fn parse_stop_sending(data: &[u8]) -> Result<(Frame, usize)> {
    let mut offset = 1;
    let (stream_id, n) = varint::decode(&data[offset..])?;
    offset += n;
    let (app_error_code, n) = varint::decode(&data[offset..])?;
    offset += n;
    Ok((
        Frame::StopSending(StopSendingFrame {
            stream_id,
            app_error_code,
        }),
        offset,
    ))
}

fn parse_crypto(data: &[u8]) -> Result<(Frame, usize)> {
    let mut offset = 1;
    let (crypto_offset, n) = varint::decode(&data[offset..])?;
    offset += n;
    let (length, n) = varint::decode(&data[offset..])?;
    offset += n;

    let remaining = (data.len() - offset) as u64;
    if remaining < length {
        return Err(Error::Truncated {
            needed: offset + length as usize,
            available: data.len(),
        });
    }
    let length = length as usize;
    let frame = CryptoFrame {
        offset: crypto_offset,
        data: Bytes::copy_from_slice(&data[offset..offset + length]),
    };
    Ok((Frame::Crypto(frame), offset + length))
}

fn parse_new_token(data: &[u8]) -> Result<(Frame, usize)> {
    let (token, consumed) = varint::decode_prefixed(&data[1..])?;
    if token.is_empty() {
        return Err(Error::Malformed("NEW_TOKEN carries an empty token"));
    }
    Ok((Frame::NewToken(NewTokenFrame { token }), 1 + consumed))
}

fn parse_stream(data: &[u8], tag: u8) -> Result<(Frame, usize)> {
    let mut offset = 1;
    let (stream_id, n) = varint::decode(&data[offset..])?;
    offset += n;

    let stream_offset = if tag & STREAM_OFF_BIT != 0 {
        let (value, n) = varint::decode(&data[offset..])?;
        offset += n;
        Some(value)
    } else {
        None
    };

    let explicit_len = tag & STREAM_LEN_BIT != 0;
    let (payload, consumed) = if explicit_len {
        let (length, n) = varint::decode(&data[offset..])?;
        offset += n;
        let remaining = (data.len() - offset) as u64;
        if remaining < length {
            return Err(Error::Truncated {
                needed: offset + length as usize,
                available: data.len(),
            });
        }
        let length = length as usize;
        (
            Bytes::copy_from_slice(&data[offset..offset + length]),
            offset + length,
        )
    } else {
        // Tail form: everything to the end of the payload is stream data.
        (Bytes::copy_from_slice(&data[offset..]), data.len())
    };

    Ok((
        Frame::Stream(StreamFrame {
            stream_id,
            offset: stream_offset,
            explicit_len,
            fin: tag & STREAM_FIN_BIT != 0,
            data: payload,
        }),
        consumed,
    ))
}

fn parse_max_data(data: &[u8]) -> Result<(Frame, usize)> {
    let (maximum, n) = varint::decode(&data[1..])?;
    Ok((Frame::MaxData(MaxDataFrame { maximum }), 1 + n))
}

fn parse_max_stream_data(data: &[u8]) -> Result<(Frame, usize)> {
    let mut offset = 1;
    let (stream_id, n) = varint::decode(&data[offset..])?;
    offset += n;
    let (maximum, n) = varint::decode(&data[offset..])?;
    offset += n;
    Ok((
        Frame::MaxStreamData(MaxStreamDataFrame { stream_id, maximum }),
        offset,
    ))
}

fn parse_max_streams(data: &[u8], bidirectional: bool) -> Result<(Frame, usize)> {
    let (maximum, n) = varint::decode(&data[1..])?;
    Ok((
        Frame::MaxStreams(MaxStreamsFrame {
            maximum,
            bidirectional,
        }),
        1 + n,
    ))
}

fn parse_data_blocked(data: &[u8]) -> Result<(Frame, usize)> {
    let (limit, n) = varint::decode(&data[1..])?;
    Ok((Frame::DataBlocked(DataBlockedFrame { limit }), 1 + n))
}

fn parse_stream_data_blocked(data: &[u8]) -> Result<(Frame, usize)> {
    let mut offset = 1;
    let (stream_id, n) = varint::decode(&data[offset..])?;
    offset += n;
    let (limit, n) = varint::decode(&data[offset..])?;
    offset += n;
    Ok((
        Frame::StreamDataBlocked(StreamDataBlockedFrame { stream_id, limit }),
        offset,
    ))
}

fn parse_streams_blocked(data: &[u8], bidirectional: bool) -> Result<(Frame, usize)> {
    let (limit, n) = varint::decode(&data[1..])?;
    Ok((
        Frame::StreamsBlocked(StreamsBlockedFrame {
            limit,
            bidirectional,
        }),
        1 + n,
    ))
}

fn parse_new_connection_id(data: &[u8]) -> Result<(Frame, usize)> {
    let mut offset = 1;
    let (sequence_number, n) = varint::decode(&data[offset..])?;
    offset += n;
    let (retire_prior_to, n) = varint::decode(&data[offset..])?;
    offset += n;

    ensure(data, offset + 1)?;
    let cid_len = data[offset] as usize;
    offset += 1;
    if cid_len == 0 {
        return Err(Error::Malformed(
            "NEW_CONNECTION_ID carries a zero-length connection ID",
        ));
    }
    ensure(data, offset + cid_len)?;
    let cid = ConnectionId::from_slice(&data[offset..offset + cid_len])?;
    offset += cid_len;

    ensure(data, offset + 16)?;
    let mut reset_token = [0u8; 16];
    reset_token.copy_from_slice(&data[offset..offset + 16]);
    offset += 16;

    Ok((
        Frame::NewConnectionId(NewConnectionIdFrame {
            sequence_number,
            retire_prior_to,
            cid,
            reset_token,
        }),
        offset,
    ))
}

fn parse_retire_connection_id(data: &[u8]) -> Result<(Frame, usize)> {
    let (sequence_number, n) = varint::decode(&data[1..])?;
    Ok((
        Frame::RetireConnectionId(RetireConnectionIdFrame { sequence_number }),
        1 + n,
    ))
}

fn parse_path_frame(data: &[u8], challenge: bool) -> Result<(Frame, usize)> {
    ensure(data, 9)?;
    let mut payload = [0u8; 8];
    payload.copy_from_slice(&data[1..9]);
    let frame = if challenge {
        Frame::PathChallenge(PathChallengeFrame { data: payload })
    } else {
        Frame::PathResponse(PathResponseFrame { data: payload })
    };
    Ok((frame, 9))
}

fn parse_connection_close(data: &[u8], application: bool) -> Result<(Frame, usize)> {
    let mut offset = 1;
    let (error_code, n) = varint::decode(&data[offset..])?;
    offset += n;

    let frame_type = if application {
        0
    } else {
        let (value, n) = varint::decode(&data[offset..])?;
        offset += n;
        value
    };

    let (reason, n) = varint::decode_prefixed(&data[offset..])?;
    offset += n;

    Ok((
        Frame::ConnectionClose(ConnectionCloseFrame {
            error_code,
            frame_type,
            reason,
            application,
        }),
        offset,
    ))
}
