//! Connection-wide shared state.
//!
//! Packets do not stand alone: whether a payload can be dissected into
//! frames, and which destination connection ID a short header carries,
//! depend on per-connection state negotiated outside the codec layer. That
//! state lives in a [`ConnectionContext`]; the connection owns the
//! canonical copy and hands non-owning [`ConnectionHandle`] clones to every
//! packet it constructs or dissects.
//!
//! Writes come from a single place (the driver or the TLS collaborator),
//! reads from anywhere, so the decrypted gate is an atomic and the
//! negotiated fields sit behind a read/write lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;

use crate::error::{Error, Result};

/// Longest connection ID QUIC version 1 permits (RFC 9000 Section 17.2).
pub const MAX_CID_LEN: usize = 20;

/// A connection ID: 0 to 20 opaque bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConnectionId(Bytes);

impl ConnectionId {
    /// The zero-length connection ID.
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Build a connection ID from raw bytes.
    ///
    /// # Errors
    ///
    /// [`Error::CidTooLong`] above [`MAX_CID_LEN`] bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.len() > MAX_CID_LEN {
            return Err(Error::CidTooLong(data.len()));
        }
        Ok(Self(Bytes::copy_from_slice(data)))
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the zero-length ID.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw ID bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(empty)");
        }
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Fields settled during connection establishment.
#[derive(Debug, Clone, Default)]
struct Negotiated {
    version: u32,
    dcid: ConnectionId,
    scid: ConnectionId,
}

/// Shared per-connection state consulted by the packet and frame layers.
///
/// `decrypted` gates payload dissection: while it is false, packet
/// payloads stay opaque byte blobs and packet numbers render with an
/// `(encrypted)` qualifier. The TLS collaborator flips it once keys are
/// available. `version` is the negotiated protocol version (0 until
/// negotiation), and the connection IDs are the pair the endpoints settled
/// on; the destination ID's length is what lets a short header be
/// dissected at all.
#[derive(Debug, Default)]
pub struct ConnectionContext {
    decrypted: AtomicBool,
    negotiated: RwLock<Negotiated>,
}

/// Non-owning handle to a connection's shared context.
///
/// Cloning is cheap; all clones observe the same state.
pub type ConnectionHandle = Arc<ConnectionContext>;

impl ConnectionContext {
    /// Fresh context: not decrypted, version 0, empty connection IDs.
    pub fn new() -> ConnectionHandle {
        Arc::new(Self::default())
    }

    /// Whether payloads of this connection can be dissected into frames.
    pub fn is_decrypted(&self) -> bool {
        self.decrypted.load(Ordering::Acquire)
    }

    /// Flip the dissection gate.
    pub fn set_decrypted(&self, decrypted: bool) {
        self.decrypted.store(decrypted, Ordering::Release);
    }

    /// Negotiated protocol version, 0 before negotiation.
    pub fn version(&self) -> u32 {
        self.read().version
    }

    /// Record the negotiated protocol version.
    pub fn set_version(&self, version: u32) {
        self.write().version = version;
    }

    /// The destination connection ID this endpoint sends with.
    pub fn dcid(&self) -> ConnectionId {
        self.read().dcid.clone()
    }

    /// Record the destination connection ID.
    pub fn set_dcid(&self, dcid: ConnectionId) {
        self.write().dcid = dcid;
    }

    /// The source connection ID this endpoint advertises.
    pub fn scid(&self) -> ConnectionId {
        self.read().scid.clone()
    }

    /// Record the source connection ID.
    pub fn set_scid(&self, scid: ConnectionId) {
        self.write().scid = scid;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Negotiated> {
        self.negotiated
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Negotiated> {
        self.negotiated
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_defaults() {
        let ctx = ConnectionContext::new();
        assert!(!ctx.is_decrypted());
        assert_eq!(ctx.version(), 0);
        assert!(ctx.dcid().is_empty());
        assert!(ctx.scid().is_empty());
    }

    #[test]
    fn handle_clones_share_state() {
        let ctx = ConnectionContext::new();
        let other = ctx.clone();

        ctx.set_decrypted(true);
        ctx.set_version(1);
        ctx.set_dcid(ConnectionId::from_slice(&[0xab, 0xcd]).unwrap());

        assert!(other.is_decrypted());
        assert_eq!(other.version(), 1);
        assert_eq!(other.dcid().as_bytes(), [0xab, 0xcd]);
    }

    #[test]
    fn cid_length_cap() {
        assert!(ConnectionId::from_slice(&[0u8; 20]).is_ok());
        assert!(matches!(
            ConnectionId::from_slice(&[0u8; 21]),
            Err(Error::CidTooLong(21))
        ));
    }

    #[test]
    fn cid_display_is_hex() {
        let cid = ConnectionId::from_slice(&[0x00, 0x1f, 0xa0]).unwrap();
        assert_eq!(cid.to_string(), "001fa0");
        assert_eq!(ConnectionId::empty().to_string(), "(empty)");
    }
}
