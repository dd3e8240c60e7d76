//! UDP socket setup for the client driver.
//!
//! One connected socket per automaton run, built with socket2 for the
//! address family of the resolved remote and handed back as a standard
//! blocking [`UdpSocket`].

#![forbid(unsafe_code)]

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{Error, Result};

/// How often a blocked receive wakes up to check the stop flag.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Open a UDP socket connected to `remote`.
///
/// The kernel assigns the local address; the read timeout is set to
/// [`STOP_POLL_INTERVAL`] so the driver's receive loop can observe a stop
/// request without an unblocking primitive.
///
/// # Errors
///
/// [`Error::Connect`] carrying the remote address for any failure while
/// creating, configuring, or connecting the socket. Fatal to the run.
pub fn connect_udp(remote: SocketAddr) -> Result<UdpSocket> {
    let connect_err = |source| Error::Connect {
        addr: remote,
        source,
    };

    let domain = match remote {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP)).map_err(connect_err)?;
    socket.connect(&remote.into()).map_err(connect_err)?;
    socket
        .set_read_timeout(Some(STOP_POLL_INTERVAL))
        .map_err(connect_err)?;
    Ok(socket.into())
}
