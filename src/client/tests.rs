//! Loopback integration tests for the client driver.
//!
//! Real UDP sockets on ephemeral loopback ports; the "server" is a plain
//! socket on a helper thread.

use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

use bytes::Bytes;

use super::*;
use crate::connection::ConnectionContext;
use crate::frames::Frame;
use crate::packet::{parse_packet, Packet};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("quicwire=debug")
        .try_init();
}

fn loopback_config(port: u16) -> ClientConfig {
    ClientConfig {
        server: "127.0.0.1".to_string(),
        port,
        ..ClientConfig::default()
    }
}

#[test]
fn handshake_reaches_the_waiting_state() {
    init_tracing();

    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = server.local_addr().unwrap().port();

    let server_thread = thread::spawn(move || {
        let mut buf = [0u8; 2048];
        let (len, peer) = server.recv_from(&mut buf).unwrap();

        // The client's flight parses as an Initial carrying our CRYPTO
        // bytes once the context admits dissection.
        let ctx = ConnectionContext::new();
        ctx.set_decrypted(true);
        let (packet, consumed) = parse_packet(&ctx, &buf[..len]).unwrap();
        assert_eq!(consumed, len);
        let Packet::Initial(initial) = packet else {
            panic!("expected an Initial flight, got {packet}");
        };
        assert_eq!(initial.packet_number, 0);
        let frames = initial.payload.frames().unwrap();
        assert!(matches!(
            &frames[0],
            Frame::Crypto(crypto) if crypto.data.as_ref() == b"client hello"
        ));

        server.send_to(b"server flight", peer).unwrap();
    });

    let mut config = loopback_config(port);
    config.crypto_payload = Bytes::from_static(b"client hello");
    let mut client = QuicClient::new(config).unwrap();

    let reply = client.run().unwrap();
    assert_eq!(reply.as_deref(), Some(&b"server flight"[..]));
    assert_eq!(client.state(), ClientState::WaitingServerHandshake);

    let local = client.local_addr().expect("bound after CONNECT");
    assert_ne!(local.port(), 0);

    server_thread.join().unwrap();
}

#[test]
fn bare_initial_when_no_crypto_payload_is_configured() {
    init_tracing();

    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = server.local_addr().unwrap().port();

    let server_thread = thread::spawn(move || {
        let mut buf = [0u8; 2048];
        let (len, peer) = server.recv_from(&mut buf).unwrap();

        let ctx = ConnectionContext::new();
        ctx.set_decrypted(true);
        let (packet, _) = parse_packet(&ctx, &buf[..len]).unwrap();
        let Packet::Initial(initial) = packet else {
            panic!("expected an Initial flight");
        };
        assert!(initial.payload.is_empty());

        server.send_to(b"ok", peer).unwrap();
    });

    let mut client = QuicClient::new(loopback_config(port)).unwrap();
    let reply = client.run().unwrap();
    assert_eq!(reply.as_deref(), Some(&b"ok"[..]));

    server_thread.join().unwrap();
}

#[test]
fn stop_unblocks_the_pending_receive() {
    init_tracing();

    // A server that receives and never answers keeps the client blocked
    // in the waiting state.
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = server.local_addr().unwrap().port();

    let mut client = QuicClient::new(loopback_config(port)).unwrap();
    let stop = client.stop_handle();

    let client_thread = thread::spawn(move || {
        let outcome = client.run();
        (outcome, client)
    });

    thread::sleep(Duration::from_millis(150));
    stop.stop();

    let (outcome, client) = client_thread.join().unwrap();
    assert!(matches!(outcome, Ok(None)));
    assert_eq!(client.state(), ClientState::Stopped);
}

#[test]
fn unresolvable_server_fails_at_construction() {
    let config = ClientConfig {
        server: "host.that.does.not.resolve.invalid".to_string(),
        ..ClientConfig::default()
    };
    assert!(QuicClient::new(config).is_err());
}

#[test]
fn context_is_seeded_during_the_run() {
    init_tracing();

    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = server.local_addr().unwrap().port();

    let server_thread = thread::spawn(move || {
        let mut buf = [0u8; 2048];
        let (_, peer) = server.recv_from(&mut buf).unwrap();
        server.send_to(b"ok", peer).unwrap();
    });

    let mut config = loopback_config(port);
    config.dcid = ConnectionId::from_slice(&[0xde, 0xad]).unwrap();
    config.scid = ConnectionId::from_slice(&[0xbe, 0xef]).unwrap();

    let mut client = QuicClient::new(config).unwrap();
    client.run().unwrap();

    let ctx = client.context();
    assert_eq!(ctx.version(), crate::packet::VERSION_1);
    assert_eq!(ctx.dcid().as_bytes(), [0xde, 0xad]);
    assert_eq!(ctx.scid().as_bytes(), [0xbe, 0xef]);
    assert!(!ctx.is_decrypted());

    server_thread.join().unwrap();
}
