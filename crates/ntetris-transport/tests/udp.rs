//! Integration tests for the UDP transport.
//!
//! These tests bind a real loopback socket playing the server and check
//! that datagrams actually flow in both directions.

use std::time::Duration;

use ntetris_transport::{MAX_DATAGRAM, Transport, TransportError, UdpTransport};
use tokio::net::UdpSocket;

/// Helper: binds a fake server on an OS-assigned loopback port.
async fn fake_server() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("server should bind")
}

#[tokio::test]
async fn test_udp_connect_binds_ephemeral_port() {
    let server = fake_server().await;
    let port = server.local_addr().unwrap().port();

    let transport = UdpTransport::connect("127.0.0.1", port)
        .await
        .expect("should connect");

    let local = transport.local_addr().unwrap();
    assert_ne!(local.port(), 0);
    assert_ne!(local.port(), port);
    assert_eq!(transport.remote_addr(), server.local_addr().unwrap());
}

#[tokio::test]
async fn test_udp_send_and_receive() {
    let server = fake_server().await;
    let port = server.local_addr().unwrap().port();
    let transport = UdpTransport::connect("127.0.0.1", port).await.unwrap();

    // --- Client sends, server receives ---
    transport.send(&[1, 1, 3, b'B', b'o', b'b']).await.unwrap();
    let mut buf = [0u8; 64];
    let (n, from) = tokio::time::timeout(
        Duration::from_secs(2),
        server.recv_from(&mut buf),
    )
    .await
    .expect("server should receive in time")
    .unwrap();
    assert_eq!(&buf[..n], &[1, 1, 3, b'B', b'o', b'b']);
    assert_eq!(from, transport.local_addr().unwrap());

    // --- Server replies, client receives ---
    server.send_to(&[1, 12, 0, 0, 0, 7], from).await.unwrap();
    let received = tokio::time::timeout(Duration::from_secs(2), transport.recv())
        .await
        .expect("client should receive in time")
        .unwrap();
    assert_eq!(received, vec![1, 12, 0, 0, 0, 7]);
}

#[tokio::test]
async fn test_udp_receive_passes_large_datagram_unchanged() {
    let server = fake_server().await;
    let port = server.local_addr().unwrap().port();
    let transport = UdpTransport::connect("127.0.0.1", port).await.unwrap();

    let big = vec![0xAB; 4096];
    server
        .send_to(&big, transport.local_addr().unwrap())
        .await
        .unwrap();
    let received = tokio::time::timeout(Duration::from_secs(2), transport.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.len(), 4096);
}

#[tokio::test]
async fn test_udp_send_after_close_is_shutdown() {
    let server = fake_server().await;
    let port = server.local_addr().unwrap().port();
    let transport = UdpTransport::connect("127.0.0.1", port).await.unwrap();

    transport.close().await.unwrap();

    assert!(matches!(
        transport.send(b"late").await,
        Err(TransportError::Shutdown)
    ));
    assert!(matches!(
        transport.recv().await,
        Err(TransportError::Shutdown)
    ));
}

#[tokio::test]
async fn test_udp_receive_returns_only_received_bytes() {
    let server = fake_server().await;
    let port = server.local_addr().unwrap().port();
    let transport = UdpTransport::connect("127.0.0.1", port).await.unwrap();
    let client = transport.local_addr().unwrap();

    for payload in [&[1u8, 13, 0, 0, 0, 7][..], &[1, 11, 6][..]] {
        server.send_to(payload, client).await.unwrap();
        let received = tokio::time::timeout(Duration::from_secs(2), transport.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, payload);
        // Queued datagrams must not pin a whole receive buffer each.
        assert!(received.capacity() < MAX_DATAGRAM);
    }
}

#[tokio::test]
async fn test_udp_refused_datagrams_are_tolerated() {
    // Grab a free port, then close it so nothing listens there.
    let port = fake_server().await.local_addr().unwrap().port();
    let transport = UdpTransport::connect("127.0.0.1", port).await.unwrap();

    for _ in 0..3 {
        transport.send(&[1, 13, 0, 0, 0, 7]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // The pending refusal is swallowed and recv keeps waiting.
    let waited = tokio::time::timeout(Duration::from_millis(200), transport.recv()).await;
    assert!(waited.is_err(), "recv should still be waiting, got {waited:?}");
}
