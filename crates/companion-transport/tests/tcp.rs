//! Integration tests for the TCP transport.
//!
//! These spin up a real listener on a random loopback port and talk to it
//! with a plain `TcpStream`, so framing is checked against actual socket
//! behavior rather than an in-memory pipe.

use std::time::Duration;

use companion_transport::{
    encode_frame, TcpTransport, Transport, TransportError, DEFAULT_MAX_FRAME_LEN,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn bind_random() -> TcpTransport {
    TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind")
}

#[tokio::test]
async fn test_accept_and_exchange_frames() {
    let mut transport = bind_random().await;
    let addr = transport.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let conn = transport.accept().await.expect("should accept");
        assert!(conn.id().into_inner() > 0);
        let (mut reader, mut writer) = conn.into_framed(DEFAULT_MAX_FRAME_LEN);

        let got = reader.read_frame().await.unwrap().unwrap();
        writer.write_frame(&got).await.unwrap();
        assert!(reader.read_frame().await.unwrap().is_none());
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(&encode_frame(b"ping").unwrap())
        .await
        .unwrap();

    let mut header = [0u8; 4];
    tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut header))
        .await
        .expect("timeout")
        .unwrap();
    assert_eq!(u32::from_be_bytes(header), 4);
    let mut body = [0u8; 4];
    client.read_exact(&mut body).await.unwrap();
    assert_eq!(&body, b"ping");

    drop(client);
    server.await.unwrap();
}

#[tokio::test]
async fn test_each_accept_gets_a_distinct_id() {
    let mut transport = bind_random().await;
    let addr = transport.local_addr().unwrap();

    let _a = TcpStream::connect(addr).await.unwrap();
    let _b = TcpStream::connect(addr).await.unwrap();

    let first = transport.accept().await.unwrap();
    let second = transport.accept().await.unwrap();
    assert_ne!(first.id(), second.id());
}

#[tokio::test]
async fn test_bind_conflict_reports_bind_error() {
    let transport = bind_random().await;
    let addr = transport.local_addr().unwrap().to_string();

    let err = match TcpTransport::bind(&addr).await {
        Ok(_) => panic!("second bind on {addr} should fail"),
        Err(e) => e,
    };
    assert!(matches!(err, TransportError::Bind { .. }));
    assert!(err.to_string().contains(&addr));
}
