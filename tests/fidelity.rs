//! Byte fidelity through the relay, in both directions.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(31) % 251) as u8).collect()
}

/// Write `data` through the relay and read the echo back concurrently.
async fn round_trip(relay: std::net::SocketAddr, data: Vec<u8>) -> Vec<u8> {
    let client = TcpStream::connect(relay).await.unwrap();
    let (mut reader, mut writer) = client.into_split();
    let len = data.len();

    let write = tokio::spawn(async move {
        writer.write_all(&data).await.unwrap();
        writer
    });

    let mut echoed = vec![0u8; len];
    tokio::time::timeout(Duration::from_secs(10), reader.read_exact(&mut echoed))
        .await
        .expect("echo timed out")
        .unwrap();
    let _writer = write.await.unwrap();
    echoed
}

#[tokio::test]
async fn echo_preserves_bytes_across_buffer_boundary() {
    let target = common::start_echo_target().await;
    let mut config = common::test_config(target);
    config.transfer.buffer_bytes = 16 * 1024;
    let buffer = config.transfer.buffer_bytes;
    let relay = common::start_relay(config).await;

    for size in [buffer - 1, buffer, buffer + 1, 3 * buffer + 7] {
        let sent = payload(size);
        let echoed = round_trip(relay.addr, sent.clone()).await;
        assert_eq!(echoed.len(), size);
        assert!(echoed == sent, "payload of {size} bytes was altered");
    }

    relay.shutdown.request();
    let summary = relay.handle.await.unwrap().unwrap();
    assert_eq!(summary.connections, 4);
    assert_eq!(summary.workers_reaped, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn echo_with_default_one_mebibyte_buffer() {
    let target = common::start_echo_target().await;
    let config = common::test_config(target);
    let buffer = config.transfer.buffer_bytes;
    assert_eq!(buffer, 1024 * 1024);
    let relay = common::start_relay(config).await;

    for size in [buffer - 1, buffer, buffer + 1] {
        let sent = payload(size);
        let echoed = round_trip(relay.addr, sent.clone()).await;
        assert!(echoed == sent, "payload of {size} bytes was altered");
    }

    relay.shutdown.request();
    relay.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn target_to_client_direction_is_exact() {
    let sent = payload(70_001);
    let expected = sent.clone();
    let target = common::start_programmable_target(move |mut socket| {
        let sent = sent.clone();
        async move {
            socket.write_all(&sent).await.unwrap();
            let _ = socket.shutdown().await;
        }
    })
    .await;

    let mut config = common::test_config(target);
    config.transfer.buffer_bytes = 4096;
    let relay = common::start_relay(config).await;

    let mut client = TcpStream::connect(relay.addr).await.unwrap();
    let mut received = vec![0u8; expected.len()];
    tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut received))
        .await
        .unwrap()
        .unwrap();
    assert!(received == expected);

    relay.shutdown.request();
    relay.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn client_to_target_direction_is_exact() {
    let sent = payload(50_000);
    let expected_len = sent.len();
    let (got_tx, mut got_rx) = tokio::sync::mpsc::unbounded_channel();

    let target = common::start_programmable_target(move |mut socket| {
        let got_tx = got_tx.clone();
        async move {
            let mut buf = vec![0u8; expected_len];
            socket.read_exact(&mut buf).await.unwrap();
            let _ = got_tx.send(buf);
        }
    })
    .await;

    let relay = common::start_relay(common::test_config(target)).await;

    let mut client = TcpStream::connect(relay.addr).await.unwrap();
    client.write_all(&sent).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), got_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(received == sent);

    relay.shutdown.request();
    relay.handle.await.unwrap().unwrap();
}
