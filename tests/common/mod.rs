//! Shared utilities for relay integration tests.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use tcp_relay::{RelayConfig, RelayError, RelayServer, RelaySummary, Shutdown};

/// Start a target that echoes every connection back to itself.
pub async fn start_echo_target() -> SocketAddr {
    start_programmable_target(|mut socket| async move {
        let (mut reader, mut writer) = socket.split();
        let _ = tokio::io::copy(&mut reader, &mut writer).await;
    })
    .await
}

/// Start a target that runs `f` for every accepted connection.
pub async fn start_programmable_target<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = std::sync::Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move { f(socket).await });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn unreachable_target() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Relay config pointing at `target`, with timeouts short enough for tests.
pub fn test_config(target: SocketAddr) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1".into();
    config.listener.bind_port = 0;
    config.target.address = target.ip().to_string();
    config.target.port = target.port();
    config.timeouts.accept_ms = 50;
    config.timeouts.wait_ms = 50;
    config.timeouts.connect_ms = 1_000;
    config.timeouts.send_ms = 2_000;
    config
}

pub struct RunningRelay {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<RelaySummary, RelayError>>,
}

/// Bind and run a relay in the background.
pub async fn start_relay(config: RelayConfig) -> RunningRelay {
    let shutdown = Shutdown::new();
    let server = RelayServer::new(config, shutdown.clone());
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(server.run(listener));

    RunningRelay {
        addr,
        shutdown,
        handle,
    }
}
