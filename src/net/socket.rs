//! Duplex socket handle shared by the two workers of a connection.
//!
//! # Responsibilities
//! - Bounded wait for read readiness
//! - Short, non-blocking receive
//! - Send of a whole block under a hard deadline
//! - Full close of a socket another task may still hold
//!
//! # Design Decisions
//! - Tokio sockets are always non-blocking; readiness + `try_*` calls mirror
//!   the wait/recv/send cycle directly
//! - One `Arc<TcpStream>` per socket: the reading worker and the writing
//!   worker each hold a clone, and the fd is released with the last clone
//! - Closing is `shutdown(Both)` through `socket2`, which the holder of the
//!   other clone observes as EOF on read and EPIPE on write

use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use socket2::SockRef;
use tokio::net::TcpStream;

/// Result of a bounded readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct DuplexSocket {
    stream: Arc<TcpStream>,
    peer: SocketAddr,
}

impl DuplexSocket {
    /// Wrap a connected stream, disabling Nagle's algorithm on it.
    ///
    /// `peer` is whatever accept or connect already reported; the socket is
    /// not queried again, since a peer that has already reset the
    /// connection makes `getpeername` fail.
    pub fn new(stream: TcpStream, peer: SocketAddr) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: Arc::new(stream),
            peer,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Wait up to `timeout` for the socket to become readable.
    pub async fn wait_readable(&self, timeout: Duration) -> io::Result<Readiness> {
        match tokio::time::timeout(timeout, self.stream.readable()).await {
            Ok(Ok(())) => Ok(Readiness::Ready),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(Readiness::TimedOut),
        }
    }

    /// Read whatever is available, up to `buf.len()` bytes.
    ///
    /// `Ok(None)` means the readiness was spurious. `Ok(Some(0))` is EOF.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.stream.try_read(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Transmit all of `data` or fail. The whole block must go out within
    /// `timeout`, otherwise the error kind is `TimedOut`.
    pub async fn send_all(&self, data: &[u8], timeout: Duration) -> io::Result<()> {
        let send = async {
            let mut sent = 0;
            while sent < data.len() {
                self.stream.writable().await?;
                match self.stream.try_write(&data[sent..]) {
                    Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                    Ok(n) => sent += n,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
            Ok::<(), io::Error>(())
        };

        match tokio::time::timeout(timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("send of {} bytes to {} timed out after {:?}", data.len(), self.peer, timeout),
            )),
        }
    }

    /// Shut down both directions of the socket.
    ///
    /// The descriptor itself stays open until every clone is dropped, so a
    /// sibling task never races against fd reuse.
    pub fn close(&self) {
        let sock = SockRef::from(&*self.stream);
        if let Err(e) = sock.shutdown(Shutdown::Both) {
            // Peer may have reset the connection already.
            if e.kind() != io::ErrorKind::NotConnected {
                tracing::debug!(peer_addr = %self.peer, error = %e, "Socket shutdown failed");
            }
        }
    }
}

/// Closes the wrapped socket when dropped.
///
/// A transfer worker holds its source socket through this guard, which is
/// what makes "each worker closes only the socket it reads from" hold on
/// every exit path, panics included.
#[derive(Debug)]
pub struct CloseOnDrop(DuplexSocket);

impl CloseOnDrop {
    pub fn new(socket: DuplexSocket) -> Self {
        Self(socket)
    }
}

impl std::ops::Deref for CloseOnDrop {
    type Target = DuplexSocket;

    fn deref(&self) -> &DuplexSocket {
        &self.0
    }
}

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn pair() -> (DuplexSocket, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (stream, peer) = accepted.unwrap();
        let socket = DuplexSocket::new(stream, peer).unwrap();
        (socket, client.unwrap())
    }

    #[tokio::test]
    async fn wait_times_out_without_data() {
        let (socket, _client) = pair().await;
        let readiness = socket.wait_readable(Duration::from_millis(20)).await.unwrap();
        assert_eq!(readiness, Readiness::TimedOut);
    }

    #[tokio::test]
    async fn recv_reads_available_bytes_then_eof() {
        let (socket, mut client) = pair().await;
        client.write_all(b"hello").await.unwrap();
        client.shutdown().await.unwrap();

        let mut buf = [0u8; 64];
        let mut received = Vec::new();
        loop {
            assert_eq!(socket.wait_readable(Duration::from_secs(1)).await.unwrap(), Readiness::Ready);
            match socket.recv(&mut buf).unwrap() {
                Some(0) => break,
                Some(n) => received.extend_from_slice(&buf[..n]),
                None => continue,
            }
        }
        assert_eq!(received, b"hello");
    }

    #[tokio::test]
    async fn send_all_delivers_everything() {
        let (socket, mut client) = pair().await;
        let payload = vec![0xA5u8; 256 * 1024];

        let reader = tokio::spawn(async move {
            let mut got = vec![0u8; 256 * 1024];
            client.read_exact(&mut got).await.unwrap();
            got
        });

        socket.send_all(&payload, Duration::from_secs(5)).await.unwrap();
        assert_eq!(reader.await.unwrap(), payload);
    }

    #[tokio::test]
    async fn send_all_times_out_when_peer_stops_reading() {
        let (socket, _client) = pair().await;
        // Far more than the kernel will buffer for a peer that never reads.
        let payload = vec![0u8; 64 * 1024 * 1024];
        let err = socket
            .send_all(&payload, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn close_guard_shuts_down_shared_socket() {
        let (socket, mut client) = pair().await;
        let sibling = socket.clone();

        drop(CloseOnDrop::new(socket));

        // The peer sees EOF even though `sibling` still holds the stream.
        let mut buf = [0u8; 8];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);

        // And the sibling can no longer write through it.
        assert!(sibling.send_all(b"late", Duration::from_secs(1)).await.is_err());
    }
}
