//! Per-endpoint connection state machine.
//!
//! A `Connection` is either disconnected or holds a live stream to its
//! endpoint. Connecting is lazy: the drain loop dials on demand, bounded
//! by a timeout, and failed attempts are paced by [`RECONNECT_DELAY`] so
//! a refused endpoint is not hammered. Outbound frames are queued and
//! flushed with non-blocking writes; inbound bytes are reassembled into
//! frames through a [`FrameBuffer`].
//!
//! Errors never escape to the caller here: a failed read or write resets
//! the connection (the outbound queue survives, minus any partially
//! written frame, which cannot be resumed on a new stream) and the
//! requests in flight ride out their deadlines.

use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::{debug, warn};

use super::Endpoint;
use crate::protocol::{Frame, FrameBuffer};

/// Delay before a failed endpoint is dialed again.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(100);

/// Bytes pulled from the socket per `try_read` call.
const READ_CHUNK: usize = 16 * 1024;

/// A connected stream to either address family.
enum PeerStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Ipc(UnixStream),
}

impl PeerStream {
    async fn connect(endpoint: &Endpoint) -> io::Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => Ok(Self::Tcp(TcpStream::connect(addr.as_str()).await?)),
            #[cfg(unix)]
            Endpoint::Ipc(path) => Ok(Self::Ipc(UnixStream::connect(path).await?)),
        }
    }

    async fn readable(&self) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.readable().await,
            #[cfg(unix)]
            Self::Ipc(s) => s.readable().await,
        }
    }

    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.try_read(buf),
            #[cfg(unix)]
            Self::Ipc(s) => s.try_read(buf),
        }
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.try_write(buf),
            #[cfg(unix)]
            Self::Ipc(s) => s.try_write(buf),
        }
    }
}

/// One configured endpoint with its stream, queues and pacing state.
pub(crate) struct Connection {
    endpoint: Endpoint,
    max_payload_size: u32,
    stream: Option<PeerStream>,
    /// Reassembly buffer for inbound bytes.
    rx: FrameBuffer,
    /// Encoded frames waiting to be written.
    tx: VecDeque<Bytes>,
    /// Bytes of the front frame already written.
    front_offset: usize,
    /// Earliest time the next dial may happen.
    next_attempt: Instant,
}

impl Connection {
    pub fn new(endpoint: Endpoint, max_payload_size: u32) -> Self {
        Self {
            endpoint,
            max_payload_size,
            stream: None,
            rx: FrameBuffer::with_max_payload(max_payload_size),
            tx: VecDeque::new(),
            front_offset: 0,
            next_attempt: Instant::now(),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether any outbound frames are waiting.
    pub fn has_queued(&self) -> bool {
        !self.tx.is_empty()
    }

    /// Earliest time the next dial may happen (meaningful while
    /// disconnected).
    pub fn next_attempt(&self) -> Instant {
        self.next_attempt
    }

    /// Queue an encoded frame for sending.
    pub fn queue(&mut self, frame: Bytes) {
        self.tx.push_back(frame);
    }

    /// Dial the endpoint if disconnected, pacing permitting.
    ///
    /// Failures are logged and deferred: the next attempt is allowed
    /// after [`RECONNECT_DELAY`].
    pub async fn ensure_connected(&mut self, timeout: Duration) {
        if self.stream.is_some() {
            return;
        }
        if Instant::now() < self.next_attempt {
            return;
        }

        match tokio::time::timeout(timeout, PeerStream::connect(&self.endpoint)).await {
            Ok(Ok(stream)) => {
                debug!(endpoint = %self.endpoint, "connected");
                self.stream = Some(stream);
                self.rx = FrameBuffer::with_max_payload(self.max_payload_size);
            }
            Ok(Err(e)) => {
                debug!(endpoint = %self.endpoint, error = %e, "connect failed");
                self.next_attempt = Instant::now() + RECONNECT_DELAY;
            }
            Err(_) => {
                debug!(endpoint = %self.endpoint, "connect attempt timed out");
                self.next_attempt = Instant::now() + RECONNECT_DELAY;
            }
        }
    }

    /// Write queued frames until the queue drains or the socket stops
    /// accepting bytes. Never blocks.
    pub fn flush(&mut self) {
        loop {
            let Some(stream) = self.stream.as_ref() else {
                return;
            };
            let Some(front) = self.tx.front() else {
                return;
            };
            let frame_len = front.len();

            match stream.try_write(&front[self.front_offset..]) {
                Ok(0) => {
                    debug!(endpoint = %self.endpoint, "peer stopped accepting writes");
                    self.reset();
                    return;
                }
                Ok(n) => {
                    self.front_offset += n;
                    if self.front_offset == frame_len {
                        self.tx.pop_front();
                        self.front_offset = 0;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(endpoint = %self.endpoint, error = %e, "write failed, dropping connection");
                    self.reset();
                    return;
                }
            }
        }
    }

    /// Pull everything currently readable and return the complete frames.
    /// Never blocks.
    pub fn recv(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut buf = [0u8; READ_CHUNK];

        loop {
            let Some(stream) = self.stream.as_ref() else {
                break;
            };
            match stream.try_read(&mut buf) {
                Ok(0) => {
                    debug!(endpoint = %self.endpoint, "peer closed connection");
                    self.reset();
                    break;
                }
                Ok(n) => match self.rx.push(&buf[..n]) {
                    Ok(mut complete) => frames.append(&mut complete),
                    Err(e) => {
                        warn!(endpoint = %self.endpoint, error = %e, "protocol violation, dropping connection");
                        self.reset();
                        break;
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(endpoint = %self.endpoint, error = %e, "read failed, dropping connection");
                    self.reset();
                    break;
                }
            }
        }

        frames
    }

    /// Wait until the stream has readable data. Pends forever while
    /// disconnected, so it composes with a select over many connections.
    pub async fn readable(&self) -> io::Result<()> {
        match self.stream.as_ref() {
            Some(stream) => stream.readable().await,
            None => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    fn reset(&mut self) {
        self.stream = None;
        self.rx = FrameBuffer::with_max_payload(self.max_payload_size);
        if self.front_offset > 0 {
            // A partially written frame cannot be resumed on a new stream.
            self.tx.pop_front();
            self.front_offset = 0;
        }
        self.next_attempt = Instant::now() + RECONNECT_DELAY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, status, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
    use std::io::{Read, Write};

    fn tcp_connection(addr: std::net::SocketAddr) -> Connection {
        let endpoint = format!("tcp://{addr}").parse().unwrap();
        Connection::new(endpoint, DEFAULT_MAX_PAYLOAD_SIZE)
    }

    #[test]
    fn test_queue_accounting() {
        let endpoint = "tcp://127.0.0.1:1".parse().unwrap();
        let mut conn = Connection::new(endpoint, DEFAULT_MAX_PAYLOAD_SIZE);

        assert!(!conn.is_connected());
        assert!(!conn.has_queued());

        conn.queue(Bytes::from_static(b"frame"));
        assert!(conn.has_queued());
    }

    #[tokio::test]
    async fn test_connect_failure_sets_backoff() {
        // Grab a port with no listener behind it
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut conn = tcp_connection(addr);
        let before = Instant::now();
        conn.ensure_connected(Duration::from_millis(500)).await;

        assert!(!conn.is_connected());
        assert!(conn.next_attempt() >= before + RECONNECT_DELAY);

        // The very next call is a no-op while the backoff holds
        conn.ensure_connected(Duration::from_millis(500)).await;
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_flush_and_recv_roundtrip() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = [0u8; HEADER_SIZE];
            stream.read_exact(&mut head).unwrap();
            let header = Header::decode(&head).unwrap();
            let mut payload = vec![0u8; header.payload_length as usize];
            stream.read_exact(&mut payload).unwrap();

            let reply = build_frame(
                &Header::reply(header.correlation_id, status::OK, payload.len() as u32),
                &payload,
            );
            stream.write_all(&reply).unwrap();
        });

        let mut conn = tcp_connection(addr);
        conn.ensure_connected(Duration::from_secs(1)).await;
        assert!(conn.is_connected());

        // 0xA1 'a' is the msgpack string "a"
        let request = build_frame(&Header::request(9, 2), b"\xa1a");
        conn.queue(Bytes::from(request));
        conn.flush();
        assert!(!conn.has_queued());

        let frames = loop {
            conn.readable().await.unwrap();
            let frames = conn.recv();
            if !frames.is_empty() {
                break frames;
            }
        };

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].correlation_id(), 9);
        assert_eq!(frames[0].status(), status::OK);
        assert!(frames[0].is_reply());

        server.join().unwrap();
    }

    #[tokio::test]
    async fn test_peer_close_resets_connection() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut conn = tcp_connection(addr);
        conn.ensure_connected(Duration::from_secs(1)).await;
        assert!(conn.is_connected());
        server.join().unwrap();

        // Once the peer has hung up, recv observes EOF and disconnects
        conn.readable().await.unwrap();
        let frames = conn.recv();
        assert!(frames.is_empty());
        assert!(!conn.is_connected());
    }
}
