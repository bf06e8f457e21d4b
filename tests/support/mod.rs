//! Shared helpers for integration tests.
//!
//! `PacedServer` is a minimal HTTP/1.1 file server that streams a
//! deterministic body in paced chunks, so tests can pause, cancel, and
//! interrupt a transfer mid-stream. It honors `Range: bytes=N-` requests
//! with a 206 response and records every request it sees.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request the server observed.
#[derive(Debug, Clone)]
pub struct ObservedRequest {
    /// Offset of a `Range: bytes=N-` header, when one was sent.
    pub range_offset: Option<u64>,
}

/// Streaming test server serving a single deterministic resource.
pub struct PacedServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<ObservedRequest>>>,
}

impl PacedServer {
    /// Starts the server; the resource is `total` bytes served in `chunk`
    /// sized pieces with `delay` between pieces.
    pub async fn start(total: usize, chunk: usize, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let _ = serve_connection(socket, total, chunk, delay, &log).await;
                });
            }
        });

        Self { addr, requests }
    }

    /// URL of the served resource.
    pub fn url(&self) -> String {
        format!("http://{}/data.bin", self.addr)
    }

    /// Every request the server has observed so far.
    pub fn observed_requests(&self) -> Vec<ObservedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Whether any request carried a `Range: bytes=<offset>-` header.
    pub fn saw_range_offset(&self, offset: u64) -> bool {
        self.observed_requests()
            .iter()
            .any(|request| request.range_offset == Some(offset))
    }
}

/// Deterministic body content; position-dependent so corruption across a
/// resume boundary is detectable.
pub fn expected_body(total: usize) -> Vec<u8> {
    (0..total).map(|i| (i % 251) as u8).collect()
}

async fn serve_connection(
    mut socket: TcpStream,
    total: usize,
    chunk: usize,
    delay: Duration,
    log: &Mutex<Vec<ObservedRequest>>,
) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let read = socket.read(&mut byte).await?;
        if read == 0 || head.len() > 64 * 1024 {
            break;
        }
        head.push(byte[0]);
    }

    let head_text = String::from_utf8_lossy(&head);
    let range_offset = head_text.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if !name.trim().eq_ignore_ascii_case("range") {
            return None;
        }
        value
            .trim()
            .strip_prefix("bytes=")?
            .strip_suffix('-')?
            .parse::<u64>()
            .ok()
    });
    log.lock().unwrap().push(ObservedRequest { range_offset });

    let offset = usize::try_from(range_offset.unwrap_or(0)).unwrap_or(total).min(total);
    let remaining = total - offset;
    let header = if range_offset.is_some() {
        format!(
            "HTTP/1.1 206 Partial Content\r\n\
             Content-Type: application/octet-stream\r\n\
             Content-Length: {remaining}\r\n\
             Content-Range: bytes {offset}-{}/{total}\r\n\
             Connection: close\r\n\r\n",
            total.saturating_sub(1)
        )
    } else {
        format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: application/octet-stream\r\n\
             Content-Length: {remaining}\r\n\
             Connection: close\r\n\r\n"
        )
    };
    socket.write_all(header.as_bytes()).await?;

    let body = expected_body(total);
    let mut position = offset;
    while position < total {
        let end = (position + chunk).min(total);
        socket.write_all(&body[position..end]).await?;
        socket.flush().await?;
        position = end;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    socket.shutdown().await?;
    Ok(())
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
