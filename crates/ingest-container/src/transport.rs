// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal HTTP/1.1 client over a Unix domain socket.
//!
//! The container daemon's API is plain HTTP/1.1 on a Unix socket; there's no
//! TLS and no HTTP/2 to support, so a small hand-rolled client covers the
//! two request shapes the agent needs (buffered JSON GETs, and long-lived
//! chunked-streaming GETs) without pulling in a full HTTP stack that assumes
//! TCP. Connections used for buffered requests are pooled with keep-alive;
//! streaming connections are never pooled, since the whole point of the
//! rotation pattern (spec §4.1) is to open and fully close them on a
//! schedule.

use crate::error::ContainerError;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::Mutex;

/// A buffered, fully-read HTTP response.
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

struct IdleConn {
    stream: UnixStream,
    idle_since: Instant,
}

/// Shared transport to the daemon socket: a small pool of idle keep-alive
/// connections for one-shot requests, bounded by `max_idle` and expired
/// after `idle_timeout` (spec §4.1 "HTTP transport contract").
pub struct UnixHttpClient {
    socket_path: PathBuf,
    idle: Mutex<VecDeque<IdleConn>>,
    max_idle: usize,
    idle_timeout: Duration,
}

impl UnixHttpClient {
    pub fn new(socket_path: PathBuf, max_idle: usize, idle_timeout: Duration) -> Self {
        Self {
            socket_path,
            idle: Mutex::new(VecDeque::new()),
            max_idle,
            idle_timeout,
        }
    }

    async fn connect(&self) -> Result<UnixStream, ContainerError> {
        Ok(UnixStream::connect(&self.socket_path).await?)
    }

    async fn take_connection(&self) -> Result<UnixStream, ContainerError> {
        let mut idle = self.idle.lock().await;
        let now = Instant::now();
        while let Some(conn) = idle.pop_front() {
            if now.duration_since(conn.idle_since) < self.idle_timeout {
                return Ok(conn.stream);
            }
        }
        drop(idle);
        self.connect().await
    }

    async fn return_connection(&self, stream: UnixStream) {
        let mut idle = self.idle.lock().await;
        if idle.len() < self.max_idle {
            idle.push_back(IdleConn {
                stream,
                idle_since: Instant::now(),
            });
        }
    }

    /// Issue a buffered GET request, fully read the response body, and
    /// return the connection to the idle pool for reuse.
    pub async fn get(&self, path: &str) -> Result<HttpResponse, ContainerError> {
        let mut stream = self.take_connection().await?;
        write_request(&mut stream, path).await?;

        let mut reader = BufReader::new(&mut stream);
        let (status, headers) = read_status_and_headers(&mut reader).await?;
        let body = read_buffered_body(&mut reader, &headers).await?;

        if headers.keep_alive {
            self.return_connection(stream).await;
        }

        Ok(HttpResponse { status, body })
    }

    /// Open a dedicated, unpooled connection for a long-lived streaming GET
    /// (container log follow, event subscription).
    pub async fn get_stream(&self, path: &str) -> Result<ChunkedStream, ContainerError> {
        let mut stream = self.connect().await?;
        write_request(&mut stream, path).await?;

        let mut reader = BufReader::new(stream);
        let (status, headers) = read_status_and_headers(&mut reader).await?;
        if status != 200 {
            return Err(ContainerError::Http(status, format!("streaming request to {path} rejected")));
        }

        Ok(ChunkedStream {
            reader,
            pending: Vec::new(),
            chunk_remaining: 0,
            finished: false,
        })
    }
}

async fn write_request(stream: &mut UnixStream, path: &str) -> Result<(), ContainerError> {
    let request = format!(
        "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\nAccept: application/json\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await?;
    Ok(())
}

struct Headers {
    content_length: Option<usize>,
    chunked: bool,
    keep_alive: bool,
}

async fn read_status_and_headers<R>(reader: &mut BufReader<R>) -> Result<(u16, Headers), ContainerError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut status_line = String::new();
    reader.read_line(&mut status_line).await?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| ContainerError::Protocol(format!("malformed status line: {status_line:?}")))?;

    let mut content_length = None;
    let mut chunked = false;
    let mut keep_alive = true;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            match name.as_str() {
                "content-length" => content_length = value.parse().ok(),
                "transfer-encoding" => chunked = value.eq_ignore_ascii_case("chunked"),
                "connection" => keep_alive = !value.eq_ignore_ascii_case("close"),
                _ => {}
            }
        }
    }

    Ok((
        status,
        Headers {
            content_length,
            chunked,
            keep_alive,
        },
    ))
}

async fn read_buffered_body<R>(reader: &mut BufReader<R>, headers: &Headers) -> Result<Vec<u8>, ContainerError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    if headers.chunked {
        let mut body = Vec::new();
        loop {
            let mut size_line = String::new();
            reader.read_line(&mut size_line).await?;
            let size = usize::from_str_radix(size_line.trim().split(';').next().unwrap_or(""), 16)
                .map_err(|_| ContainerError::Protocol(format!("bad chunk size: {size_line:?}")))?;
            if size == 0 {
                let mut trailer = String::new();
                reader.read_line(&mut trailer).await?;
                break;
            }
            let mut chunk = vec![0u8; size];
            reader.read_exact(&mut chunk).await?;
            body.extend_from_slice(&chunk);
            let mut crlf = [0u8; 2];
            reader.read_exact(&mut crlf).await?;
        }
        return Ok(body);
    }

    let Some(len) = headers.content_length else {
        return Ok(Vec::new());
    };
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// A long-lived chunked-transfer-encoded response body, pulled through a
/// small byte buffer so callers can request arbitrary slice sizes (docker
/// log frames don't align to chunk boundaries).
pub struct ChunkedStream {
    reader: BufReader<UnixStream>,
    pending: Vec<u8>,
    chunk_remaining: usize,
    finished: bool,
}

impl ChunkedStream {
    async fn fill(&mut self, want: usize) -> Result<(), ContainerError> {
        while self.pending.len() < want && !self.finished {
            if self.chunk_remaining == 0 {
                let mut size_line = String::new();
                self.reader.read_line(&mut size_line).await?;
                if size_line.is_empty() {
                    self.finished = true;
                    break;
                }
                let size = usize::from_str_radix(size_line.trim().split(';').next().unwrap_or(""), 16)
                    .map_err(|_| ContainerError::Protocol(format!("bad chunk size: {size_line:?}")))?;
                if size == 0 {
                    self.finished = true;
                    let mut trailer = String::new();
                    let _ = self.reader.read_line(&mut trailer).await;
                    break;
                }
                self.chunk_remaining = size;
            }

            let mut buf = vec![0u8; self.chunk_remaining.min(8192)];
            let n = self.reader.read(&mut buf).await?;
            if n == 0 {
                self.finished = true;
                break;
            }
            self.pending.extend_from_slice(&buf[..n]);
            self.chunk_remaining -= n;
            if self.chunk_remaining == 0 {
                let mut crlf = [0u8; 2];
                self.reader.read_exact(&mut crlf).await?;
            }
        }
        Ok(())
    }

    /// Pull exactly `n` bytes out of the chunked body, or `None` if the
    /// stream ended first (container log following was cut short, or the
    /// daemon closed the connection).
    pub async fn read_exact(&mut self, n: usize) -> Result<Option<Vec<u8>>, ContainerError> {
        self.fill(n).await?;
        if self.pending.len() < n {
            return Ok(None);
        }
        Ok(Some(self.pending.drain(..n).collect()))
    }

    /// Pull one newline-delimited line out of the chunked body (used for the
    /// events subscription, which is JSON-lines rather than framed).
    pub async fn read_line(&mut self) -> Result<Option<String>, ContainerError> {
        let mut out = Vec::new();
        loop {
            match self.read_exact(1).await? {
                None => {
                    return if out.is_empty() {
                        Ok(None)
                    } else {
                        Ok(Some(String::from_utf8_lossy(&out).into_owned()))
                    };
                }
                Some(byte) => {
                    if byte[0] == b'\n' {
                        return Ok(Some(String::from_utf8_lossy(&out).into_owned()));
                    }
                    out.push(byte[0]);
                }
            }
        }
    }

    /// Explicitly tear down the underlying socket. Called on every rotation
    /// boundary so the daemon-side file descriptor is released deterministically
    /// rather than relying on drop timing (spec §4.1 transport contract).
    pub async fn close(mut self) {
        let _ = self.reader.get_mut().shutdown().await;
    }
}
