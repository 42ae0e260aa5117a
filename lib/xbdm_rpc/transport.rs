// Copyright 2025 The Pigweed Authors
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License. You may obtain a copy of
// the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under
// the License.

use std::io;
use std::time::Duration;

use futures::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;

/// Port the debug monitor listens on.
pub const DEFAULT_PORT: u16 = 730;

/// Largest chunk written by a single `setmem` command.
const SET_MEMORY_CHUNK: usize = 128;

/// Sends text commands and returns the monitor's reply.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Sends one command line and waits up to `timeout` for the reply.
    async fn send_command(&mut self, command: &str, timeout: Duration) -> io::Result<String>;
}

/// Direct access to target memory.
#[allow(async_fn_in_trait)]
pub trait RawMemory {
    async fn read_raw_bytes(&mut self, address: u32, length: u32) -> io::Result<Vec<u8>>;

    async fn write_raw_bytes(&mut self, address: u32, data: &[u8]) -> io::Result<()>;
}

/// A debug monitor connection over a line-oriented stream.
///
/// Replies are `NNN- text` status lines. A `202` status is followed by data
/// lines up to a lone `.`.
#[derive(Debug)]
pub struct LineTransport<S> {
    stream: BufReader<S>,
    timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin> LineTransport<S> {
    /// Creates a new `LineTransport` with the given stream.
    ///
    /// `timeout` applies to memory commands, which have no per-call timeout.
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            timeout,
        }
    }

    /// Consumes the `201- connected` greeting sent on connect.
    pub async fn read_banner(&mut self) -> io::Result<String> {
        let banner = self.read_line(self.timeout).await?;
        if status(&banner) != Some(201) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected greeting: {banner}"),
            ));
        }
        Ok(banner)
    }

    async fn write_command(&mut self, command: &str) -> io::Result<()> {
        trace!(command, "sending");
        self.stream.write_all(command.as_bytes()).await?;
        self.stream.write_all(b"\r\n").await?;
        self.stream.flush().await
    }

    async fn read_line(&mut self, timeout: Duration) -> io::Result<String> {
        let mut line = String::new();
        let bytes_read = tokio::time::timeout(timeout, self.stream.read_line(&mut line))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "timed out waiting for reply"))??;
        if bytes_read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Connection closed",
            ));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(line)
    }

    async fn read_multiline(&mut self, timeout: Duration) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line(timeout).await?;
            if line == "." {
                return Ok(lines);
            }
            lines.push(line);
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Transport for LineTransport<S> {
    async fn send_command(&mut self, command: &str, timeout: Duration) -> io::Result<String> {
        self.write_command(command).await?;
        let mut response = self.read_line(timeout).await?;
        if status(&response) == Some(202) {
            for line in self.read_multiline(timeout).await? {
                response.push('\n');
                response.push_str(&line);
            }
        }
        trace!(%response, "received");
        Ok(response)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> RawMemory for LineTransport<S> {
    async fn read_raw_bytes(&mut self, address: u32, length: u32) -> io::Result<Vec<u8>> {
        self.write_command(&format!("getmem addr=0x{address:X} length={length}"))
            .await?;
        let header = self.read_line(self.timeout).await?;
        if status(&header) != Some(202) {
            return Err(io::Error::other(header));
        }

        let mut data = Vec::with_capacity(length as usize);
        for line in self.read_multiline(self.timeout).await? {
            if line.contains("??") {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("memory at 0x{address:X} is not readable"),
                ));
            }
            let bytes = hex::decode(line.trim())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            data.extend_from_slice(&bytes);
        }

        if data.len() != length as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("requested {length} bytes, received {}", data.len()),
            ));
        }
        Ok(data)
    }

    async fn write_raw_bytes(&mut self, address: u32, data: &[u8]) -> io::Result<()> {
        let mut chunk_address = address;
        for chunk in data.chunks(SET_MEMORY_CHUNK) {
            self.write_command(&format!(
                "setmem addr=0x{chunk_address:X} data={}",
                hex::encode_upper(chunk)
            ))
            .await?;
            let reply = self.read_line(self.timeout).await?;
            if status(&reply) != Some(200) {
                return Err(io::Error::other(reply));
            }
            chunk_address = chunk_address.wrapping_add(chunk.len() as u32);
        }
        Ok(())
    }
}

fn status(line: &str) -> Option<u16> {
    line.get(..3)?.parse().ok()
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset | io::ErrorKind::TimedOut
    )
}

fn with_default_port(addr: &str) -> String {
    if addr.contains(':') {
        addr.to_string()
    } else {
        format!("{addr}:{DEFAULT_PORT}")
    }
}

/// Opens a TCP connection to the debug monitor at `addr`.
///
/// `addr` is `host` or `host:port`. Transient failures are retried
/// `config.connect_retries` times.
pub async fn connect(
    addr: &str,
    config: &ConnectionConfig,
) -> io::Result<LineTransport<Compat<TcpStream>>> {
    let addr = with_default_port(addr);

    let mut retry = 0;
    let stream = loop {
        let attempt = tokio::time::timeout(config.connect_timeout(), TcpStream::connect(&addr))
            .await
            .unwrap_or_else(|_| {
                Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))
            });
        match attempt {
            Ok(stream) => break stream,
            Err(e) if is_transient(&e) && retry < config.connect_retries => {
                retry += 1;
                warn!(%addr, error = %e, retry, "connect failed, retrying");
                tokio::time::sleep(config.connect_backoff()).await;
            }
            Err(e) => return Err(e),
        }
    };

    let mut transport = LineTransport::new(stream.compat(), config.command_timeout());
    let banner = transport.read_banner().await?;
    debug!(%addr, %banner, "connected");
    Ok(transport)
}

#[cfg(test)]
mod tests {
    use core::pin::Pin;
    use std::collections::VecDeque;

    use futures::task::{Context, Poll};

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(1);

    // Mock stream for testing
    struct MockStream {
        read_data: VecDeque<u8>,
        write_data: Vec<u8>,
    }

    impl MockStream {
        fn new(read_data: &[u8]) -> Self {
            Self {
                read_data: read_data.iter().copied().collect(),
                write_data: Vec::new(),
            }
        }
    }

    impl AsyncRead for MockStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut [u8],
        ) -> Poll<io::Result<usize>> {
            if self.read_data.is_empty() {
                return Poll::Ready(Ok(0));
            }
            let n = core::cmp::min(buf.len(), self.read_data.len());
            for item in buf.iter_mut().take(n) {
                *item = self.read_data.pop_front().unwrap();
            }
            Poll::Ready(Ok(n))
        }
    }

    impl AsyncWrite for MockStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.write_data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_send_command() {
        let mut stream = MockStream::new(b"200- 1A\r\n");
        let mut transport = LineTransport::new(&mut stream, TIMEOUT);

        let response = transport
            .send_command("consolefeatures buf_addr=0x1000", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(response, "200- 1A");
        assert_eq!(stream.write_data, b"consolefeatures buf_addr=0x1000\r\n");
    }

    #[tokio::test]
    async fn test_send_command_collects_multiline_reply() {
        let mut stream = MockStream::new(b"202- multiline response follows\r\nname=a\r\nname=b\r\n.\r\n");
        let mut transport = LineTransport::new(&mut stream, TIMEOUT);

        let response = transport.send_command("modules", TIMEOUT).await.unwrap();
        assert_eq!(response, "202- multiline response follows\nname=a\nname=b");
    }

    #[tokio::test]
    async fn test_send_command_reports_closed_connection() {
        let mut stream = MockStream::new(b"");
        let mut transport = LineTransport::new(&mut stream, TIMEOUT);

        let error = transport.send_command("dmversion", TIMEOUT).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_read_banner() {
        let mut stream = MockStream::new(b"201- connected\r\n");
        let mut transport = LineTransport::new(&mut stream, TIMEOUT);
        assert_eq!(transport.read_banner().await.unwrap(), "201- connected");

        let mut stream = MockStream::new(b"401- max number of connections exceeded\r\n");
        let mut transport = LineTransport::new(&mut stream, TIMEOUT);
        assert!(transport.read_banner().await.is_err());
    }

    #[tokio::test]
    async fn test_read_memory() {
        let mut stream = MockStream::new(b"202- memory data follows\r\nDECA\r\nFBAD\r\n.\r\n");
        let mut transport = LineTransport::new(&mut stream, TIMEOUT);

        let data = transport.read_raw_bytes(0x8200_1000, 4).await.unwrap();
        assert_eq!(data, [0xde, 0xca, 0xfb, 0xad]);
        assert_eq!(stream.write_data, b"getmem addr=0x82001000 length=4\r\n");
    }

    #[tokio::test]
    async fn test_read_memory_rejects_unreadable_bytes() {
        let mut stream = MockStream::new(b"202- memory data follows\r\nDE??\r\n.\r\n");
        let mut transport = LineTransport::new(&mut stream, TIMEOUT);

        let error = transport.read_raw_bytes(0x10, 2).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_read_memory_checks_length() {
        let mut stream = MockStream::new(b"202- memory data follows\r\nDE\r\n.\r\n");
        let mut transport = LineTransport::new(&mut stream, TIMEOUT);

        assert!(transport.read_raw_bytes(0x10, 2).await.is_err());
    }

    #[tokio::test]
    async fn test_write_memory_in_chunks() {
        let mut stream = MockStream::new(b"200- set 128 bytes\r\n200- set 2 bytes\r\n");
        let mut transport = LineTransport::new(&mut stream, TIMEOUT);

        let data = vec![0xabu8; SET_MEMORY_CHUNK + 2];
        transport.write_raw_bytes(0x1000, &data).await.unwrap();

        let written = String::from_utf8(stream.write_data.clone()).unwrap();
        let lines: Vec<&str> = written.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            format!("setmem addr=0x1000 data={}", "AB".repeat(SET_MEMORY_CHUNK))
        );
        assert_eq!(lines[1], "setmem addr=0x1080 data=ABAB");
    }

    #[tokio::test]
    async fn test_write_memory_reports_failure() {
        let mut stream = MockStream::new(b"404- not found\r\n");
        let mut transport = LineTransport::new(&mut stream, TIMEOUT);

        assert!(transport.write_raw_bytes(0x1000, &[1]).await.is_err());
    }

    async fn serve_greeting(greeting: &'static [u8]) -> String {
        use tokio::io::AsyncWriteExt as _;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(greeting).await.unwrap();
            // Hold the connection open until the client hangs up.
            let mut buf = [0u8; 64];
            let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await;
        });
        addr
    }

    fn fast_retries() -> ConnectionConfig {
        ConnectionConfig {
            connect_retries: 3,
            connect_backoff_ms: 1,
            ..ConnectionConfig::default()
        }
    }

    #[test]
    fn test_default_port() {
        assert_eq!(with_default_port("192.168.1.20"), "192.168.1.20:730");
        assert_eq!(with_default_port("192.168.1.20:731"), "192.168.1.20:731");
    }

    #[tokio::test]
    async fn test_connect_reads_banner() {
        let addr = serve_greeting(b"201- connected\r\n").await;
        let mut transport = connect(&addr, &fast_retries()).await.unwrap();
        transport.write_command("bye").await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_rejects_unexpected_greeting() {
        let addr = serve_greeting(b"401- max number of connections exceeded\r\n").await;
        let error = connect(&addr, &fast_retries()).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_retries() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let error = connect(&addr, &fast_retries()).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::ConnectionRefused);
    }
}
