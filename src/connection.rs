//! Buffered framing over a single TCP connection.
//!
//! A small struct wrapping a buffered stream around one growable
//! `BytesMut` scratch buffer. Reads are driven by an explicit `\r\n` scan
//! for command lines and an explicit byte count for data blocks — a
//! correct implementation must not assume one inbound chunk equals one
//! line or one command, since TCP makes no such guarantee.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

pub struct Connection {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Connection {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Reads one `\r\n`-terminated command line, buffering across reads and
    /// across multiple lines landing in a single chunk.
    ///
    /// Returns `Ok(None)` on a clean peer half-close with no partial data
    /// buffered.
    pub async fn read_line(&mut self) -> std::io::Result<Option<BytesMut>> {
        loop {
            if let Some(line) = Self::take_line(&mut self.buffer) {
                return Ok(Some(line));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection reset while reading a command line",
                    ))
                };
            }
        }
    }

    /// Reads up to `bytes + 2` bytes (the payload plus its trailing `\r\n`).
    ///
    /// Buffers across reads the same way [`Self::read_line`] does. If a
    /// `\r\n` terminator arrives before `bytes + 2` bytes have accumulated,
    /// the client sent a short data block and isn't going to send more on
    /// its own; returning as soon as that line completes avoids waiting
    /// forever for bytes that aren't coming. If the peer closes first
    /// instead, whatever was received is returned. Either way, the caller
    /// compares the returned length against the declared size and reports
    /// the mismatch itself.
    pub async fn read_data_block(&mut self, bytes: usize) -> std::io::Result<BytesMut> {
        let needed = bytes + 2;
        loop {
            if self.buffer.len() >= needed {
                break;
            }

            if let Some(pos) = self.buffer.windows(2).position(|w| w == b"\r\n") {
                let take = pos + 2;
                return Ok(self.buffer.split_to(take));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                break;
            }
        }

        let take = needed.min(self.buffer.len());
        Ok(self.buffer.split_to(take))
    }

    /// Queues a line; callers must `flush` once a whole response is written.
    pub async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.stream.write_all(line.as_bytes()).await
    }

    /// Queues raw, possibly non-UTF8 bytes (the `dataBlock` payload).
    pub async fn write_raw(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(bytes).await
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush().await
    }

    fn take_line(buffer: &mut BytesMut) -> Option<BytesMut> {
        let pos = buffer.windows(2).position(|w| w == b"\r\n")?;
        let line = buffer.split_to(pos);
        buffer.advance(2);
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_line_splits_on_crlf_and_consumes_it() {
        let mut buf = BytesMut::from(&b"get foo\r\nget bar\r\n"[..]);
        let first = Connection::take_line(&mut buf).unwrap();
        assert_eq!(&first[..], b"get foo");
        let second = Connection::take_line(&mut buf).unwrap();
        assert_eq!(&second[..], b"get bar");
        assert!(buf.is_empty());
    }

    #[test]
    fn take_line_returns_none_without_a_terminator() {
        let mut buf = BytesMut::from(&b"get foo"[..]);
        assert!(Connection::take_line(&mut buf).is_none());
        assert_eq!(&buf[..], b"get foo");
    }
}
