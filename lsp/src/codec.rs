//! Base-protocol framing for the stdio transport.
//!
//! Every message is `Content-Length: N\r\n\r\n{json}`. [`MessageReader`]
//! and [`MessageWriter`] wrap the two halves of a duplex byte stream.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum message body (4 MiB) accepted from the server.
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// Longest header line accepted, terminator included.
pub const MAX_HEADER_LINE_BYTES: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        source: io::Error,
    },
    #[error("missing Content-Length header")]
    MissingLength,
    #[error("invalid Content-Length value '{0}'")]
    InvalidLength(String),
    #[error("Content-Length {0} exceeds maximum {max}", max = MAX_MESSAGE_BYTES)]
    Oversized(usize),
    #[error("stream ended inside a message header")]
    TruncatedHeader,
    #[error("header line longer than {max} bytes", max = MAX_HEADER_LINE_BYTES)]
    HeaderTooLong,
    #[error("malformed header line '{0}'")]
    MalformedHeader(String),
    #[error("malformed message body: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_err(context: &'static str) -> impl FnOnce(io::Error) -> FramingError {
    move |source| FramingError::Io { context, source }
}

/// Reads framed JSON messages from the server's stdout.
pub struct MessageReader<R> {
    reader: BufReader<R>,
    line: Vec<u8>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: Vec::with_capacity(64),
        }
    }

    /// Next message, or `Ok(None)` when the stream closes between messages.
    pub async fn read_message(&mut self) -> Result<Option<serde_json::Value>, FramingError> {
        let Some(length) = self.read_header().await? else {
            return Ok(None);
        };
        if length > MAX_MESSAGE_BYTES {
            return Err(FramingError::Oversized(length));
        }

        let mut body = vec![0u8; length];
        self.reader
            .read_exact(&mut body)
            .await
            .map_err(io_err("reading message body"))?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// Header block up to the blank separator line. `Ok(None)` on EOF
    /// before the first byte.
    async fn read_header(&mut self) -> Result<Option<usize>, FramingError> {
        let mut length = None;
        let mut started = false;

        loop {
            let Some(field) = self.next_header_line().await? else {
                // A closed stream is only clean on a message boundary.
                return if started {
                    Err(FramingError::TruncatedHeader)
                } else {
                    Ok(None)
                };
            };
            started = true;

            let field = field.trim();
            if field.is_empty() {
                break;
            }
            let Some((name, value)) = field.split_once(':') else {
                return Err(FramingError::MalformedHeader(field.to_string()));
            };
            if name.trim().eq_ignore_ascii_case("Content-Length") {
                let value = value.trim();
                length = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| FramingError::InvalidLength(value.to_string()))?,
                );
            }
        }

        length.map(Some).ok_or(FramingError::MissingLength)
    }

    /// One header line, read through a bounded window so a peer that never
    /// sends `\n` cannot grow the buffer. `Ok(None)` on EOF.
    async fn next_header_line(&mut self) -> Result<Option<&str>, FramingError> {
        self.line.clear();
        let limit = MAX_HEADER_LINE_BYTES as u64;
        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.line)
            .await
            .map_err(io_err("reading message header"))?;

        if n == 0 {
            return Ok(None);
        }
        if self.line.last() != Some(&b'\n') {
            return if n == MAX_HEADER_LINE_BYTES {
                Err(FramingError::HeaderTooLong)
            } else {
                Err(FramingError::TruncatedHeader)
            };
        }
        std::str::from_utf8(&self.line)
            .map(Some)
            .map_err(|_| FramingError::MalformedHeader(String::from_utf8_lossy(&self.line).into_owned()))
    }
}

/// Writes framed JSON messages to the server's stdin.
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_message(&mut self, message: &serde_json::Value) -> Result<(), FramingError> {
        let body = serde_json::to_vec(message)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        self.writer
            .write_all(header.as_bytes())
            .await
            .map_err(io_err("writing message header"))?;
        self.writer
            .write_all(&body)
            .await
            .map_err(io_err("writing message body"))?;
        self.writer
            .flush()
            .await
            .map_err(io_err("flushing message"))?;
        Ok(())
    }

    /// Close the write half so the server sees EOF on stdin.
    pub async fn close(&mut self) -> Result<(), FramingError> {
        self.writer
            .shutdown()
            .await
            .map_err(io_err("closing transport"))
    }
}
