//! Line-oriented transport over an async byte stream.
//!
//! Frames the raw stream into `\n`-terminated text lines. `\r` bytes are
//! stripped wherever they appear, so CRLF peers work unchanged. A single
//! line is capped at [`MAX_LINE_LEN`] bytes; once the cap is reached the
//! line is returned as complete and the unconsumed bytes become the next
//! line. EOF before a terminator discards the partial line and reports
//! end-of-stream, which callers treat as connection loss.

use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Hard cap on a single line, bounding per-connection memory.
pub const MAX_LINE_LEN: usize = 8192;

/// Buffered line reader/writer over any async byte stream.
pub struct LineStream<S> {
    stream: BufReader<S>,
    line_buf: BytesMut,
}

impl<S: AsyncRead + AsyncWrite + Unpin> LineStream<S> {
    pub fn new(stream: S) -> Self {
        LineStream {
            stream: BufReader::new(stream),
            line_buf: BytesMut::with_capacity(256),
        }
    }

    /// Read one line, without its terminator.
    ///
    /// Returns `Ok(None)` on a zero-length read (peer shutdown). An
    /// interrupted read is retried by the runtime, never surfaced here.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        self.line_buf.clear();

        loop {
            let chunk = self.stream.fill_buf().await?;
            if chunk.is_empty() {
                // Peer shutdown; any partial line is dropped.
                return Ok(None);
            }

            let room = MAX_LINE_LEN - self.line_buf.len();
            if let Some(pos) = chunk.iter().position(|&b| b == b'\n') {
                let take = pos.min(room);
                self.line_buf.extend_from_slice(&chunk[..take]);
                // Consume the terminator only when the whole line fit;
                // otherwise the tail is left for the next read.
                let consumed = if pos <= room { pos + 1 } else { take };
                self.stream.consume(consumed);
                break;
            }

            let take = chunk.len().min(room);
            self.line_buf.extend_from_slice(&chunk[..take]);
            self.stream.consume(take);
            if self.line_buf.len() >= MAX_LINE_LEN {
                break;
            }
        }

        Ok(Some(decode(&self.line_buf)))
    }

    /// Write one line, appending the terminator when the text lacks one,
    /// and flush it to the peer.
    pub async fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.stream.write_all(text.as_bytes()).await?;
        if !text.ends_with('\n') {
            self.stream.write_all(b"\n").await?;
        }
        self.stream.flush().await
    }
}

/// Decode accumulated line bytes, stripping every `\r`.
fn decode(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.contains('\r') {
        text.chars().filter(|&c| c != '\r').collect()
    } else {
        text.into_owned()
    }
}
